//! Value coercion and intrinsic functions.
//!
//! Values in a service template are untyped YAML until they meet their
//! declared type. A [`Coercer`] converts them, evaluating intrinsic
//! functions (`get_input`, `get_property`) against a [`Container`] first
//! when one is available. Without a container, function values pass
//! through untouched so they can be evaluated later.

use regex::Regex;
use serde::Serialize;
use serde_json::{Number, Value};
use std::sync::LazyLock;

/// Entity keyword for the entity that owns the value being evaluated.
pub const SELF: &str = "SELF";
/// Entity keyword for the source node of a relationship.
pub const SOURCE: &str = "SOURCE";
/// Entity keyword for the target node of a relationship.
pub const TARGET: &str = "TARGET";

/// Read access used to evaluate intrinsic functions.
pub trait Container {
    /// Value of a service input.
    fn input(&self, name: &str) -> Option<Value>;

    /// Value at `path` under `entity` (`SELF`, `SOURCE`, `TARGET` or a node
    /// template name). The first path element names a property or a
    /// capability; the rest index into it.
    fn entity_property(&self, entity: &str, path: &[String]) -> Option<Value>;
}

/// An intrinsic function found in a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    /// `{ get_input: name }`
    GetInput(String),
    /// `{ get_property: [ENTITY, name, ...] }`
    GetProperty { entity: String, path: Vec<String> },
}

impl Function {
    /// Recognize a function value. Anything else is a literal.
    pub fn parse(value: &Value) -> Option<Function> {
        let map = value.as_object()?;
        if map.len() != 1 {
            return None;
        }
        let (name, argument) = map.iter().next()?;
        match name.as_str() {
            "get_input" => match argument {
                Value::String(input) => Some(Function::GetInput(input.clone())),
                Value::Array(items) if items.len() == 1 => {
                    items[0].as_str().map(|s| Function::GetInput(s.to_string()))
                }
                _ => None,
            },
            "get_property" => {
                let items = argument.as_array()?;
                if items.len() < 2 {
                    return None;
                }
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    names.push(item.as_str()?.to_string());
                }
                let entity = names.remove(0);
                Some(Function::GetProperty {
                    entity,
                    path: names,
                })
            }
            _ => None,
        }
    }

    /// Evaluate against a container. `None` when the referenced value does
    /// not exist.
    pub fn evaluate(&self, container: &dyn Container) -> Option<Value> {
        match self {
            Function::GetInput(name) => container.input(name),
            Function::GetProperty { entity, path } => container.entity_property(entity, path),
        }
    }
}

/// Whether `value` is an intrinsic function.
pub fn is_function(value: &Value) -> bool {
    Function::parse(value).is_some()
}

/// Converts raw values to their declared types.
pub trait Coercer {
    /// Coerce `value` to `declared_type`.
    ///
    /// `key` names the value in error messages. Errors are messages meant
    /// for a validation issue.
    fn coerce(
        &self,
        container: Option<&dyn Container>,
        declared_type: Option<&str>,
        value: &Value,
        key: &str,
    ) -> Result<Value, String>;
}

/// Coercer for the built-in primitive data types.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCoercer;

impl Coercer for DefaultCoercer {
    fn coerce(
        &self,
        container: Option<&dyn Container>,
        declared_type: Option<&str>,
        value: &Value,
        key: &str,
    ) -> Result<Value, String> {
        if let Some(function) = Function::parse(value) {
            return match container {
                Some(container) => match function.evaluate(container) {
                    Some(evaluated) => convert(declared_type, &evaluated, key),
                    None => Err(format!("cannot evaluate function for \"{}\"", key)),
                },
                None => Ok(value.clone()),
            };
        }
        convert(declared_type, value, key)
    }
}

/// Convert a literal to a primitive type. Unknown types pass through.
pub fn convert(declared_type: Option<&str>, value: &Value, key: &str) -> Result<Value, String> {
    let Some(declared_type) = declared_type else {
        return Ok(value.clone());
    };
    let invalid = || format!("\"{}\" is not a valid {}: {}", key, declared_type, value);

    match declared_type {
        "string" => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(invalid()),
        },
        "integer" => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => Ok(Value::from(f as i64)),
                _ => Err(invalid()),
            },
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        "float" => match value {
            Value::Number(n) => n
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid),
            _ => Err(invalid()),
        },
        "boolean" => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        "list" => match value {
            Value::Array(_) => Ok(value.clone()),
            _ => Err(invalid()),
        },
        "map" => match value {
            Value::Object(_) => Ok(value.clone()),
            _ => Err(invalid()),
        },
        "scalar-unit.size" => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => parse_size(s).map(Value::from).ok_or_else(invalid),
            _ => Err(invalid()),
        },
        _ => Ok(value.clone()),
    }
}

static SCALAR_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*([A-Za-z]+)\s*$").expect("valid scalar regex")
});

/// Parse a `scalar-unit.size` string (`"4 GB"`, `"512 MiB"`) into bytes.
pub fn parse_size(text: &str) -> Option<u64> {
    let captures = SCALAR_SIZE.captures(text)?;
    let amount: f64 = captures[1].parse().ok()?;
    let multiplier: f64 = match captures[2].to_ascii_lowercase().as_str() {
        "b" => 1.0,
        "kb" => 1_000.0,
        "kib" => 1_024.0,
        "mb" => 1_000_000.0,
        "mib" => 1_048_576.0,
        "gb" => 1_000_000_000.0,
        "gib" => 1_073_741_824.0,
        "tb" => 1_000_000_000_000.0,
        "tib" => 1_099_511_627_776.0,
        _ => return None,
    };
    Some((amount * multiplier).round() as u64)
}
