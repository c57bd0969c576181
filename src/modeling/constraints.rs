//! Node filter constraints.
//!
//! Declarative clauses such as `{ in_range: [1, 4] }` compile to a
//! [`Constraint`], a closed set of comparison kinds holding their raw
//! operands. Operands are coerced every time a constraint is evaluated, so
//! an operand like `{ get_input: min_cpus }` sees the container it is
//! evaluated in rather than the one it was compiled in.

use crate::modeling::coerce::{is_function, Coercer, Container};
use crate::modeling::templates::NodeTemplate;
use crate::presentation::{ConstraintSpec, NodeFilterDefinition};
use crate::validation::{Level, Locator, ValidationSink};
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Sentinel upper bound of `in_range`.
pub const UNBOUNDED: &str = "UNBOUNDED";

/// A raw clause: one operator and its operand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintClause {
    pub operator: String,
    pub operand: Value,
}

impl ConstraintClause {
    pub fn new(operator: impl Into<String>, operand: Value) -> Self {
        Self {
            operator: operator.into(),
            operand,
        }
    }

    /// Clauses of a clause map, in key order.
    pub fn from_map(map: &BTreeMap<String, Value>) -> Vec<ConstraintClause> {
        map.iter()
            .map(|(operator, operand)| ConstraintClause::new(operator.clone(), operand.clone()))
            .collect()
    }
}

/// Upper bound of a range.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Value(Value),
    Unbounded,
}

impl Serialize for Bound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Bound::Value(value) => value.serialize(serializer),
            Bound::Unbounded => serializer.serialize_str(UNBOUNDED),
        }
    }
}

/// A compiled regular expression that remembers its source.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `source` for whole-string matching.
    pub fn new(source: &str) -> Result<Self, String> {
        let regex = Regex::new(&format!("^(?:{})$", source))
            .map_err(|e| format!("invalid pattern \"{}\": {}", source, e))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_full_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

/// A compiled constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum Constraint {
    Equal { operand: Value },
    GreaterThan { operand: Value },
    GreaterOrEqual { operand: Value },
    LessThan { operand: Value },
    LessOrEqual { operand: Value },
    InRange { lower: Value, upper: Bound },
    ValidValues { values: Vec<Value> },
    Length { length: usize },
    MinLength { length: usize },
    MaxLength { length: usize },
    Pattern { pattern: Pattern },
}

impl Constraint {
    /// Compile a clause.
    ///
    /// `Ok(None)` for an operator this compiler does not know, `Err` for a
    /// known operator with a malformed operand.
    pub fn compile(clause: &ConstraintClause) -> Result<Option<Constraint>, String> {
        let operand = &clause.operand;
        let constraint = match clause.operator.as_str() {
            "equal" => Constraint::Equal {
                operand: operand.clone(),
            },
            "greater_than" => Constraint::GreaterThan {
                operand: operand.clone(),
            },
            "greater_or_equal" => Constraint::GreaterOrEqual {
                operand: operand.clone(),
            },
            "less_than" => Constraint::LessThan {
                operand: operand.clone(),
            },
            "less_or_equal" => Constraint::LessOrEqual {
                operand: operand.clone(),
            },
            "in_range" => {
                let bounds = operand
                    .as_array()
                    .filter(|bounds| bounds.len() == 2)
                    .ok_or_else(|| "in_range needs a [lower, upper] list".to_string())?;
                let upper = match &bounds[1] {
                    Value::String(s) if s == UNBOUNDED => Bound::Unbounded,
                    other => Bound::Value(other.clone()),
                };
                Constraint::InRange {
                    lower: bounds[0].clone(),
                    upper,
                }
            }
            "valid_values" => Constraint::ValidValues {
                values: operand
                    .as_array()
                    .cloned()
                    .ok_or_else(|| "valid_values needs a list".to_string())?,
            },
            "length" => Constraint::Length {
                length: length_operand(&clause.operator, operand)?,
            },
            "min_length" => Constraint::MinLength {
                length: length_operand(&clause.operator, operand)?,
            },
            "max_length" => Constraint::MaxLength {
                length: length_operand(&clause.operator, operand)?,
            },
            "pattern" => Constraint::Pattern {
                pattern: Pattern::new(
                    operand
                        .as_str()
                        .ok_or_else(|| "pattern needs a string".to_string())?,
                )?,
            },
            _ => return Ok(None),
        };
        Ok(Some(constraint))
    }

    /// Operator name as written in documents.
    pub fn operator(&self) -> &'static str {
        match self {
            Constraint::Equal { .. } => "equal",
            Constraint::GreaterThan { .. } => "greater_than",
            Constraint::GreaterOrEqual { .. } => "greater_or_equal",
            Constraint::LessThan { .. } => "less_than",
            Constraint::LessOrEqual { .. } => "less_or_equal",
            Constraint::InRange { .. } => "in_range",
            Constraint::ValidValues { .. } => "valid_values",
            Constraint::Length { .. } => "length",
            Constraint::MinLength { .. } => "min_length",
            Constraint::MaxLength { .. } => "max_length",
            Constraint::Pattern { .. } => "pattern",
        }
    }

    /// Evaluate against a candidate value.
    ///
    /// Operands are coerced to `declared_type` (evaluating functions against
    /// `container`); an operand that fails to coerce fails the constraint.
    pub fn evaluate(
        &self,
        candidate: &Value,
        container: Option<&dyn Container>,
        coercer: &dyn Coercer,
        declared_type: Option<&str>,
    ) -> bool {
        let coerce = |operand: &Value| {
            coercer
                .coerce(container, declared_type, operand, self.operator())
                .ok()
        };

        match self {
            Constraint::Equal { operand } => {
                coerce(operand).is_some_and(|operand| values_equal(candidate, &operand))
            }
            Constraint::GreaterThan { operand } => coerce(operand)
                .and_then(|operand| compare_values(candidate, &operand))
                .is_some_and(Ordering::is_gt),
            Constraint::GreaterOrEqual { operand } => coerce(operand)
                .and_then(|operand| compare_values(candidate, &operand))
                .is_some_and(Ordering::is_ge),
            Constraint::LessThan { operand } => coerce(operand)
                .and_then(|operand| compare_values(candidate, &operand))
                .is_some_and(Ordering::is_lt),
            Constraint::LessOrEqual { operand } => coerce(operand)
                .and_then(|operand| compare_values(candidate, &operand))
                .is_some_and(Ordering::is_le),
            Constraint::InRange { lower, upper } => {
                let above_lower = coerce(lower)
                    .and_then(|lower| compare_values(candidate, &lower))
                    .is_some_and(Ordering::is_ge);
                let below_upper = match upper {
                    Bound::Unbounded => true,
                    Bound::Value(upper) => coerce(upper)
                        .and_then(|upper| compare_values(candidate, &upper))
                        .is_some_and(Ordering::is_le),
                };
                above_lower && below_upper
            }
            Constraint::ValidValues { values } => values
                .iter()
                .filter_map(|value| coerce(value))
                .any(|value| values_equal(candidate, &value)),
            Constraint::Length { length } => length_of(candidate).is_some_and(|l| l == *length),
            Constraint::MinLength { length } => length_of(candidate).is_some_and(|l| l >= *length),
            Constraint::MaxLength { length } => length_of(candidate).is_some_and(|l| l <= *length),
            Constraint::Pattern { pattern } => pattern.is_full_match(&stringify(candidate)),
        }
    }
}

fn length_operand(operator: &str, operand: &Value) -> Result<usize, String> {
    let length = operand
        .as_u64()
        .ok_or_else(|| format!("{} needs a non-negative integer", operator))?;
    usize::try_from(length).map_err(|_| format!("{} length {} is out of range", operator, length))
}

/// Structural equality; numbers compare by value (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Order two values of the same kind. Numbers and strings only.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A constraint on one property of a candidate node template, optionally
/// on one of its capabilities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeFilterConstraint {
    pub property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    /// Type the operands coerce to; defaults to the candidate value's type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    pub constraint: Constraint,
}

/// Compile one clause for a property (of a capability).
pub fn compile(
    clause: &ConstraintClause,
    property_name: &str,
    capability_name: Option<&str>,
    declared_type: Option<&str>,
) -> Result<Option<NodeFilterConstraint>, String> {
    Ok(Constraint::compile(clause)?.map(|constraint| NodeFilterConstraint {
        property: property_name.to_string(),
        capability: capability_name.map(str::to_string),
        declared_type: declared_type.map(str::to_string),
        constraint,
    }))
}

impl NodeFilterConstraint {
    /// Whether `candidate` satisfies this constraint. A candidate without
    /// the property does not.
    pub fn evaluate(
        &self,
        candidate: &NodeTemplate,
        container: &dyn Container,
        coercer: &dyn Coercer,
    ) -> bool {
        let parameter = match &self.capability {
            Some(capability) => candidate
                .capability_templates
                .get(capability)
                .and_then(|c| c.properties.get(&self.property)),
            None => candidate.properties.get(&self.property),
        };
        let Some(parameter) = parameter else {
            return false;
        };

        let declared_type = self
            .declared_type
            .as_deref()
            .or(parameter.type_name.as_deref());

        let value = if is_function(&parameter.value) {
            match coercer.coerce(Some(container), declared_type, &parameter.value, &self.property) {
                Ok(value) => value,
                Err(_) => return false,
            }
        } else {
            parameter.value.clone()
        };

        self.constraint
            .evaluate(&value, Some(container), coercer, declared_type)
    }
}

/// Compile every clause of a node filter.
///
/// Unknown operators and malformed operands are reported at
/// [`Level::Field`] and skipped.
pub fn compile_node_filter(
    filter: &NodeFilterDefinition,
    locator: &Locator,
    sink: &mut dyn ValidationSink,
) -> Vec<NodeFilterConstraint> {
    let mut constraints = Vec::new();

    let mut compile_properties = |properties: &[BTreeMap<String, ConstraintSpec>],
                                  capability: Option<&str>,
                                  locator: &Locator,
                                  sink: &mut dyn ValidationSink| {
        for (index, entry) in properties.iter().enumerate() {
            for (property, spec) in entry {
                for raw in spec.clauses() {
                    for clause in ConstraintClause::from_map(raw) {
                        let clause_locator = locator.index(index).child(property);
                        match compile(&clause, property, capability, None) {
                            Ok(Some(constraint)) => constraints.push(constraint),
                            Ok(None) => sink.report_at(
                                Level::Field,
                                format!("unknown constraint operator \"{}\"", clause.operator),
                                Some(clause_locator),
                            ),
                            Err(message) => sink.report_at(
                                Level::Field,
                                format!("constraint on \"{}\": {}", property, message),
                                Some(clause_locator),
                            ),
                        }
                    }
                }
            }
        }
    };

    compile_properties(&filter.properties, None, &locator.child("properties"), sink);
    for (index, entry) in filter.capabilities.iter().enumerate() {
        for (capability, capability_filter) in entry {
            compile_properties(
                &capability_filter.properties,
                Some(capability.as_str()),
                &locator
                    .child("capabilities")
                    .index(index)
                    .child(capability)
                    .child("properties"),
                sink,
            );
        }
    }

    constraints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modeling::coerce::DefaultCoercer;
    use crate::validation::IssueCollector;
    use serde_json::json;

    fn check(operator: &str, operand: Value, candidate: Value) -> bool {
        let constraint = Constraint::compile(&ConstraintClause::new(operator, operand))
            .unwrap()
            .unwrap();
        constraint.evaluate(&candidate, None, &DefaultCoercer, None)
    }

    struct Inputs;

    impl Container for Inputs {
        fn input(&self, name: &str) -> Option<Value> {
            (name == "min_cpus").then(|| json!(2))
        }

        fn entity_property(&self, _entity: &str, _path: &[String]) -> Option<Value> {
            None
        }
    }

    #[test]
    fn equal_compares_numbers_by_value() {
        assert!(check("equal", json!(1), json!(1.0)));
        assert!(check("equal", json!("linux"), json!("linux")));
        assert!(!check("equal", json!("linux"), json!("bsd")));
    }

    #[test]
    fn ordered_comparisons() {
        assert!(check("greater_than", json!(2), json!(3)));
        assert!(!check("greater_than", json!(3), json!(3)));
        assert!(check("greater_or_equal", json!(3), json!(3)));
        assert!(check("less_than", json!("b"), json!("a")));
        assert!(check("less_or_equal", json!(3), json!(3)));
        assert!(!check("less_than", json!(3), json!("a")));
    }

    #[test]
    fn in_range_includes_both_bounds() {
        assert!(check("in_range", json!([1, 4]), json!(1)));
        assert!(check("in_range", json!([1, 4]), json!(4)));
        assert!(check("in_range", json!([1, 4]), json!(2.5)));
        assert!(!check("in_range", json!([1, 4]), json!(0)));
        assert!(!check("in_range", json!([1, 4]), json!(5)));
    }

    #[test]
    fn in_range_unbounded_accepts_anything_above_lower() {
        assert!(check("in_range", json!([2, "UNBOUNDED"]), json!(2)));
        assert!(check("in_range", json!([2, "UNBOUNDED"]), json!(1_000_000)));
        assert!(!check("in_range", json!([2, "UNBOUNDED"]), json!(1)));
    }

    #[test]
    fn valid_values_membership() {
        assert!(check("valid_values", json!(["linux", "bsd"]), json!("bsd")));
        assert!(!check("valid_values", json!(["linux", "bsd"]), json!("windows")));
    }

    #[test]
    fn length_family() {
        assert!(check("length", json!(3), json!("abc")));
        assert!(!check("length", json!(3), json!("abcd")));
        assert!(check("min_length", json!(2), json!([1, 2, 3])));
        assert!(!check("min_length", json!(4), json!([1, 2, 3])));
        assert!(!check("length", json!(1), json!(5)));
    }

    #[test]
    fn max_length_accepts_exactly_lengths_up_to_n() {
        for length in 0..8usize {
            let candidate = Value::String("x".repeat(length));
            assert_eq!(
                check("max_length", json!(4), candidate),
                length <= 4,
                "length {length}"
            );
        }
    }

    #[test]
    fn pattern_is_full_match_on_stringified_value() {
        assert!(check("pattern", json!("[a-z]+"), json!("linux")));
        assert!(!check("pattern", json!("[a-z]+"), json!("linux2")));
        assert!(check("pattern", json!("[0-9]+"), json!(8080)));
    }

    #[test]
    fn unknown_operator_compiles_to_none() {
        let result = Constraint::compile(&ConstraintClause::new("close_to", json!(1)));
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn malformed_operands_are_errors() {
        assert!(Constraint::compile(&ConstraintClause::new("in_range", json!(3))).is_err());
        assert!(Constraint::compile(&ConstraintClause::new("in_range", json!([1]))).is_err());
        assert!(Constraint::compile(&ConstraintClause::new("valid_values", json!("a"))).is_err());
        assert!(Constraint::compile(&ConstraintClause::new("max_length", json!(-1))).is_err());
        assert!(Constraint::compile(&ConstraintClause::new("pattern", json!("(unclosed"))).is_err());
    }

    #[test]
    fn length_operands_must_be_non_negative_integers() {
        assert_eq!(length_operand("length", &json!(3)), Ok(3));
        assert!(length_operand("length", &json!(2.5)).is_err());
        assert!(length_operand("min_length", &json!("3")).is_err());
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn length_operand_beyond_usize_is_rejected() {
        let result = length_operand("max_length", &json!(u64::MAX));
        assert!(result.unwrap_err().contains("out of range"));
    }

    #[test]
    fn operands_are_coerced_at_evaluation_time() {
        let constraint = Constraint::compile(&ConstraintClause::new(
            "greater_or_equal",
            json!({"get_input": "min_cpus"}),
        ))
        .unwrap()
        .unwrap();

        assert!(constraint.evaluate(&json!(2), Some(&Inputs), &DefaultCoercer, Some("integer")));
        assert!(!constraint.evaluate(&json!(1), Some(&Inputs), &DefaultCoercer, Some("integer")));
        // No container: the function cannot be compared.
        assert!(!constraint.evaluate(&json!(2), None, &DefaultCoercer, Some("integer")));
    }

    #[test]
    fn declared_type_coerces_operands() {
        let constraint = Constraint::compile(&ConstraintClause::new("in_range", json!(["1", "4"])))
            .unwrap()
            .unwrap();
        assert!(constraint.evaluate(&json!(3), None, &DefaultCoercer, Some("integer")));
    }

    #[test]
    fn serializes_with_operator_tag() {
        let constraint = Constraint::compile(&ConstraintClause::new("in_range", json!([1, "UNBOUNDED"])))
            .unwrap()
            .unwrap();
        assert_eq!(
            serde_json::to_value(&constraint).unwrap(),
            json!({"operator": "in_range", "lower": 1, "upper": "UNBOUNDED"})
        );
    }

    #[test]
    fn compile_node_filter_reports_bad_clauses() {
        let filter: NodeFilterDefinition = serde_yaml::from_str(
            r#"
properties:
  - num_cpus: { in_range: [1, 4] }
  - os: [ { valid_values: [linux] }, { resembles: linux } ]
capabilities:
  - host:
      properties:
        - mem_size: { max_length: nope }
        - disk_size: { greater_or_equal: 10 }
"#,
        )
        .unwrap();
        let mut sink = IssueCollector::new();

        let constraints = compile_node_filter(&filter, &Locator::new("filter"), &mut sink);

        assert_eq!(constraints.len(), 3);
        assert_eq!(constraints[0].property, "num_cpus");
        assert_eq!(constraints[2].capability.as_deref(), Some("host"));
        assert_eq!(sink.len(), 2);
        assert_eq!(
            sink.issues()[1].locator,
            Some(Locator::new("filter.capabilities[0].host.properties[0].mem_size"))
        );
    }
}
