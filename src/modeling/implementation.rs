//! Operation implementation strings.
//!
//! An implementation string may name the plugin that runs it:
//! `plugin > path/to/operation`. A `>` escaped as `\>` does not split.
//! Dependencies use the same separator for configuration entries:
//! `ansible.user > admin` sets `configuration.ansible.user = "admin"`;
//! dependencies without a prefix are plain dependency paths.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

// `>` preceded by an even number of backslashes (including none). The
// backslash pairs belong to the separator.
static PREFIX_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\\])((?:\\\\)*>)").expect("valid separator regex"));

/// Split `text` on its first unescaped `>`.
///
/// Returns the trimmed prefix and the left-trimmed remainder, or `None` when
/// there is no unescaped separator. Later separators stay in the remainder.
pub fn split_prefix(text: &str) -> Option<(String, String)> {
    let separator = PREFIX_SEPARATOR.captures(text)?.get(1)?;
    let prefix = text[..separator.start()].trim();
    let rest = text[separator.end()..].trim_start();
    Some((prefix.to_string(), rest.to_string()))
}

/// Set `value` at a dotted path inside `map`, creating intermediate maps.
///
/// A non-map value in the way is replaced by a map.
pub fn set_nested(map: &mut BTreeMap<String, Value>, keys: &[&str], value: Value) {
    let Some((first, rest)) = keys.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert(first.to_string(), value);
        return;
    }
    let entry = map
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(inner) = entry {
        set_nested_object(inner, rest, value);
    }
}

fn set_nested_object(map: &mut Map<String, Value>, keys: &[&str], value: Value) {
    let Some((first, rest)) = keys.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert(first.to_string(), value);
        return;
    }
    let entry = map
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(inner) = entry {
        set_nested_object(inner, rest, value);
    }
}

/// A parsed implementation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedImplementation {
    /// Plugin named by the prefix
    pub plugin: Option<String>,
    /// Operation path with escapes intact
    pub implementation: Option<String>,
    /// Plain dependencies, in order
    pub dependencies: Vec<String>,
    /// Configuration from `key > value` dependencies
    pub configuration: BTreeMap<String, Value>,
}

/// Parse a primary implementation string and its dependencies.
pub fn parse_implementation(primary: &str, dependencies: &[String]) -> ParsedImplementation {
    let mut parsed = ParsedImplementation::default();

    match split_prefix(primary) {
        Some((plugin, implementation)) => {
            parsed.plugin = Some(plugin);
            parsed.implementation = Some(implementation);
        }
        None => parsed.implementation = Some(primary.to_string()),
    }

    for dependency in dependencies {
        match split_prefix(dependency) {
            Some((key, value)) => {
                let keys: Vec<&str> = key.split('.').collect();
                set_nested(&mut parsed.configuration, &keys, Value::String(value));
            }
            None => parsed.dependencies.push(dependency.clone()),
        }
    }

    parsed
}
