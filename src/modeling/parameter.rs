//! Parameters: named, typed values.
//!
//! Properties, inputs and outputs of templates and instances are all
//! [`Parameters`] maps.

use crate::presentation::ResolvedValue;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A named value with its declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether a value must be supplied (service inputs)
    #[serde(skip)]
    pub required: bool,
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        type_name: Option<String>,
        value: Value,
        description: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name,
            value,
            description,
            required: false,
        }
    }

    /// A parameter without a declared type.
    pub fn untyped(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, None, value, None)
    }

    /// Same parameter, different value.
    pub fn with_value(&self, value: Value) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }
}

/// Parameters keyed by name.
pub type Parameters = BTreeMap<String, Parameter>;

/// Copy resolved values into `target`, one parameter per entry.
///
/// An existing parameter of the same name is replaced.
pub fn materialize(target: &mut Parameters, source: &BTreeMap<String, ResolvedValue>) {
    for (name, resolved) in source {
        target.insert(
            name.clone(),
            Parameter {
                name: name.clone(),
                type_name: resolved.type_name.clone(),
                value: resolved.value.clone(),
                description: resolved.description.clone(),
                required: resolved.required,
            },
        );
    }
}

/// Copy raw assignments (no declared type) into `target`.
pub fn materialize_assignments(target: &mut Parameters, assignments: &BTreeMap<String, Value>) {
    for (name, value) in assignments {
        target.insert(name.clone(), Parameter::untyped(name.clone(), value.clone()));
    }
}

/// Plain values of a parameter map.
pub fn values_of(parameters: &Parameters) -> BTreeMap<String, Value> {
    parameters
        .iter()
        .map(|(name, parameter)| (name.clone(), parameter.value.clone()))
        .collect()
}
