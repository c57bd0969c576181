//! Evaluation scope over a template model.
//!
//! [`Scope`] implements [`Container`] on top of a [`ServiceTemplate`]:
//! `get_input` reads the inputs the scope was created with, `get_property`
//! reads node template properties (or capability properties) by entity.

use crate::modeling::coerce::{Container, Function, SELF, SOURCE, TARGET};
use crate::modeling::parameter::Parameters;
use crate::modeling::templates::{NodeTemplateId, ServiceTemplate};
use serde_json::Value;

/// Nesting limit for functions whose values are functions.
const MAX_DEPTH: u8 = 8;

/// Read-only view used to evaluate intrinsic functions.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    template: &'a ServiceTemplate,
    inputs: &'a Parameters,
    self_node: Option<NodeTemplateId>,
    source_node: Option<NodeTemplateId>,
    target_node: Option<NodeTemplateId>,
    depth: u8,
}

impl<'a> Scope<'a> {
    /// Scope over a template using its declared input values.
    pub fn new(template: &'a ServiceTemplate) -> Self {
        Self::with_inputs(template, &template.inputs)
    }

    /// Scope over a template with effective inputs (e.g. user supplied).
    pub fn with_inputs(template: &'a ServiceTemplate, inputs: &'a Parameters) -> Self {
        Self {
            template,
            inputs,
            self_node: None,
            source_node: None,
            target_node: None,
            depth: 0,
        }
    }

    pub fn template(&self) -> &'a ServiceTemplate {
        self.template
    }

    pub fn inputs(&self) -> &'a Parameters {
        self.inputs
    }

    /// Same scope, `SELF` bound to `node`.
    pub fn with_self(self, node: NodeTemplateId) -> Self {
        Self {
            self_node: Some(node),
            ..self
        }
    }

    /// Same scope, bound to both ends of a relationship.
    pub fn with_edge(self, source: NodeTemplateId, target: NodeTemplateId) -> Self {
        Self {
            self_node: Some(source),
            source_node: Some(source),
            target_node: Some(target),
            ..self
        }
    }

    fn resolve_entity(&self, entity: &str) -> Option<NodeTemplateId> {
        match entity {
            SELF => self.self_node,
            SOURCE => self.source_node.or(self.self_node),
            TARGET => self.target_node,
            name => self.template.node_templates.lookup(name),
        }
    }

    /// Evaluate `value` if it is a function; literals come back as-is.
    fn evaluate_nested(&self, value: &Value) -> Option<Value> {
        match Function::parse(value) {
            Some(function) if self.depth < MAX_DEPTH => {
                let deeper = Self {
                    depth: self.depth + 1,
                    ..*self
                };
                function.evaluate(&deeper)
            }
            Some(_) => None,
            None => Some(value.clone()),
        }
    }
}

impl Container for Scope<'_> {
    fn input(&self, name: &str) -> Option<Value> {
        let parameter = self.inputs.get(name)?;
        if parameter.value.is_null() {
            return None;
        }
        self.evaluate_nested(&parameter.value)
    }

    fn entity_property(&self, entity: &str, path: &[String]) -> Option<Value> {
        let node_id = self.resolve_entity(entity)?;
        let node = self.template.node_templates.get(node_id);
        let (first, rest) = path.split_first()?;

        let (value, rest) = match node.properties.get(first) {
            Some(parameter) => (&parameter.value, rest),
            None => {
                let capability = node.capability_templates.get(first)?;
                let (property, rest) = rest.split_first()?;
                (&capability.properties.get(property)?.value, rest)
            }
        };

        // A function inside a node's property refers to that node.
        let owner = Self {
            self_node: Some(node_id),
            ..*self
        };
        let value = owner.evaluate_nested(value)?;
        index_into(value, rest)
    }
}

fn index_into(mut value: Value, path: &[String]) -> Option<Value> {
    for key in path {
        value = match value {
            Value::Object(mut map) => map.remove(key)?,
            Value::Array(mut items) => {
                let index: usize = key.parse().ok()?;
                if index >= items.len() {
                    return None;
                }
                items.swap_remove(index)
            }
            _ => return None,
        };
    }
    Some(value)
}
