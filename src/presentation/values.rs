//! Value resolution through type inheritance.
//!
//! A template only assigns the values it cares about. Its effective
//! properties, capabilities, requirements and interfaces come from merging
//! those assignments over what its type (and that type's ancestors)
//! declare. Each value is coerced to its declared type on the way.
//!
//! Problems are reported to the sink and the offending value is left out;
//! resolution itself never fails.

use crate::modeling::coerce::Coercer;
use crate::presentation::schema::{
    CapabilityAssignment, CapabilityDefinition, InterfaceAssignment, NodeFilterDefinition,
    OperationDefinition, PropertyDefinition, RelationshipAssignment, RequirementAssignment,
    RequirementDefinition, ServiceTemplateDocument,
};
use crate::types::TypeVariant;
use crate::validation::{Level, Locator, ValidationSink};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A value with its declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedValue {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the definition demands a value (only meaningful for inputs)
    #[serde(skip)]
    pub required: bool,
}

impl ResolvedValue {
    /// A value with no declared type.
    pub fn untyped(value: Value) -> Self {
        Self {
            type_name: None,
            value,
            description: None,
            required: false,
        }
    }
}

/// A capability of a node template, merged with its definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCapability {
    pub type_name: String,
    pub description: Option<String>,
    /// `[min, max]` as declared
    pub occurrences: Option<Vec<Value>>,
    pub valid_source_types: Vec<String>,
    pub properties: BTreeMap<String, ResolvedValue>,
}

/// A requirement of a node template, merged with its definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequirement {
    pub name: String,
    /// Target node template or node type name
    pub node: Option<String>,
    /// Target capability name or capability type name
    pub capability: Option<String>,
    pub relationship: Option<RelationshipAssignmentRef>,
    pub node_filter: Option<NodeFilterDefinition>,
    pub occurrences: Option<Vec<Value>>,
}

/// How a requirement names its relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipAssignmentRef {
    /// Relationship type or relationship template name
    Named(String),
    /// Inline relationship with its own properties and interfaces
    Inline {
        type_name: String,
        properties: BTreeMap<String, Value>,
        interfaces: BTreeMap<String, InterfaceAssignment>,
    },
}

impl From<&RelationshipAssignment> for RelationshipAssignmentRef {
    fn from(assignment: &RelationshipAssignment) -> Self {
        match assignment {
            RelationshipAssignment::Named(name) => RelationshipAssignmentRef::Named(name.clone()),
            RelationshipAssignment::Inline(inline) => RelationshipAssignmentRef::Inline {
                type_name: inline.type_name.clone(),
                properties: inline.properties.clone(),
                interfaces: inline.interfaces.clone(),
            },
        }
    }
}

/// An interface merged from its type, the owner's type chain and the
/// template.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInterface {
    pub type_name: Option<String>,
    pub description: Option<String>,
    pub inputs: BTreeMap<String, ResolvedValue>,
    pub operations: BTreeMap<String, OperationDefinition>,
}

/// What to do with assignments that have no definition.
#[derive(Debug, Clone, Copy)]
enum Undeclared<'t> {
    /// Keep them untyped.
    Keep,
    /// Report them against the named type and drop them.
    Reject(&'t str),
}

/// Resolves template values against a document's type catalogs.
pub struct ValueResolver<'a> {
    document: &'a ServiceTemplateDocument,
    coercer: &'a dyn Coercer,
}

impl<'a> ValueResolver<'a> {
    pub fn new(document: &'a ServiceTemplateDocument, coercer: &'a dyn Coercer) -> Self {
        Self { document, coercer }
    }

    pub fn document(&self) -> &'a ServiceTemplateDocument {
        self.document
    }

    /// Property definitions of a type and its ancestors; a child's
    /// definition replaces its parent's.
    pub fn property_definitions(
        &self,
        variant: TypeVariant,
        type_name: &str,
    ) -> BTreeMap<&'a str, &'a PropertyDefinition> {
        let mut definitions = BTreeMap::new();
        for (_, definition) in self.document.type_chain(variant, type_name) {
            for (name, property) in &definition.properties {
                definitions.insert(name.as_str(), property);
            }
        }
        definitions
    }

    /// Effective property values of a template of type `type_name`.
    ///
    /// When the type itself is unknown the assignments are kept untyped; the
    /// unknown type is reported where the template's type is resolved.
    pub fn properties(
        &self,
        variant: TypeVariant,
        type_name: &str,
        assignments: &BTreeMap<String, Value>,
        locator: &Locator,
        sink: &mut dyn ValidationSink,
    ) -> BTreeMap<String, ResolvedValue> {
        if self.document.type_definition(variant, type_name).is_none() {
            return untyped(assignments);
        }
        let definitions = self.property_definitions(variant, type_name);
        self.merge(
            &definitions,
            &BTreeMap::new(),
            assignments,
            Undeclared::Reject(type_name),
            true,
            locator,
            sink,
        )
    }

    /// Topology inputs (`default`) or outputs (`value`).
    ///
    /// Inputs without a default are kept with a null value so user input
    /// can supply it at instantiation.
    pub fn parameters(
        &self,
        definitions: &BTreeMap<String, PropertyDefinition>,
        locator: &Locator,
        sink: &mut dyn ValidationSink,
    ) -> BTreeMap<String, ResolvedValue> {
        let mut resolved = BTreeMap::new();
        for (name, definition) in definitions {
            let raw = definition
                .value
                .as_ref()
                .or(definition.default.as_ref())
                .cloned()
                .unwrap_or(Value::Null);
            let value = if raw.is_null() {
                raw
            } else {
                match self
                    .coercer
                    .coerce(None, definition.type_name.as_deref(), &raw, name)
                {
                    Ok(value) => value,
                    Err(message) => {
                        sink.report_at(Level::Field, message, Some(locator.child(name)));
                        continue;
                    }
                }
            };
            resolved.insert(
                name.clone(),
                ResolvedValue {
                    type_name: definition.type_name.clone(),
                    value,
                    description: definition.description.clone(),
                    required: definition.is_required(),
                },
            );
        }
        resolved
    }

    /// Capabilities of a node template: the node type chain's definitions,
    /// each with its capability type's property defaults, the definition's
    /// refinements and the template's assignments.
    pub fn capabilities(
        &self,
        node_type: &str,
        assignments: &BTreeMap<String, CapabilityAssignment>,
        locator: &Locator,
        sink: &mut dyn ValidationSink,
    ) -> BTreeMap<String, ResolvedCapability> {
        let chain = self.document.type_chain(TypeVariant::Node, node_type);
        let mut definitions: BTreeMap<&str, &CapabilityDefinition> = BTreeMap::new();
        for (_, definition) in &chain {
            for (name, capability) in &definition.capabilities {
                definitions.insert(name.as_str(), capability);
            }
        }

        let no_assignments = BTreeMap::new();
        let mut resolved = BTreeMap::new();
        for (name, definition) in &definitions {
            let assigned = assignments
                .get(*name)
                .map(|a| &a.properties)
                .unwrap_or(&no_assignments);
            let capability_locator = locator.child(name);

            let properties = if self
                .document
                .type_definition(TypeVariant::Capability, &definition.type_name)
                .is_some()
            {
                let property_definitions =
                    self.property_definitions(TypeVariant::Capability, &definition.type_name);
                self.merge(
                    &property_definitions,
                    &definition.properties,
                    assigned,
                    Undeclared::Reject(&definition.type_name),
                    true,
                    &capability_locator.child("properties"),
                    sink,
                )
            } else {
                let mut values = untyped(&definition.properties);
                values.extend(untyped(assigned));
                values
            };

            resolved.insert(
                name.to_string(),
                ResolvedCapability {
                    type_name: definition.type_name.clone(),
                    description: definition.description.clone(),
                    occurrences: definition.occurrences.clone(),
                    valid_source_types: definition.valid_source_types.clone(),
                    properties,
                },
            );
        }

        if !chain.is_empty() {
            for name in assignments.keys() {
                if !definitions.contains_key(name.as_str()) {
                    sink.report_at(
                        Level::BetweenTypes,
                        format!(
                            "capability \"{}\" is not defined in node type \"{}\"",
                            name, node_type
                        ),
                        Some(locator.child(name)),
                    );
                }
            }
        }

        resolved
    }

    /// Requirements of a node template, in assignment order. Fields left
    /// out of an assignment are inherited from the node type's same-named
    /// requirement definition.
    pub fn requirements(
        &self,
        node_type: &str,
        assignments: &[BTreeMap<String, RequirementAssignment>],
        locator: &Locator,
        sink: &mut dyn ValidationSink,
    ) -> Vec<ResolvedRequirement> {
        let chain = self.document.type_chain(TypeVariant::Node, node_type);
        let mut definitions: Vec<(&str, &RequirementDefinition)> = Vec::new();
        for (_, definition) in &chain {
            for entry in &definition.requirements {
                for (name, requirement) in entry {
                    match definitions.iter_mut().find(|(n, _)| *n == name.as_str()) {
                        Some(existing) => existing.1 = requirement,
                        None => definitions.push((name.as_str(), requirement)),
                    }
                }
            }
        }

        let mut resolved = Vec::new();
        for (index, entry) in assignments.iter().enumerate() {
            for (name, assignment) in entry {
                let assignment = assignment.to_definition();
                let definition = definitions
                    .iter()
                    .find(|(n, _)| *n == name.as_str())
                    .map(|(_, d)| *d);

                if definition.is_none() && !chain.is_empty() {
                    sink.report_at(
                        Level::BetweenTypes,
                        format!(
                            "requirement \"{}\" is not defined in node type \"{}\"",
                            name, node_type
                        ),
                        Some(locator.index(index).child(name)),
                    );
                }

                let relationship = assignment
                    .relationship
                    .as_ref()
                    .map(RelationshipAssignmentRef::from)
                    .or_else(|| {
                        definition
                            .and_then(|d| d.relationship.clone())
                            .map(RelationshipAssignmentRef::Named)
                    });

                resolved.push(ResolvedRequirement {
                    name: name.clone(),
                    node: assignment
                        .node
                        .or_else(|| definition.and_then(|d| d.node.clone())),
                    capability: assignment
                        .capability
                        .or_else(|| definition.and_then(|d| d.capability.clone())),
                    relationship,
                    node_filter: assignment.node_filter,
                    occurrences: definition.and_then(|d| d.occurrences.clone()),
                });
            }
        }
        resolved
    }

    /// Interfaces of a template: the owner type chain's interfaces overlaid
    /// by the template's, each completed from its interface type.
    pub fn interfaces(
        &self,
        variant: TypeVariant,
        owner_type: Option<&str>,
        assignments: &BTreeMap<String, InterfaceAssignment>,
        locator: &Locator,
        sink: &mut dyn ValidationSink,
    ) -> BTreeMap<String, ResolvedInterface> {
        let mut merged: BTreeMap<String, InterfaceAssignment> = BTreeMap::new();
        if let Some(owner_type) = owner_type {
            for (_, definition) in self.document.type_chain(variant, owner_type) {
                for (name, interface) in &definition.interfaces {
                    overlay(merged.entry(name.clone()).or_default(), interface);
                }
            }
        }
        for (name, interface) in assignments {
            if !merged.contains_key(name) && interface.type_name.is_none() {
                sink.report_at(
                    Level::BetweenTypes,
                    format!("interface \"{}\" has no type", name),
                    Some(locator.child(name)),
                );
            }
            overlay(merged.entry(name.clone()).or_default(), interface);
        }

        let mut resolved = BTreeMap::new();
        for (name, interface) in merged {
            let interface_locator = locator.child(&name);
            let chain = interface
                .type_name
                .as_deref()
                .map(|t| self.document.type_chain(TypeVariant::Interface, t))
                .unwrap_or_default();

            let mut input_definitions: BTreeMap<&str, &PropertyDefinition> = BTreeMap::new();
            let mut operations: BTreeMap<String, OperationDefinition> = BTreeMap::new();
            for (_, definition) in &chain {
                for (input, property) in &definition.inputs {
                    input_definitions.insert(input.as_str(), property);
                }
                for (operation, assignment) in &definition.operations {
                    operations.insert(operation.clone(), assignment.to_definition());
                }
            }
            for (operation, assignment) in &interface.operations {
                let mut definition = assignment.to_definition();
                if let Some(declared) = operations.get(operation) {
                    if definition.description.is_none() {
                        definition.description = declared.description.clone();
                    }
                }
                operations.insert(operation.clone(), definition);
            }

            let inputs = self.merge(
                &input_definitions,
                &BTreeMap::new(),
                &interface.inputs,
                Undeclared::Keep,
                false,
                &interface_locator.child("inputs"),
                sink,
            );

            resolved.insert(
                name,
                ResolvedInterface {
                    description: chain.last().and_then(|(_, d)| d.description.clone()),
                    type_name: interface.type_name,
                    inputs,
                    operations,
                },
            );
        }
        resolved
    }

    #[allow(clippy::too_many_arguments)]
    fn merge(
        &self,
        definitions: &BTreeMap<&str, &PropertyDefinition>,
        base: &BTreeMap<String, Value>,
        assignments: &BTreeMap<String, Value>,
        undeclared: Undeclared<'_>,
        check_required: bool,
        locator: &Locator,
        sink: &mut dyn ValidationSink,
    ) -> BTreeMap<String, ResolvedValue> {
        let mut resolved = BTreeMap::new();

        for (name, definition) in definitions {
            let raw = assignments
                .get(*name)
                .or_else(|| base.get(*name))
                .or(definition.default.as_ref())
                .or(definition.value.as_ref());

            let Some(raw) = raw else {
                if check_required && definition.is_required() {
                    sink.report_at(
                        Level::Field,
                        format!("required property \"{}\" has no value", name),
                        Some(locator.child(name)),
                    );
                }
                continue;
            };

            match self
                .coercer
                .coerce(None, definition.type_name.as_deref(), raw, name)
            {
                Ok(value) => {
                    resolved.insert(
                        name.to_string(),
                        ResolvedValue {
                            type_name: definition.type_name.clone(),
                            value,
                            description: definition.description.clone(),
                            required: definition.is_required(),
                        },
                    );
                }
                Err(message) => {
                    sink.report_at(Level::Field, message, Some(locator.child(name)));
                }
            }
        }

        for (name, value) in base.iter().chain(assignments) {
            if definitions.contains_key(name.as_str()) {
                continue;
            }
            match undeclared {
                Undeclared::Keep => {
                    resolved.insert(name.clone(), ResolvedValue::untyped(value.clone()));
                }
                Undeclared::Reject(type_name) => {
                    // Refinements on the definition itself are trusted.
                    if assignments.contains_key(name) && !base.contains_key(name) {
                        sink.report_at(
                            Level::BetweenTypes,
                            format!(
                                "property \"{}\" is not defined in type \"{}\"",
                                name, type_name
                            ),
                            Some(locator.child(name)),
                        );
                    } else {
                        resolved.insert(name.clone(), ResolvedValue::untyped(value.clone()));
                    }
                }
            }
        }

        resolved
    }
}

fn untyped(values: &BTreeMap<String, Value>) -> BTreeMap<String, ResolvedValue> {
    values
        .iter()
        .map(|(name, value)| (name.clone(), ResolvedValue::untyped(value.clone())))
        .collect()
}

fn overlay(target: &mut InterfaceAssignment, source: &InterfaceAssignment) {
    if source.type_name.is_some() {
        target.type_name = source.type_name.clone();
    }
    target
        .inputs
        .extend(source.inputs.iter().map(|(k, v)| (k.clone(), v.clone())));
    target
        .operations
        .extend(source.operations.iter().map(|(k, v)| (k.clone(), v.clone())));
}
