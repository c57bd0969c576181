//! Service template document schema.
//!
//! This module contains the struct definitions that map to the
//! (simplified) YAML service template format. The document is read-only
//! input: the model builder never mutates it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root of a service template document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceTemplateDocument {
    /// Grammar version marker (`tosca_simple_yaml_1_0`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tosca_definitions_version: Option<String>,

    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Template metadata (`template_name`, `template_author`, ...)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,

    /// Artifact repositories
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub repositories: BTreeMap<String, RepositoryDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub node_types: BTreeMap<String, TypeDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub group_types: BTreeMap<String, TypeDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub policy_types: BTreeMap<String, TypeDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub relationship_types: BTreeMap<String, TypeDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub capability_types: BTreeMap<String, TypeDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interface_types: BTreeMap<String, TypeDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub artifact_types: BTreeMap<String, TypeDefinition>,

    /// The topology: inputs, templates, groups, policies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology_template: Option<TopologyTemplate>,

    /// Where the document was loaded from (not part of the document)
    #[serde(skip)]
    pub location: Option<PathBuf>,
}

/// A type definition. One shape serves every type category; fields that do
/// not apply to a category are simply left empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeDefinition {
    /// Parent type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Property definitions
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyDefinition>,

    /// Capability definitions (node types)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, CapabilityDefinition>,

    /// Requirement definitions (node types), in declaration order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<BTreeMap<String, RequirementDefinition>>,

    /// Interface assignments (node, group and relationship types)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, InterfaceAssignment>,

    /// Input definitions (interface types)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, PropertyDefinition>,

    /// Operation definitions (interface types)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub operations: BTreeMap<String, OperationAssignment>,

    /// Vendor extensions; `role` classifies the type
    #[serde(rename = "_extensions", skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, Value>,
}

impl TypeDefinition {
    /// The `role` extension, if any.
    pub fn role(&self) -> Option<&str> {
        self.extensions.get("role").and_then(Value::as_str)
    }
}

/// Definition of a property, input or output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyDefinition {
    /// Declared data type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Default value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Fixed value (outputs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Whether a value must be present (defaults to true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl PropertyDefinition {
    /// Whether this definition demands a value.
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }
}

/// Capability definition on a node type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityDefinition {
    /// Capability type name
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Property values refining the capability type's defaults
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,

    /// `[min, max]`, max may be `UNBOUNDED`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrences: Option<Vec<Value>>,

    /// Node types allowed as the source of a relationship to this capability
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub valid_source_types: Vec<String>,
}

/// Requirement definition on a node type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementDefinition {
    /// Capability type or capability name the requirement targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,

    /// Node type or node template the requirement targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// Relationship type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,

    /// `[min, max]`, max may be `UNBOUNDED`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrences: Option<Vec<Value>>,
}

/// Interface on a type or a template.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceAssignment {
    /// Interface type name (inherited when omitted on a template)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    /// Input values shared by all operations
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, Value>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub operations: BTreeMap<String, OperationAssignment>,
}

/// An operation, either a bare implementation string or a full definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperationAssignment {
    /// `create: scripts/create.sh`
    Short(String),
    Full(OperationDefinition),
}

impl OperationAssignment {
    /// Normalize to the full form.
    pub fn to_definition(&self) -> OperationDefinition {
        match self {
            OperationAssignment::Short(implementation) => OperationDefinition {
                implementation: Some(ImplementationDefinition::Primary(implementation.clone())),
                ..Default::default()
            },
            OperationAssignment::Full(definition) => definition.clone(),
        }
    }
}

/// Full operation definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<ImplementationDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, Value>,

    /// Executor name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i64>,

    /// Seconds between retries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<i64>,

    /// Vendor extensions; `relationship_edge` is `source` or `target`
    #[serde(rename = "_extensions", skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, Value>,
}

/// Operation implementation: primary artifact plus optional dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImplementationDefinition {
    Primary(String),
    Full {
        primary: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        dependencies: Vec<String>,
    },
}

impl ImplementationDefinition {
    /// The primary implementation string.
    pub fn primary(&self) -> &str {
        match self {
            ImplementationDefinition::Primary(primary) => primary,
            ImplementationDefinition::Full { primary, .. } => primary,
        }
    }

    /// Dependency strings, possibly in `key > value` form.
    pub fn dependencies(&self) -> &[String] {
        match self {
            ImplementationDefinition::Primary(_) => &[],
            ImplementationDefinition::Full { dependencies, .. } => dependencies,
        }
    }
}

/// Artifact repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryDefinition {
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub credential: BTreeMap<String, Value>,
}

/// The topology section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, PropertyDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, PropertyDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub node_templates: BTreeMap<String, NodeTemplateDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub relationship_templates: BTreeMap<String, RelationshipTemplateDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, GroupDefinition>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub policies: BTreeMap<String, PolicyDefinition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub substitution_mappings: Option<SubstitutionMappingsDefinition>,
}

/// A node template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTemplateDefinition {
    /// Node type name
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Property assignments
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, CapabilityAssignment>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, InterfaceAssignment>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, ArtifactDefinition>,

    /// Requirement assignments, in declaration order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<BTreeMap<String, RequirementAssignment>>,

    /// Filter used when this template is a selectable abstract node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_filter: Option<NodeFilterDefinition>,
}

/// Property assignments for one capability of a node template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityAssignment {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

/// A requirement assignment: either a bare target node name or a full form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequirementAssignment {
    /// `- host: my_server`
    Short(String),
    Full(RequirementAssignmentDefinition),
}

/// Full requirement assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementAssignmentDefinition {
    /// Node template or node type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// Capability name or capability type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<RelationshipAssignment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_filter: Option<NodeFilterDefinition>,
}

impl RequirementAssignment {
    /// Normalize to the full form.
    pub fn to_definition(&self) -> RequirementAssignmentDefinition {
        match self {
            RequirementAssignment::Short(node) => RequirementAssignmentDefinition {
                node: Some(node.clone()),
                ..Default::default()
            },
            RequirementAssignment::Full(definition) => definition.clone(),
        }
    }
}

/// A relationship in a requirement: a relationship type name, a relationship
/// template name, or an inline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipAssignment {
    Named(String),
    Inline(RelationshipAssignmentDefinition),
}

/// Inline relationship.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipAssignmentDefinition {
    /// Relationship type or relationship template name
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, InterfaceAssignment>,
}

/// Node filter: property constraints and capability property constraints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeFilterDefinition {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<BTreeMap<String, ConstraintSpec>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<BTreeMap<String, CapabilityFilterDefinition>>,
}

/// Property constraints on one capability inside a node filter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityFilterDefinition {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<BTreeMap<String, ConstraintSpec>>,
}

/// One constraint clause (`{ in_range: [1, 4] }`) or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintSpec {
    Single(BTreeMap<String, Value>),
    List(Vec<BTreeMap<String, Value>>),
}

impl ConstraintSpec {
    /// Each raw clause map.
    pub fn clauses(&self) -> Vec<&BTreeMap<String, Value>> {
        match self {
            ConstraintSpec::Single(clause) => vec![clause],
            ConstraintSpec::List(clauses) => clauses.iter().collect(),
        }
    }
}

/// An artifact on a node template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactDefinition {
    #[serde(rename = "type")]
    pub type_name: String,

    /// Source path of the artifact
    pub file: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Repository name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Target path on the node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_path: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

/// A reusable relationship template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipTemplateDefinition {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, InterfaceAssignment>,
}

/// A group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupDefinition {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,

    /// Member node template (or group) names
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, InterfaceAssignment>,
}

/// A policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDefinition {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,

    /// Target node template or group names
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
}

/// Substitution mappings: exposes this topology as a node type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstitutionMappingsDefinition {
    pub node_type: String,

    /// `<mapped name>: [node_template, capability]`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, Vec<String>>,

    /// `<mapped name>: [node_template, requirement]`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub requirements: BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_document() {
        let yaml = r#"
tosca_definitions_version: tosca_simple_yaml_1_0
node_types:
  tosca.nodes.Root: {}
topology_template:
  node_templates:
    web:
      type: tosca.nodes.Root
"#;
        let doc: ServiceTemplateDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.node_types.len(), 1);
        let topology = doc.topology_template.unwrap();
        assert_eq!(topology.node_templates["web"].type_name, "tosca.nodes.Root");
    }

    #[test]
    fn parse_type_role_extension() {
        let yaml = r#"
derived_from: tosca.policies.Root
_extensions:
  role: plugin
"#;
        let def: TypeDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.role(), Some("plugin"));
        assert_eq!(def.derived_from.as_deref(), Some("tosca.policies.Root"));
    }

    #[test]
    fn parse_short_and_full_requirements() {
        let yaml = r#"
type: WebServer
requirements:
  - host: server
  - database:
      node: mysql
      capability: db_endpoint
      relationship: tosca.relationships.ConnectsTo
"#;
        let def: NodeTemplateDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.requirements.len(), 2);

        let host = def.requirements[0]["host"].to_definition();
        assert_eq!(host.node.as_deref(), Some("server"));

        let database = def.requirements[1]["database"].to_definition();
        assert_eq!(database.capability.as_deref(), Some("db_endpoint"));
        assert!(matches!(
            database.relationship,
            Some(RelationshipAssignment::Named(ref name)) if name == "tosca.relationships.ConnectsTo"
        ));
    }

    #[test]
    fn parse_operation_forms() {
        let yaml = r#"
type: tosca.interfaces.node.lifecycle.Standard
operations:
  create: scripts/create.sh
  configure:
    implementation:
      primary: ansible > playbooks/configure.yaml
      dependencies:
        - ansible.user > admin
        - files/extra.cfg
    inputs:
      port: 8080
"#;
        let interface: InterfaceAssignment = serde_yaml::from_str(yaml).unwrap();
        let create = interface.operations["create"].to_definition();
        assert_eq!(
            create.implementation.as_ref().map(|i| i.primary()),
            Some("scripts/create.sh")
        );

        let configure = interface.operations["configure"].to_definition();
        let implementation = configure.implementation.unwrap();
        assert_eq!(implementation.primary(), "ansible > playbooks/configure.yaml");
        assert_eq!(implementation.dependencies().len(), 2);
        assert_eq!(configure.inputs["port"], 8080);
    }

    #[test]
    fn parse_node_filter_clauses() {
        let yaml = r#"
properties:
  - num_cpus: { in_range: [1, 4] }
  - os_type: [ { valid_values: [linux, bsd] }, { min_length: 3 } ]
capabilities:
  - host:
      properties:
        - mem_size: { greater_or_equal: 1024 }
"#;
        let filter: NodeFilterDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(filter.properties.len(), 2);
        assert_eq!(filter.properties[0]["num_cpus"].clauses().len(), 1);
        assert_eq!(filter.properties[1]["os_type"].clauses().len(), 2);
        assert_eq!(filter.capabilities[0]["host"].properties.len(), 1);
    }

    #[test]
    fn property_required_defaults_to_true() {
        let def = PropertyDefinition::default();
        assert!(def.is_required());

        let optional = PropertyDefinition {
            required: Some(false),
            ..Default::default()
        };
        assert!(!optional.is_required());
    }
}
