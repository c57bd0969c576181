//! Template model records.
//!
//! The template model is the linked, typed form of a service template.
//! Templates refer to each other through arena ids and to their types
//! through [`TypeId`]s; names are kept alongside for display and for
//! templates whose references did not resolve.

use crate::arena::{Id, NamedArena};
use crate::modeling::constraints::NodeFilterConstraint;
use crate::modeling::parameter::Parameters;
use crate::types::{TypeId, TypeRegistry};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

pub type NodeTemplateId = Id<NodeTemplate>;
pub type GroupTemplateId = Id<GroupTemplate>;
pub type PolicyTemplateId = Id<PolicyTemplate>;
pub type RelationshipTemplateId = Id<RelationshipTemplate>;

/// The root of the template model.
#[derive(Debug, Clone)]
pub struct ServiceTemplate {
    pub description: Option<String>,
    /// Every metadata entry, including the well-known ones below
    pub metadata: BTreeMap<String, Value>,
    pub template_name: Option<String>,
    pub template_author: Option<String>,
    pub template_version: Option<String>,
    /// File name of the source document
    pub main_file_name: Option<String>,
    pub created_at: DateTime<Utc>,

    pub types: TypeRegistry,

    pub inputs: Parameters,
    pub outputs: Parameters,

    /// Policies of role `plugin`
    pub plugin_specifications: BTreeMap<String, PluginSpecification>,
    /// Policies of role `workflow`
    pub workflow_templates: BTreeMap<String, OperationTemplate>,

    pub node_templates: NamedArena<NodeTemplate>,
    pub relationship_templates: NamedArena<RelationshipTemplate>,
    pub group_templates: NamedArena<GroupTemplate>,
    pub policy_templates: NamedArena<PolicyTemplate>,
    pub substitution_template: Option<SubstitutionTemplate>,
}

impl Default for ServiceTemplate {
    fn default() -> Self {
        Self {
            description: None,
            metadata: BTreeMap::new(),
            template_name: None,
            template_author: None,
            template_version: None,
            main_file_name: None,
            created_at: Utc::now(),
            types: TypeRegistry::default(),
            inputs: Parameters::new(),
            outputs: Parameters::new(),
            plugin_specifications: BTreeMap::new(),
            workflow_templates: BTreeMap::new(),
            node_templates: NamedArena::new(),
            relationship_templates: NamedArena::new(),
            group_templates: NamedArena::new(),
            policy_templates: NamedArena::new(),
            substitution_template: None,
        }
    }
}

impl ServiceTemplate {
    /// Node template by name.
    pub fn node_template(&self, name: &str) -> Option<&NodeTemplate> {
        self.node_templates.by_name(name)
    }

    /// Group template by name.
    pub fn group_template(&self, name: &str) -> Option<&GroupTemplate> {
        self.group_templates.by_name(name)
    }

    /// Whether a node template's type is `node_type` or derives from it.
    pub fn node_template_is_a(&self, template: &NodeTemplate, node_type: &str) -> bool {
        self.types
            .node_types
            .is_descendant_of(&template.type_name, node_type)
    }
}

/// A plugin the service needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSpecification {
    pub name: String,
    pub version: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct NodeTemplate {
    pub name: String,
    pub description: Option<String>,
    pub type_name: String,
    pub type_id: Option<TypeId>,
    /// Instances created when the service is instantiated
    pub default_instances: u32,
    pub min_instances: u32,
    pub max_instances: Option<u32>,
    pub properties: Parameters,
    pub interface_templates: BTreeMap<String, InterfaceTemplate>,
    pub artifact_templates: BTreeMap<String, ArtifactTemplate>,
    pub capability_templates: BTreeMap<String, CapabilityTemplate>,
    pub requirement_templates: Vec<RequirementTemplate>,
    /// Own node filter; a requirement selecting this template by type or
    /// capability binds only when it holds
    pub target_node_template_constraints: Vec<NodeFilterConstraint>,
}

impl NodeTemplate {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            type_name: type_name.into(),
            type_id: None,
            default_instances: 1,
            min_instances: 0,
            max_instances: None,
            properties: Parameters::new(),
            interface_templates: BTreeMap::new(),
            artifact_templates: BTreeMap::new(),
            capability_templates: BTreeMap::new(),
            requirement_templates: Vec::new(),
            target_node_template_constraints: Vec::new(),
        }
    }
}

/// A requirement of a node template, linked to what satisfies it.
#[derive(Debug, Clone, Default)]
pub struct RequirementTemplate {
    pub name: String,
    /// Target named by node type
    pub target_node_type_name: Option<String>,
    pub target_node_type: Option<TypeId>,
    /// Target named by node template
    pub target_node_template: Option<NodeTemplateId>,
    /// Target capability named by capability type
    pub target_capability_type_name: Option<String>,
    pub target_capability_type: Option<TypeId>,
    /// Target capability named by capability name
    pub target_capability_name: Option<String>,
    pub relationship_template: Option<RelationshipTemplate>,
    /// Node filter constraints on the target
    pub target_node_template_constraints: Vec<NodeFilterConstraint>,
}

#[derive(Debug, Clone, Default)]
pub struct RelationshipTemplate {
    /// Name of the shared relationship template this came from, if any
    pub name: Option<String>,
    pub description: Option<String>,
    pub type_name: Option<String>,
    pub type_id: Option<TypeId>,
    pub properties: Parameters,
    pub interface_templates: BTreeMap<String, InterfaceTemplate>,
}

#[derive(Debug, Clone)]
pub struct CapabilityTemplate {
    pub name: String,
    pub description: Option<String>,
    pub type_name: String,
    pub type_id: Option<TypeId>,
    pub min_occurrences: u32,
    pub max_occurrences: Option<u32>,
    pub valid_source_node_types: Vec<TypeId>,
    pub properties: Parameters,
}

#[derive(Debug, Clone)]
pub struct InterfaceTemplate {
    pub name: String,
    pub description: Option<String>,
    pub type_name: Option<String>,
    pub type_id: Option<TypeId>,
    pub inputs: Parameters,
    pub operation_templates: BTreeMap<String, OperationTemplate>,
}

#[derive(Debug, Clone, Default)]
pub struct OperationTemplate {
    pub name: String,
    pub description: Option<String>,
    /// Implementation path without the plugin prefix
    pub implementation: Option<String>,
    /// Plugin specification that runs this operation
    pub plugin: Option<String>,
    pub dependencies: Vec<String>,
    /// Configuration from `key > value` dependencies
    pub configuration: BTreeMap<String, Value>,
    pub executor: Option<String>,
    pub max_retries: Option<i64>,
    pub retry_interval: Option<i64>,
    pub inputs: Parameters,
    /// `Some(false)` runs on the relationship source, `Some(true)` on the target
    pub relationship_edge: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ArtifactTemplate {
    pub name: String,
    pub description: Option<String>,
    pub type_name: String,
    pub type_id: Option<TypeId>,
    pub source_path: String,
    pub target_path: Option<String>,
    pub repository_url: Option<String>,
    pub repository_credential: BTreeMap<String, Value>,
    pub properties: Parameters,
}

#[derive(Debug, Clone)]
pub struct GroupTemplate {
    pub name: String,
    pub description: Option<String>,
    pub type_name: String,
    pub type_id: Option<TypeId>,
    pub properties: Parameters,
    pub interface_templates: BTreeMap<String, InterfaceTemplate>,
    pub member_node_templates: Vec<NodeTemplateId>,
    pub member_group_templates: Vec<GroupTemplateId>,
}

#[derive(Debug, Clone)]
pub struct PolicyTemplate {
    pub name: String,
    pub description: Option<String>,
    pub type_name: String,
    pub type_id: Option<TypeId>,
    pub properties: Parameters,
    pub target_node_templates: Vec<NodeTemplateId>,
    pub target_group_templates: Vec<GroupTemplateId>,
}

/// The topology exposed as a node of another service.
#[derive(Debug, Clone)]
pub struct SubstitutionTemplate {
    pub node_type_name: String,
    pub node_type: Option<TypeId>,
    /// Keyed `capability.<name>` and `requirement.<name>`
    pub mappings: BTreeMap<String, SubstitutionTemplateMapping>,
}

/// One exposed capability or requirement.
#[derive(Debug, Clone)]
pub struct SubstitutionTemplateMapping {
    pub mapped_name: String,
    pub node_template: NodeTemplateId,
    pub capability_name: Option<String>,
    pub requirement_name: Option<String>,
}

impl SubstitutionTemplateMapping {
    /// Name of the mapped capability or requirement on the node template.
    pub fn target_name(&self) -> Option<&str> {
        self.capability_name
            .as_deref()
            .or(self.requirement_name.as_deref())
    }
}
