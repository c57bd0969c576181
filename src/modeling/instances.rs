//! Instance records.
//!
//! The instance graph is what instantiating a [`ServiceTemplate`] produces:
//! one [`Service`] owning its nodes, groups, policies, workflows and
//! substitution. Instances refer to each other by generated id and keep the
//! name of the template they came from.
//!
//! [`ServiceTemplate`]: crate::modeling::templates::ServiceTemplate

use crate::modeling::parameter::Parameters;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A running service.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Service {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    /// Nodes keyed by id
    pub nodes: BTreeMap<String, Node>,
    /// Groups keyed by id
    pub groups: BTreeMap<String, Group>,
    /// Policies keyed by id
    pub policies: BTreeMap<String, Policy>,
    /// Workflows keyed by name
    pub workflows: BTreeMap<String, Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substitution: Option<Substitution>,
    pub inputs: Parameters,
    pub outputs: Parameters,
}

impl Service {
    /// Nodes instantiated from `template_name`, in id order.
    pub fn find_nodes(&self, template_name: &str) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|node| node.template_name == template_name)
            .collect()
    }

    /// Ids of the nodes instantiated from `template_name`.
    pub fn get_node_ids(&self, template_name: &str) -> Vec<String> {
        self.find_nodes(template_name)
            .into_iter()
            .map(|node| node.id.clone())
            .collect()
    }

    /// Groups instantiated from `template_name`, in id order.
    pub fn find_groups(&self, template_name: &str) -> Vec<&Group> {
        self.groups
            .values()
            .filter(|group| group.template_name == template_name)
            .collect()
    }

    /// Ids of the groups instantiated from `template_name`.
    pub fn get_group_ids(&self, template_name: &str) -> Vec<String> {
        self.find_groups(template_name)
            .into_iter()
            .map(|group| group.id.clone())
            .collect()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Every relationship in the service, grouped by source node.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.nodes
            .values()
            .flat_map(|node| node.outbound_relationships.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    /// Name of the node template this node came from
    pub template_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub properties: Parameters,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, Interface>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, Artifact>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, Capability>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outbound_relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Capability {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub min_occurrences: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_occurrences: Option<u32>,
    /// Relationships currently targeting this capability
    pub occurrences: u32,
    pub properties: Parameters,
}

impl Capability {
    /// Whether another relationship may target this capability.
    pub fn has_room(&self) -> bool {
        self.max_occurrences
            .is_none_or(|max| self.occurrences < max)
    }

    /// Whether enough relationships target this capability.
    pub fn has_enough_relationships(&self) -> bool {
        self.occurrences >= self.min_occurrences
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Interface {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: Parameters,
    pub operations: BTreeMap<String, Operation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<i64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: Parameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_edge: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub repository_credential: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Parameters,
}

/// A satisfied requirement: an edge from one node to another.
#[derive(Debug, Clone, Serialize)]
pub struct Relationship {
    /// Name of the requirement this relationship satisfies
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Shared relationship template this came from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    pub source_node_id: String,
    pub target_node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_capability_name: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Parameters,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, Interface>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub id: String,
    pub template_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Parameters,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, Interface>,
    pub member_node_ids: Vec<String>,
    pub member_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Policy {
    pub id: String,
    pub template_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Parameters,
    pub target_node_ids: Vec<String>,
    pub target_group_ids: Vec<String>,
}

/// The service exposed as a node of type `node_type_name`.
#[derive(Debug, Clone, Serialize)]
pub struct Substitution {
    pub node_type_name: String,
    /// Keyed `capability.<name>` and `requirement.<name>`
    pub mappings: BTreeMap<String, Mapping>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Mapping {
    pub mapped_name: String,
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement_name: Option<String>,
}

/// Generates instance ids of the form `<template_name>_<n>`.
///
/// Counters are per template and start at 1, so ids are unique within one
/// generator and repeatable across runs.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    counters: HashMap<String, u32>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id for an instance of `template_name`.
    pub fn next_id(&mut self, template_name: &str) -> String {
        let counter = self.counters.entry(template_name.to_string()).or_insert(0);
        *counter += 1;
        format!("{}_{}", template_name, counter)
    }

    /// Forget every counter.
    pub fn reset(&mut self) {
        self.counters.clear();
    }
}
