//! Service template presentation.
//!
//! The presentation is the parsed, read-only form of the source document.
//! It is what the model builder walks:
//!
//! - [`schema`]: serde structs of the YAML document
//! - [`loader`]: reading documents from disk
//! - [`values`]: resolving property, capability, requirement and interface
//!   values through type inheritance

pub mod loader;
pub mod schema;
pub mod values;

pub use loader::{load_document, parse_document};
pub use schema::*;
pub use values::{
    RelationshipAssignmentRef, ResolvedCapability, ResolvedInterface, ResolvedRequirement,
    ResolvedValue, ValueResolver,
};

use crate::types::TypeVariant;
use std::collections::{BTreeMap, HashSet};

impl ServiceTemplateDocument {
    /// The type catalog of one variant.
    pub fn types_of(&self, variant: TypeVariant) -> &BTreeMap<String, TypeDefinition> {
        match variant {
            TypeVariant::Node => &self.node_types,
            TypeVariant::Group => &self.group_types,
            TypeVariant::Policy => &self.policy_types,
            TypeVariant::Relationship => &self.relationship_types,
            TypeVariant::Capability => &self.capability_types,
            TypeVariant::Interface => &self.interface_types,
            TypeVariant::Artifact => &self.artifact_types,
        }
    }

    /// Definition of a type.
    pub fn type_definition(&self, variant: TypeVariant, name: &str) -> Option<&TypeDefinition> {
        self.types_of(variant).get(name)
    }

    /// A type and its ancestors, root first.
    ///
    /// Stops at an unknown parent or when a name repeats, so a malformed
    /// catalog yields a partial chain instead of looping.
    pub fn type_chain(&self, variant: TypeVariant, name: &str) -> Vec<(&str, &TypeDefinition)> {
        let catalog = self.types_of(variant);
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(name);

        while let Some(type_name) = current {
            if !seen.insert(type_name) {
                break;
            }
            let Some((key, definition)) = catalog.get_key_value(type_name) else {
                break;
            };
            chain.push((key.as_str(), definition));
            current = definition.derived_from.as_deref();
        }

        chain.reverse();
        chain
    }

    /// Topology section, or an empty one.
    pub fn topology(&self) -> std::borrow::Cow<'_, TopologyTemplate> {
        match &self.topology_template {
            Some(topology) => std::borrow::Cow::Borrowed(topology),
            None => std::borrow::Cow::Owned(TopologyTemplate::default()),
        }
    }

    /// Metadata value as a string.
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        self.metadata.get(key).map(|value| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> ServiceTemplateDocument {
        parse_document(
            r#"
metadata:
  template_name: demo
  template_version: 1.2
node_types:
  Root: {}
  Database: { derived_from: Root }
  MySQL: { derived_from: Database }
  Broken: { derived_from: Missing }
  A: { derived_from: B }
  B: { derived_from: A }
"#,
        )
        .unwrap()
    }

    #[test]
    fn type_chain_is_root_first() {
        let doc = document();
        let names: Vec<&str> = doc
            .type_chain(TypeVariant::Node, "MySQL")
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["Root", "Database", "MySQL"]);
    }

    #[test]
    fn type_chain_stops_on_dangling_and_cycles() {
        let doc = document();
        assert_eq!(doc.type_chain(TypeVariant::Node, "Broken").len(), 1);
        assert_eq!(doc.type_chain(TypeVariant::Node, "A").len(), 2);
        assert!(doc.type_chain(TypeVariant::Node, "Nope").is_empty());
        assert!(doc.type_chain(TypeVariant::Group, "Root").is_empty());
    }

    #[test]
    fn metadata_values_as_strings() {
        let doc = document();
        assert_eq!(doc.metadata_str("template_name").as_deref(), Some("demo"));
        assert_eq!(doc.metadata_str("template_version").as_deref(), Some("1.2"));
        assert_eq!(doc.metadata_str("template_author"), None);
    }

    #[test]
    fn missing_topology_is_empty() {
        let doc = ServiceTemplateDocument::default();
        assert!(doc.topology().node_templates.is_empty());
    }
}
