//! Type registry.
//!
//! Every type catalog of a service template (node, group, policy,
//! relationship, capability, interface, artifact) becomes a [`TypeForest`].
//! [`TypeRegistry`] bundles the seven forests of one template.

pub mod forest;

pub use forest::{create_types, TypeForest, TypeId, TypeNode, TypeVariant};

use crate::presentation::ServiceTemplateDocument;
use crate::validation::{Locator, ValidationSink};

/// The type forests of one service template.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRegistry {
    pub node_types: TypeForest,
    pub group_types: TypeForest,
    pub policy_types: TypeForest,
    pub relationship_types: TypeForest,
    pub capability_types: TypeForest,
    pub interface_types: TypeForest,
    pub artifact_types: TypeForest,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self {
            node_types: TypeForest::new(TypeVariant::Node),
            group_types: TypeForest::new(TypeVariant::Group),
            policy_types: TypeForest::new(TypeVariant::Policy),
            relationship_types: TypeForest::new(TypeVariant::Relationship),
            capability_types: TypeForest::new(TypeVariant::Capability),
            interface_types: TypeForest::new(TypeVariant::Interface),
            artifact_types: TypeForest::new(TypeVariant::Artifact),
        }
    }
}

impl TypeRegistry {
    /// Build every forest from a document's type catalogs.
    pub fn from_document(document: &ServiceTemplateDocument, sink: &mut dyn ValidationSink) -> Self {
        let mut registry = Self::default();
        for variant in TypeVariant::ALL {
            let catalog = document.types_of(variant);
            create_types(
                registry.forest_mut(variant),
                catalog,
                &Locator::new(variant.catalog_key()),
                sink,
            );
        }
        registry
    }

    /// The forest of one variant.
    pub fn forest(&self, variant: TypeVariant) -> &TypeForest {
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

    pub fn forest_mut(&mut self, variant: TypeVariant) -> &mut TypeForest {
        match variant {
            TypeVariant::Node => &mut self.node_types,
            TypeVariant::Group => &mut self.group_types,
            TypeVariant::Policy => &mut self.policy_types,
            TypeVariant::Relationship => &mut self.relationship_types,
            TypeVariant::Capability => &mut self.capability_types,
            TypeVariant::Interface => &mut self.interface_types,
            TypeVariant::Artifact => &mut self.artifact_types,
        }
    }

    /// Total number of materialized types.
    pub fn len(&self) -> usize {
        TypeVariant::ALL.iter().map(|v| self.forest(*v).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
