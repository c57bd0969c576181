//! The template model and the instance model.
//!
//! # Overview
//!
//! - [`builder`] - Builds a [`ServiceTemplate`] from a presentation document
//! - [`templates`] - Template model records, linked by arena ids
//! - [`instances`] - Instance records produced by instantiation
//! - [`parameter`] - Named, typed values shared by both models
//! - [`constraints`] - Node filter constraints compiled to evaluable values
//! - [`coerce`] - Value coercion and intrinsic functions
//! - [`scope`] - Function evaluation over a template model
//! - [`implementation`] - Operation implementation strings

pub mod builder;
pub mod coerce;
pub mod constraints;
pub mod implementation;
pub mod instances;
pub mod parameter;
pub mod scope;
pub mod templates;

pub use builder::{create_service_template_model, ModelingContext};
pub use coerce::{Coercer, Container, DefaultCoercer, Function};
pub use constraints::{Constraint, ConstraintClause, NodeFilterConstraint};
pub use instances::{
    Artifact, Capability, Group, IdGenerator, Interface, Mapping, Node, Operation, Policy,
    Relationship, Service, Substitution,
};
pub use parameter::{Parameter, Parameters};
pub use scope::Scope;
pub use templates::{
    ArtifactTemplate, CapabilityTemplate, GroupTemplate, InterfaceTemplate, NodeTemplate,
    NodeTemplateId, OperationTemplate, PluginSpecification, PolicyTemplate, RelationshipTemplate,
    RequirementTemplate, ServiceTemplate, SubstitutionTemplate, SubstitutionTemplateMapping,
};
