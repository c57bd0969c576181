//! tosca-model - Service template modeling and instantiation.
//!
//! tosca-model reads a declarative, type-hierarchical service template,
//! builds a linked template model from it and instantiates that model into
//! a graph of running nodes, relationships, groups and policies.
//!
//! # Modules
//!
//! - [`arena`] - Typed arenas with stable ids and name lookup
//! - [`cli`] - Command-line interface and argument parsing
//! - [`error`] - Error types and result aliases
//! - [`instantiation`] - Pluggable per-kind instantiation and requirement satisfaction
//! - [`modeling`] - Template model, instance model and the model builder
//! - [`presentation`] - Source document schema, loading and value resolution
//! - [`types`] - Type forests for every type category
//! - [`validation`] - Issue levels, sinks and formatters
//!
//! # Example
//!
//! ```
//! use tosca_model::instantiation::instantiate_service;
//! use tosca_model::modeling::{create_service_template_model, ModelingContext};
//! use tosca_model::presentation::parse_document;
//! use tosca_model::validation::IssueCollector;
//! use std::collections::BTreeMap;
//!
//! let document = parse_document(
//!     r#"
//! node_types:
//!   Compute: {}
//! topology_template:
//!   node_templates:
//!     vm: { type: Compute }
//! "#,
//! )
//! .unwrap();
//!
//! let mut issues = IssueCollector::new();
//! let template = create_service_template_model(&mut ModelingContext::new(&document, &mut issues));
//! let service = instantiate_service(&template, &BTreeMap::new(), &mut issues).unwrap();
//!
//! assert!(issues.is_empty());
//! assert_eq!(service.get_node_ids("vm"), vec!["vm_1"]);
//! ```
//!
//! For file-based loading, see the integration tests.

pub mod arena;
pub mod cli;
pub mod error;
pub mod instantiation;
pub mod modeling;
pub mod presentation;
pub mod types;
pub mod validation;

pub use error::{ModelError, Result};
