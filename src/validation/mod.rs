//! Validation issue reporting.
//!
//! Building and instantiating a service template never stops at the first
//! problem. Every problem found in the template data is recorded as an
//! [`Issue`] through a [`ValidationSink`], so one pass surfaces all of them.
//!
//! # Overview
//!
//! - **Issues** - A message with a [`Level`] and an optional [`Locator`]
//! - **Sinks** - Anything that accepts issues ([`ValidationSink`] trait)
//! - **Collector** - The default in-memory sink ([`IssueCollector`])
//! - **Output** - Formatters for displaying collected issues
//!
//! # Example
//!
//! ```
//! use tosca_model::validation::{Issue, IssueCollector, Level, ValidationSink};
//!
//! let mut issues = IssueCollector::new();
//! issues.report(Issue::new(Level::BetweenTypes, "unknown node type \"web\""));
//!
//! assert_eq!(issues.len(), 1);
//! assert_eq!(issues.max_level(), Some(Level::BetweenTypes));
//!
//! // Levels are ordered from platform problems to external ones
//! assert!(Level::Field < Level::BetweenInstances);
//! ```

pub mod issue;
pub mod output;
pub mod sink;

pub use issue::{Issue, Level, Locator};
pub use output::{HumanFormatter, IssueFormatter, JsonFormatter, OutputFormat};
pub use sink::{IssueCollector, ValidationSink};
