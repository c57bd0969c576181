//! Issue output formatters.
//!
//! This module provides formatters for writing collected issues
//! in different formats (human-readable, JSON).

pub mod human;
pub mod json;

use crate::validation::Issue;
use std::io::Write;

/// Output format for issue reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Trait for formatting issues.
pub trait IssueFormatter {
    /// Format issues to the given writer.
    fn format<W: Write>(&self, issues: &[Issue], writer: &mut W) -> std::io::Result<()>;
}

pub use human::HumanFormatter;
pub use json::JsonFormatter;
