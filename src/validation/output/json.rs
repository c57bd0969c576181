//! JSON output formatter.
//!
//! Formats issues as machine-readable JSON for tooling integration.

use super::IssueFormatter;
use crate::validation::{Issue, Level};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

/// Formats issues as JSON.
pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonOutput<'a> {
    issues: &'a [Issue],
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonSummary {
    total: usize,
    by_level: BTreeMap<Level, usize>,
}

impl JsonFormatter {
    /// Create a new JSON formatter.
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl IssueFormatter for JsonFormatter {
    fn format<W: Write>(&self, issues: &[Issue], writer: &mut W) -> std::io::Result<()> {
        let mut by_level = BTreeMap::new();
        for issue in issues {
            *by_level.entry(issue.level).or_insert(0) += 1;
        }

        let output = JsonOutput {
            issues,
            summary: JsonSummary {
                total: issues.len(),
                by_level,
            },
        };

        serde_json::to_writer_pretty(&mut *writer, &output).map_err(std::io::Error::other)?;
        writeln!(writer)?;

        Ok(())
    }
}
