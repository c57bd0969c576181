//! Human-readable output formatter.
//!
//! Formats issues for terminal display with optional color support.

use super::IssueFormatter;
use crate::validation::{Issue, Level};
use console::style;
use std::io::Write;

/// Formats issues for human consumption.
pub struct HumanFormatter {
    /// Whether to use colors (ANSI escape codes).
    pub use_color: bool,
}

impl HumanFormatter {
    /// Create a new human formatter.
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn level_label(&self, level: Level) -> String {
        let label = format!("[{}]", level);
        if !self.use_color {
            return label;
        }
        let styled = match level {
            Level::Platform | Level::Syntax => style(label).red().bold(),
            Level::Field | Level::BetweenFields => style(label).yellow(),
            Level::BetweenTypes => style(label).magenta(),
            Level::BetweenInstances | Level::External => style(label).cyan(),
        };
        styled.force_styling(true).to_string()
    }
}

impl IssueFormatter for HumanFormatter {
    fn format<W: Write>(&self, issues: &[Issue], writer: &mut W) -> std::io::Result<()> {
        for issue in issues {
            writeln!(writer, "{} {}", self.level_label(issue.level), issue.message)?;
            if let Some(ref locator) = issue.locator {
                writeln!(writer, "  --> {}", locator)?;
            }
        }

        if !issues.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "Found {} issue(s)", issues.len())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Locator;

    fn render(formatter: &HumanFormatter, issues: &[Issue]) -> String {
        let mut output = Vec::new();
        formatter.format(issues, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn formats_issue_with_locator() {
        let formatter = HumanFormatter::new(false);
        let issues = vec![Issue::new(Level::BetweenTypes, "unknown node type \"db\"")
            .with_locator(Locator::new("topology_template.node_templates.mysql"))];

        let output = render(&formatter, &issues);

        assert!(output.contains("[between types] unknown node type \"db\""));
        assert!(output.contains("--> topology_template.node_templates.mysql"));
        assert!(output.contains("Found 1 issue(s)"));
    }

    #[test]
    fn color_output_contains_escape_codes() {
        let formatter = HumanFormatter::new(true);
        let issues = vec![Issue::new(Level::Syntax, "bad yaml")];

        let output = render(&formatter, &issues);

        assert!(output.contains("\u{1b}["));
        assert!(output.contains("bad yaml"));
    }

    #[test]
    fn no_summary_when_no_issues() {
        let formatter = HumanFormatter::new(false);
        let output = render(&formatter, &[]);
        assert!(output.is_empty());
    }
}
