//! Validate command implementation.
//!
//! The `tosca-model validate` command runs the same build and instantiation
//! as `instantiate` but only reports the issues.

use std::io::Write;

use crate::cli::args::ValidateArgs;
use crate::error::Result;
use crate::instantiation::instantiate_service;
use crate::validation::{IssueCollector, Level, OutputFormat};

use super::common::{build_model, collect_inputs, write_issues};
use super::dispatcher::{Command, CommandResult};

/// The validate command implementation.
pub struct ValidateCommand {
    args: ValidateArgs,
    use_color: bool,
}

impl ValidateCommand {
    /// Create a new validate command.
    pub fn new(args: ValidateArgs, use_color: bool) -> Self {
        Self { args, use_color }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &ValidateArgs {
        &self.args
    }
}

impl Command for ValidateCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let args = &self.args.template;
        let inputs = collect_inputs(args)?;

        let mut issues = IssueCollector::new();
        let template = build_model(&args.template, &mut issues)?;
        let service = instantiate_service(&template, &inputs, &mut issues);

        tracing::info!(
            "validated {}: {} issue(s), {} between instances",
            args.template.display(),
            issues.len(),
            issues.count_at_least(Level::BetweenInstances)
        );

        if issues.is_empty() && args.format == OutputFormat::Human {
            writeln!(out, "No issues found")?;
        } else {
            write_issues(issues.issues(), args.format, self.use_color, out)?;
        }

        if service.is_none() || (args.strict && !issues.is_empty()) {
            return Ok(CommandResult::failure(1));
        }
        Ok(CommandResult::success())
    }
}
