//! Instantiate command implementation.
//!
//! The `tosca-model instantiate` command builds a service template, turns it
//! into a service and prints the service graph as JSON followed by the
//! issues found on the way.

use std::io::Write;

use serde::Serialize;

use crate::cli::args::InstantiateArgs;
use crate::error::Result;
use crate::instantiation::instantiate_service;
use crate::modeling::Service;
use crate::validation::{Issue, IssueCollector, OutputFormat};

use super::common::{build_model, collect_inputs, write_issues};
use super::dispatcher::{Command, CommandResult};

/// The instantiate command implementation.
pub struct InstantiateCommand {
    args: InstantiateArgs,
    use_color: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    service: Option<&'a Service>,
    issues: &'a [Issue],
}

impl InstantiateCommand {
    /// Create a new instantiate command.
    pub fn new(args: InstantiateArgs, use_color: bool) -> Self {
        Self { args, use_color }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &InstantiateArgs {
        &self.args
    }
}

impl Command for InstantiateCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let args = &self.args.template;
        let inputs = collect_inputs(args)?;

        let mut issues = IssueCollector::new();
        let template = build_model(&args.template, &mut issues)?;
        let service = instantiate_service(&template, &inputs, &mut issues);

        if let Some(service) = &service {
            tracing::info!(
                "instantiated {}: {} nodes, {} groups, {} policies",
                args.template.display(),
                service.nodes.len(),
                service.groups.len(),
                service.policies.len()
            );
        }

        match args.format {
            OutputFormat::Json => {
                let report = Report {
                    service: service.as_ref(),
                    issues: issues.issues(),
                };
                serde_json::to_writer_pretty(&mut *out, &report).map_err(anyhow::Error::from)?;
                writeln!(out)?;
            }
            OutputFormat::Human => {
                if let Some(service) = &service {
                    serde_json::to_writer_pretty(&mut *out, service).map_err(anyhow::Error::from)?;
                    writeln!(out)?;
                }
                write_issues(issues.issues(), args.format, self.use_color, out)?;
            }
        }

        if service.is_none() || (args.strict && !issues.is_empty()) {
            return Ok(CommandResult::failure(1));
        }
        Ok(CommandResult::success())
    }
}
