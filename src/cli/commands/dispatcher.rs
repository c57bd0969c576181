//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::io::Write;

use crate::cli::args::{Cli, Commands};
use crate::error::Result;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command, writing its report to `out`.
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    use_color: bool,
}

impl CommandDispatcher {
    /// Create a new dispatcher.
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    /// Whether human output is colored.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Route the CLI subcommand to its implementation and execute it.
    pub fn dispatch(&self, cli: &Cli, out: &mut dyn Write) -> Result<CommandResult> {
        match &cli.command {
            Commands::Instantiate(args) => {
                let cmd = super::instantiate::InstantiateCommand::new(args.clone(), self.use_color);
                cmd.execute(out)
            }
            Commands::Validate(args) => {
                let cmd = super::validate::ValidateCommand::new(args.clone(), self.use_color);
                cmd.execute(out)
            }
            Commands::Types(args) => {
                let cmd = super::types::TypesCommand::new(args.clone());
                cmd.execute(out)
            }
        }
    }
}
