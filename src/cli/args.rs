//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use crate::validation::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tosca-model - Build and instantiate service templates.
#[derive(Debug, Parser)]
#[command(name = "tosca-model")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build and instantiate a service template, printing the service
    Instantiate(InstantiateArgs),

    /// Build and instantiate a service template, printing only the issues
    Validate(ValidateArgs),

    /// Show the type hierarchies of a service template
    Types(TypesArgs),
}

/// Arguments shared by commands that instantiate a template.
#[derive(Debug, Clone, clap::Args)]
pub struct TemplateArgs {
    /// Service template file (YAML)
    pub template: PathBuf,

    /// Input value as NAME=VALUE; VALUE is parsed as YAML (repeatable)
    #[arg(short, long = "input", value_name = "NAME=VALUE")]
    pub inputs: Vec<String>,

    /// YAML file mapping input names to values
    #[arg(long, value_name = "FILE", env = "TOSCA_MODEL_INPUTS")]
    pub inputs_file: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Exit non-zero when any issue is reported
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `instantiate` command.
#[derive(Debug, Clone, clap::Args)]
pub struct InstantiateArgs {
    #[command(flatten)]
    pub template: TemplateArgs,
}

/// Arguments for the `validate` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub template: TemplateArgs,
}

/// Arguments for the `types` command.
#[derive(Debug, Clone, clap::Args)]
pub struct TypesArgs {
    /// Service template file (YAML)
    pub template: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}
