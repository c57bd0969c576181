//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. Loading a template, reading input
//! values and printing issues are shared through [`common`].

pub mod common;
pub mod dispatcher;
pub mod instantiate;
pub mod types;
pub mod validate;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
