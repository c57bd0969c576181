//! Error types for tosca-model operations.
//!
//! This module defines [`ModelError`], the error type used throughout the
//! crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Problems in the service template itself (bad fields, dangling references,
//!   instances that cannot be linked) are *not* errors. They are reported as
//!   [`Issue`](crate::validation::Issue)s through a
//!   [`ValidationSink`](crate::validation::ValidationSink) so a single pass
//!   surfaces all of them.
//! - `ModelError` is reserved for failures outside the template data (I/O,
//!   unreadable documents, bad CLI input) and for programmer errors such as
//!   registering an instantiator twice.
//! - Use `anyhow::Error` (via `ModelError::Other`) for unexpected errors.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tosca-model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Service template document not found at the given location.
    #[error("Service template not found: {path}")]
    DocumentNotFound { path: PathBuf },

    /// Failed to parse a service template document.
    #[error("Failed to parse service template at {path}: {message}")]
    DocumentParse { path: PathBuf, message: String },

    /// An instantiation function is already registered for this template kind.
    #[error("Instantiator already registered for {kind}; pass override to replace it")]
    DuplicateInstantiator { kind: &'static str },

    /// A user supplied input could not be understood.
    #[error("Invalid input '{name}': {message}")]
    InvalidInput { name: String, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for tosca-model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
