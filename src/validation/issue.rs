//! Validation issues.
//!
//! This module provides the [`Issue`] type for representing problems found
//! while building or instantiating a service template, together with its
//! [`Level`] and an optional [`Locator`] pointing into the source document.

use serde::Serialize;

/// How far into processing a problem was discovered.
///
/// Levels are ordered: an issue between instances is found later (and is
/// usually a consequence of) an issue in a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Problem in the processing platform itself.
    Platform,
    /// Malformed document syntax.
    Syntax,
    /// Issue in a single field of a definition.
    Field,
    /// Issue between fields of the same definition.
    BetweenFields,
    /// Issue between types or between templates and their types.
    BetweenTypes,
    /// Issue discovered only while linking instances.
    BetweenInstances,
    /// Issue in an external dependency.
    External,
}

impl Level {
    /// Short lowercase name used in output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Platform => "platform",
            Level::Syntax => "syntax",
            Level::Field => "field",
            Level::BetweenFields => "between fields",
            Level::BetweenTypes => "between types",
            Level::BetweenInstances => "between instances",
            Level::External => "external",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dotted path into the source document, e.g.
/// `topology_template.node_templates.web.requirements[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Locator(pub String);

impl Locator {
    /// Create a locator from a path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Locator of a named child.
    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    /// Locator of an indexed child.
    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A problem found in a service template.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    /// Level of this issue.
    pub level: Level,
    /// Human-readable message.
    pub message: String,
    /// Optional source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
}

impl Issue {
    /// Create a new issue.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            locator: None,
        }
    }

    /// Add a source locator to this issue.
    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = Some(locator);
        self
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.locator {
            Some(locator) => write!(f, "{} ({}) @ {}", self.message, self.level, locator),
            None => write!(f, "{} ({})", self.message, self.level),
        }
    }
}
