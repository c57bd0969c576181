//! Issue sinks.
//!
//! The [`ValidationSink`] trait is the reporting collaborator threaded through
//! model building and instantiation. Reporting never fails and never panics.

use super::issue::{Issue, Level, Locator};

/// Accepts validation issues.
pub trait ValidationSink {
    /// Record an issue.
    fn report(&mut self, issue: Issue);

    /// Record an issue built from its parts.
    fn report_at(&mut self, level: Level, message: String, locator: Option<Locator>) {
        let issue = Issue::new(level, message);
        match locator {
            Some(locator) => self.report(issue.with_locator(locator)),
            None => self.report(issue),
        }
    }
}

/// In-memory sink that keeps every issue in report order.
#[derive(Debug, Clone, Default)]
pub struct IssueCollector {
    issues: Vec<Issue>,
}

impl IssueCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// All collected issues.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Consume the collector, returning its issues.
    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    /// Number of collected issues.
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Whether no issue was reported.
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Highest level among the collected issues.
    pub fn max_level(&self) -> Option<Level> {
        self.issues.iter().map(|i| i.level).max()
    }

    /// Number of issues at or above `level`.
    pub fn count_at_least(&self, level: Level) -> usize {
        self.issues.iter().filter(|i| i.level >= level).count()
    }

    /// Issues reported at exactly `level`.
    pub fn at_level(&self, level: Level) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.level == level)
    }
}

impl ValidationSink for IssueCollector {
    fn report(&mut self, issue: Issue) {
        tracing::debug!("validation issue: {}", issue);
        self.issues.push(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_keeps_report_order() {
        let mut sink = IssueCollector::new();
        sink.report(Issue::new(Level::BetweenInstances, "second stage"));
        sink.report(Issue::new(Level::Field, "first stage"));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.issues()[0].message, "second stage");
        assert_eq!(sink.issues()[1].message, "first stage");
    }

    #[test]
    fn collector_summaries() {
        let mut sink = IssueCollector::new();
        assert!(sink.is_empty());
        assert_eq!(sink.max_level(), None);

        sink.report(Issue::new(Level::Field, "a"));
        sink.report(Issue::new(Level::BetweenTypes, "b"));
        sink.report(Issue::new(Level::BetweenTypes, "c"));

        assert_eq!(sink.max_level(), Some(Level::BetweenTypes));
        assert_eq!(sink.count_at_least(Level::BetweenFields), 2);
        assert_eq!(sink.at_level(Level::Field).count(), 1);
    }

    #[test]
    fn report_at_attaches_locator() {
        let mut sink = IssueCollector::new();
        sink.report_at(
            Level::Field,
            "bad".to_string(),
            Some(Locator::new("inputs.port")),
        );
        sink.report_at(Level::Field, "no location".to_string(), None);

        assert_eq!(sink.issues()[0].locator, Some(Locator::new("inputs.port")));
        assert!(sink.issues()[1].locator.is_none());
    }
}
