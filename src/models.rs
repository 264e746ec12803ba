//! Data models for the run engine.
//!
//! This module contains the core data structures shared by every
//! component: the [`Record`] observation unit, its classification enums,
//! and the filter used to query the aggregated result set.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known category names used by the engine itself.
pub mod category {
    pub const UI: &str = "UI";
    pub const API: &str = "API";
    pub const SECURITY: &str = "Security";
    pub const PERFORMANCE: &str = "Performance";
    pub const SYSTEM: &str = "System";
}

/// Outcome of a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Pass,
    Fail,
    Bug,
    Cancelled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "PASS"),
            Outcome::Fail => write!(f, "FAIL"),
            Outcome::Bug => write!(f, "BUG"),
            Outcome::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl Outcome {
    /// Parse an outcome name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PASS" => Some(Outcome::Pass),
            "FAIL" => Some(Outcome::Fail),
            "BUG" => Some(Outcome::Bug),
            "CANCELLED" | "CANCELED" => Some(Outcome::Cancelled),
            _ => None,
        }
    }

    /// Returns true for outcomes that represent a problem with the target.
    pub fn is_problem(&self) -> bool {
        matches!(self, Outcome::Fail | Outcome::Bug)
    }
}

/// Severity level of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Cosmetic or informational
    Low,
    /// Degraded behavior with a workaround
    Medium,
    /// Broken functionality or system-level failure
    High,
    /// Security exposure or data loss
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl Severity {
    /// All severities, most severe first.
    pub const DESCENDING: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Parse a severity name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Low => "🟢",
            Severity::Medium => "🟡",
            Severity::High => "🟠",
            Severity::Critical => "🔴",
        }
    }

    /// Coarse priority tier used by the severity breakdown view.
    pub fn priority_tier(&self) -> &'static str {
        match self {
            Severity::Critical | Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// A single classified observation produced by a unit (or by the engine
/// for system-level failures).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Short name of the observation. Never empty.
    pub title: String,
    /// Classification of the observation.
    pub outcome: Outcome,
    /// Free text, may embed an error message.
    pub detail: String,
    /// Category such as "UI", "API", "Security", "Performance" or "System".
    pub category: String,
    /// Severity of the observation.
    pub severity: Severity,
    /// When the observation became final.
    pub timestamp: DateTime<Local>,
}

impl Record {
    /// Create a record stamped with the current local time.
    ///
    /// An empty title is replaced with `"Untitled"` so the non-empty
    /// invariant holds for every record that reaches the aggregator.
    pub fn new(
        title: impl Into<String>,
        outcome: Outcome,
        detail: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
    ) -> Self {
        let mut title = title.into();
        if title.trim().is_empty() {
            title = "Untitled".to_string();
        }
        Self {
            title,
            outcome,
            detail: detail.into(),
            category: category.into(),
            severity,
            timestamp: Local::now(),
        }
    }

    pub fn pass(
        title: impl Into<String>,
        detail: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self::new(title, Outcome::Pass, detail, category, Severity::Low)
    }

    pub fn fail(
        title: impl Into<String>,
        detail: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self::new(title, Outcome::Fail, detail, category, severity)
    }

    pub fn bug(
        title: impl Into<String>,
        detail: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self::new(title, Outcome::Bug, detail, category, severity)
    }

    /// System-level failure raised by the engine rather than a unit.
    pub fn system_failure(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(title, Outcome::Fail, detail, category::SYSTEM, Severity::High)
    }

    /// Marker emitted once when a run halts on cancellation.
    pub fn cancelled_marker(detail: impl Into<String>) -> Self {
        Self::new(
            "Run cancelled",
            Outcome::Cancelled,
            detail,
            category::SYSTEM,
            Severity::Low,
        )
    }

    /// Text searched by [`RecordFilter::search`].
    fn search_haystack(&self) -> String {
        format!(
            "{} {} {} {}",
            self.title, self.detail, self.category, self.severity
        )
        .to_lowercase()
    }
}

/// Filter over the record set. All populated fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub outcome: Option<Outcome>,
    /// Matched case-insensitively.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    /// Case-insensitive substring of title, detail, category and severity.
    #[serde(default)]
    pub search: Option<String>,
}

impl RecordFilter {
    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn search(mut self, needle: impl Into<String>) -> Self {
        self.search = Some(needle.into());
        self
    }

    /// Returns true if the record satisfies every populated criterion.
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(outcome) = self.outcome {
            if record.outcome != outcome {
                return false;
            }
        }
        if let Some(ref category) = self.category {
            if !record.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(severity) = self.severity {
            if record.severity != severity {
                return false;
            }
        }
        if let Some(ref needle) = self.search {
            let needle = needle.trim().to_lowercase();
            if !needle.is_empty() && !record.search_haystack().contains(&needle) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_parse_and_tier() {
        assert_eq!(Severity::parse("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::parse("unknown"), None);
        assert_eq!(Severity::Critical.priority_tier(), "High");
        assert_eq!(Severity::High.priority_tier(), "High");
        assert_eq!(Severity::Medium.priority_tier(), "Medium");
        assert_eq!(Severity::Low.priority_tier(), "Low");
    }

    #[test]
    fn test_outcome_display_and_parse() {
        assert_eq!(Outcome::Bug.to_string(), "BUG");
        assert_eq!(Outcome::parse("pass"), Some(Outcome::Pass));
        assert_eq!(Outcome::parse("canceled"), Some(Outcome::Cancelled));
        assert!(Outcome::Fail.is_problem());
        assert!(!Outcome::Cancelled.is_problem());
    }

    #[test]
    fn test_empty_title_is_replaced() {
        let record = Record::pass("   ", "", category::UI);
        assert_eq!(record.title, "Untitled");
    }

    #[test]
    fn test_system_failure_classification() {
        let record = Record::system_failure("Execute login", "boom");
        assert_eq!(record.outcome, Outcome::Fail);
        assert_eq!(record.category, "System");
        assert_eq!(record.severity, Severity::High);
    }

    #[test]
    fn test_filter_combines_with_and() {
        let record = Record::bug(
            "Missing CSP header",
            "Content-Security-Policy absent",
            category::SECURITY,
            Severity::High,
        );

        assert!(RecordFilter::default().matches(&record));
        assert!(RecordFilter::default()
            .outcome(Outcome::Bug)
            .category("security")
            .matches(&record));
        assert!(!RecordFilter::default()
            .outcome(Outcome::Bug)
            .severity(Severity::Low)
            .matches(&record));
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let record = Record::fail(
            "Login page loads",
            "Request TIMEOUT after 5s",
            category::UI,
            Severity::Medium,
        );

        assert!(RecordFilter::default().search("timeout").matches(&record));
        assert!(RecordFilter::default().search("medium").matches(&record));
        assert!(RecordFilter::default().search("ui").matches(&record));
        assert!(!RecordFilter::default().search("signup").matches(&record));
    }
}
