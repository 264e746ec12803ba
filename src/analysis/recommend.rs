//! Recommendation rules.
//!
//! A fixed rule table evaluated in order over the record set. Every
//! applicable rule fires, except the empty-set rule which is terminal.

use crate::analysis::aggregator::AggregateStats;
use crate::models::{category, Outcome, Record, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pass rate (percent) below which broader coverage is recommended.
pub const PASS_RATE_TARGET: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
            Priority::Critical => write!(f, "Critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub text: String,
    pub priority: Priority,
}

impl Recommendation {
    fn new(text: impl Into<String>, priority: Priority) -> Self {
        Self {
            text: text.into(),
            priority,
        }
    }
}

/// Evaluate the rule table against `records`.
pub fn recommend(records: &[Record]) -> Vec<Recommendation> {
    if records.is_empty() {
        return vec![Recommendation::new(
            "No test results to analyze",
            Priority::Low,
        )];
    }

    let stats = AggregateStats::from_records(records);
    let mut recs = Vec::new();

    if stats.pass_rate < PASS_RATE_TARGET {
        recs.push(Recommendation::new(
            format!(
                "Increase unit and integration test coverage to improve pass rate ({:.1}% < {:.0}%)",
                stats.pass_rate, PASS_RATE_TARGET
            ),
            Priority::High,
        ));
    }

    if stats.bugs > 0 {
        recs.push(Recommendation::new(
            format!(
                "Triage and fix {} open BUG results; prioritize by severity ({})",
                stats.bugs,
                bug_severity_breakdown(records)
            ),
            Priority::High,
        ));
    }

    let security_problems = records
        .iter()
        .filter(|r| r.category == category::SECURITY && r.outcome.is_problem())
        .count();
    if security_problems > 0 {
        recs.push(Recommendation::new(
            format!(
                "Address {} security test failures urgently and add regression tests",
                security_problems
            ),
            Priority::Critical,
        ));
    }

    if records
        .iter()
        .any(|r| r.detail.to_lowercase().contains("timeout"))
    {
        recs.push(Recommendation::new(
            "Investigate flaky tests (timeouts). Add waits/retries and stabilize selectors",
            Priority::Medium,
        ));
    }

    recs
}

/// "Critical: 1, High: 2" for the severities present among BUG records.
fn bug_severity_breakdown(records: &[Record]) -> String {
    Severity::DESCENDING
        .iter()
        .filter_map(|severity| {
            let count = records
                .iter()
                .filter(|r| r.outcome == Outcome::Bug && r.severity == *severity)
                .count();
            (count > 0).then(|| format!("{}: {}", severity, count))
        })
        .collect::<Vec<_>>()
        .join(", ")
}
