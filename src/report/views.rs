//! Tabular views derived from the record set.
//!
//! Every export format renders the same [`ReportViews`]; only the
//! presentation differs.

use crate::analysis::aggregator::{rate, sort_by_priority, AggregateStats};
use crate::analysis::recommend::{recommend, Recommendation};
use crate::models::{category, Outcome, Record, Severity};
use chrono::{DateTime, Local};
use serde::Serialize;

/// Headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryView {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub bugs: usize,
    pub cancelled: usize,
    pub pass_rate: f64,
    pub security_total: usize,
    pub security_pass_rate: f64,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRow {
    pub category: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub bugs: usize,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityRow {
    pub severity: Severity,
    pub count: usize,
    pub percentage: f64,
    pub priority: String,
}

/// Every view of one export.
#[derive(Debug, Clone, Serialize)]
pub struct ReportViews {
    pub host: String,
    pub generated_at: DateTime<Local>,
    pub records: Vec<Record>,
    pub summary: SummaryView,
    pub categories: Vec<CategoryRow>,
    pub severities: Vec<SeverityRow>,
    pub bugs: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<Vec<Record>>,
    pub recommendations: Vec<Recommendation>,
}

impl ReportViews {
    pub fn build(records: &[Record], host: &str) -> Self {
        let stats = AggregateStats::from_records(records);

        Self {
            host: host.to_string(),
            generated_at: Local::now(),
            records: records.to_vec(),
            summary: summary_view(&stats),
            categories: category_rows(&stats),
            severities: severity_rows(&stats),
            bugs: bug_rows(records),
            security: category_subset(records, category::SECURITY),
            performance: category_subset(records, category::PERFORMANCE),
            recommendations: recommend(records),
        }
    }
}

fn summary_view(stats: &AggregateStats) -> SummaryView {
    SummaryView {
        total: stats.total,
        passed: stats.passed,
        failed: stats.failed,
        bugs: stats.bugs,
        cancelled: stats.cancelled,
        pass_rate: stats.pass_rate,
        security_total: stats.security_total,
        security_pass_rate: stats.security_pass_rate,
        critical: stats.severity_count(Severity::Critical),
        high: stats.severity_count(Severity::High),
        medium: stats.severity_count(Severity::Medium),
        low: stats.severity_count(Severity::Low),
    }
}

fn category_rows(stats: &AggregateStats) -> Vec<CategoryRow> {
    stats
        .by_category
        .iter()
        .map(|(name, c)| CategoryRow {
            category: name.clone(),
            total: c.total,
            passed: c.passed,
            failed: c.failed,
            bugs: c.bugs,
            pass_rate: c.pass_rate,
        })
        .collect()
}

/// Present severities only, most severe first.
fn severity_rows(stats: &AggregateStats) -> Vec<SeverityRow> {
    Severity::DESCENDING
        .iter()
        .filter_map(|severity| {
            let count = stats.severity_count(*severity);
            (count > 0).then(|| SeverityRow {
                severity: *severity,
                count,
                percentage: rate(count, stats.total),
                priority: severity.priority_tier().to_string(),
            })
        })
        .collect()
}

fn bug_rows(records: &[Record]) -> Vec<Record> {
    let mut bugs: Vec<Record> = records
        .iter()
        .filter(|r| r.outcome == Outcome::Bug)
        .cloned()
        .collect();
    sort_by_priority(&mut bugs);
    bugs
}

fn category_subset(records: &[Record], name: &str) -> Option<Vec<Record>> {
    let subset: Vec<Record> = records
        .iter()
        .filter(|r| r.category == name)
        .cloned()
        .collect();
    (!subset.is_empty()).then_some(subset)
}
