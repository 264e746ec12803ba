//! Record aggregation and statistics.
//!
//! [`ResultAggregator`] is the append-only record store shared by every
//! unit of a run. Statistics are never stored: they are recomputed from
//! the full record set (or a filtered subset) on demand.

use crate::analysis::recommend::{recommend, Recommendation};
use crate::models::{category, Outcome, Record, RecordFilter, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Per-category totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub bugs: usize,
    pub pass_rate: f64,
}

/// Derived statistics over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub bugs: usize,
    pub cancelled: usize,
    /// Percentage of records that passed, 0 when empty.
    pub pass_rate: f64,
    pub security_total: usize,
    pub security_passed: usize,
    /// Percentage of Security records that passed. 100 when other records
    /// exist but none are Security, 0 for an empty set.
    pub security_pass_rate: f64,
    pub by_category: BTreeMap<String, CategoryStats>,
    pub by_severity: BTreeMap<Severity, usize>,
}

impl AggregateStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut stats = Self::default();

        for record in records {
            stats.total += 1;
            let entry = stats
                .by_category
                .entry(record.category.clone())
                .or_default();
            entry.total += 1;

            match record.outcome {
                Outcome::Pass => {
                    stats.passed += 1;
                    entry.passed += 1;
                }
                Outcome::Fail => {
                    stats.failed += 1;
                    entry.failed += 1;
                }
                Outcome::Bug => {
                    stats.bugs += 1;
                    entry.bugs += 1;
                }
                Outcome::Cancelled => stats.cancelled += 1,
            }

            if record.category == category::SECURITY {
                stats.security_total += 1;
                if record.outcome == Outcome::Pass {
                    stats.security_passed += 1;
                }
            }

            *stats.by_severity.entry(record.severity).or_insert(0) += 1;
        }

        stats.pass_rate = rate(stats.passed, stats.total);
        stats.security_pass_rate = if stats.total > 0 && stats.security_total == 0 {
            100.0
        } else {
            rate(stats.security_passed, stats.security_total)
        };
        for entry in stats.by_category.values_mut() {
            entry.pass_rate = rate(entry.passed, entry.total);
        }

        stats
    }

    pub fn severity_count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }
}

/// `part / total * 100`, 0 for an empty total.
pub fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Sort records by severity (most severe first), then category ascending.
pub fn sort_by_priority(records: &mut [Record]) {
    records.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.category.cmp(&b.category))
    });
}

/// Thread-safe, append-only record store.
#[derive(Default)]
pub struct ResultAggregator {
    records: Mutex<Vec<Record>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a finished observation. Records are never mutated afterwards.
    pub fn append(&self, record: Record) {
        debug!(
            "[{}] {} ({} | {}) {}",
            record.outcome, record.title, record.category, record.severity, record.detail
        );
        self.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every record, in append order.
    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    /// Copy of the records matching `filter`, in append order.
    pub fn filtered(&self, filter: &RecordFilter) -> Vec<Record> {
        self.lock()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    /// Statistics over all records, or over those matching `filter`.
    pub fn compute_stats(&self, filter: Option<&RecordFilter>) -> AggregateStats {
        let records = self.lock();
        match filter {
            Some(filter) => {
                AggregateStats::from_records(records.iter().filter(|r| filter.matches(r)))
            }
            None => AggregateStats::from_records(records.iter()),
        }
    }

    /// Rule-based recommendations for the current record set.
    pub fn recommendations(&self) -> Vec<Recommendation> {
        recommend(&self.lock())
    }

    /// BUG records, most severe first.
    pub fn bugs(&self) -> Vec<Record> {
        let mut bugs = self.filtered(&RecordFilter::default().outcome(Outcome::Bug));
        sort_by_priority(&mut bugs);
        bugs
    }

    /// Drop every record. The only operation that removes records.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
