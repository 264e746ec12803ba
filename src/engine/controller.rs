//! Run lifecycle.
//!
//! [`RunController`] owns the single live run: it resolves the plan,
//! spawns the dispatch on a background task, answers status and result
//! queries while the run is in flight, and finalizes the run (progress,
//! end time, report export) when it reaches a terminal state.
//!
//! ```text
//! Idle ─start─▶ Running ─┬─────────────▶ Completed
//!                        ├─cancel─▶ Cancelling ─▶ Cancelled
//!                        └─────────────▶ Failed
//! ```
//!
//! Any terminal state accepts a new `start`.

use crate::analysis::{AggregateStats, Recommendation, ResultAggregator};
use crate::data::DataGenerator;
use crate::engine::dispatcher::{DispatchSummary, Dispatcher, RunContext};
use crate::error::{EngineError, Result};
use crate::models::{Outcome, Record, RecordFilter};
use crate::modes::{self, unit, ExecutionPlan};
use crate::progress::{ProgressObserver, ProgressTracker};
use crate::report::{self, ExportOptions, ReportFormat};
use crate::units::UnitRegistry;
use chrono::{DateTime, Local};
use reqwest::Url;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Target used when the requested one is empty or unusable.
pub const DEFAULT_TARGET: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Cancelling,
    Cancelled,
    Completed,
    Failed,
}

impl RunStatus {
    /// A live run blocks new starts.
    pub fn is_live(&self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Cancelling)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled | RunStatus::Completed | RunStatus::Failed
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunStatus::Idle => "Idle",
            RunStatus::Running => "Running",
            RunStatus::Cancelling => "Cancelling",
            RunStatus::Cancelled => "Cancelled",
            RunStatus::Completed => "Completed",
            RunStatus::Failed => "Failed",
        };
        write!(f, "{}", label)
    }
}

/// Mutable state of the current (or last) run. Only the controller
/// writes it. Unit counters live in the [`ProgressTracker`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunState {
    pub run_id: Option<Uuid>,
    pub status: RunStatus,
    pub mode: String,
    pub target: String,
    pub total_units: usize,
    pub started_at: Option<DateTime<Local>>,
    pub ended_at: Option<DateTime<Local>>,
    /// System-level failures, in order. Never records.
    pub errors: Vec<String>,
    pub cancel_requested: bool,
    pub last_report: Option<PathBuf>,
}

/// Point-in-time view handed to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub run_id: Option<Uuid>,
    pub status: RunStatus,
    pub mode: String,
    pub target: String,
    pub total_units: usize,
    pub completed_units: usize,
    pub percent: u8,
    pub started_at: Option<DateTime<Local>>,
    pub ended_at: Option<DateTime<Local>>,
    pub errors: Vec<String>,
    pub record_count: usize,
    pub last_report: Option<PathBuf>,
}

/// Per-start overrides.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Explicit unit subset; bypasses mode lookup when non-empty.
    pub units: Option<Vec<String>>,
    /// Overrides [`RunSettings::include_api`].
    pub include_api: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartOutcome {
    pub accepted: bool,
}

/// One page of (optionally filtered) results.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsPage {
    pub records: Vec<Record>,
    /// Stats over every record matching the filter, not just this page.
    pub stats: AggregateStats,
    pub total: usize,
}

/// Controller-wide settings fixed at construction.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Concurrent units per run; 1 dispatches sequentially.
    pub workers: usize,
    /// Append the `api` unit to mode plans that lack it.
    pub include_api: bool,
    /// Export a report automatically when a run ends.
    pub auto_export: bool,
    pub report_dir: PathBuf,
    pub export: ExportOptions,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            include_api: true,
            auto_export: true,
            report_dir: PathBuf::from("reports"),
            export: ExportOptions::default(),
        }
    }
}

struct Shared {
    state: Mutex<RunState>,
    aggregator: Arc<ResultAggregator>,
    progress: Arc<ProgressTracker>,
    registry: Arc<UnitRegistry>,
    data: Arc<DataGenerator>,
    cancel: Arc<AtomicBool>,
    settings: RunSettings,
}

pub struct RunController {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RunController {
    pub fn new(registry: UnitRegistry, settings: RunSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RunState::default()),
                aggregator: Arc::new(ResultAggregator::new()),
                progress: Arc::new(ProgressTracker::new()),
                registry: Arc::new(registry),
                data: Arc::new(DataGenerator::new()),
                cancel: Arc::new(AtomicBool::new(false)),
                settings,
            }),
            task: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.shared.settings
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.shared.registry
    }

    /// Register a progress observer. Observers outlive individual runs.
    pub fn subscribe_progress(&self, observer: ProgressObserver) {
        self.shared.progress.subscribe(observer);
    }

    /// Request a run. Rejected while another run is live, and outside a
    /// tokio runtime.
    pub fn start(&self, target: &str, mode: &str, options: Option<StartOptions>) -> StartOutcome {
        match self.try_start(target, mode, options.unwrap_or_default()) {
            Ok(run_id) => {
                debug!("Run {} accepted", run_id);
                StartOutcome { accepted: true }
            }
            Err(e) => {
                warn!("Start rejected: {}", e);
                StartOutcome { accepted: false }
            }
        }
    }

    /// Like [`start`](Self::start) but returns the run id or a typed
    /// rejection.
    pub fn try_start(&self, target: &str, mode: &str, options: StartOptions) -> Result<Uuid> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let shared = &self.shared;
        let mut state = shared.lock_state();
        if state.status.is_live() {
            return Err(EngineError::Conflict);
        }

        let target = normalize_target(target);
        let (plan, mut errors) = shared.plan(mode, &options);

        let run_id = Uuid::new_v4();
        info!(
            "Starting run {} against {} (mode '{}', {} units)",
            run_id,
            target,
            plan.mode,
            plan.len()
        );

        shared.aggregator.clear();
        shared.progress.reset(plan.len());
        shared.cancel.store(false, Ordering::SeqCst);

        if plan.is_empty() {
            errors.push(EngineError::NoRunnableUnits(plan.mode.clone()).to_string());
        }

        *state = RunState {
            run_id: Some(run_id),
            status: RunStatus::Running,
            mode: plan.mode.clone(),
            target: target.clone(),
            total_units: plan.len(),
            started_at: Some(Local::now()),
            ended_at: None,
            errors,
            cancel_requested: false,
            last_report: None,
        };
        drop(state);

        if plan.is_empty() {
            error!("Run {} has no runnable units", run_id);
            shared.finalize(DispatchSummary::default());
            return Ok(run_id);
        }

        let worker = Arc::clone(shared);
        let handle = runtime.spawn(async move { worker.execute(plan, target).await });
        *self.lock_task() = Some(handle);

        Ok(run_id)
    }

    /// Ask the live run to stop before its next unit. Idempotent; a no-op
    /// when no run is live.
    pub fn request_cancel(&self) {
        let mut state = self.shared.lock_state();
        if !state.status.is_live() {
            debug!("Cancel ignored: no live run");
            return;
        }

        self.shared.cancel.store(true, Ordering::SeqCst);
        if !state.cancel_requested {
            info!("Cancellation requested for run {:?}", state.run_id);
        }
        state.cancel_requested = true;
        state.status = RunStatus::Cancelling;
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        let state = self.shared.lock_state().clone();
        let progress = self.shared.progress.snapshot();

        StatusSnapshot {
            run_id: state.run_id,
            status: state.status,
            mode: state.mode,
            target: state.target,
            total_units: state.total_units,
            completed_units: progress.completed,
            percent: progress.percent,
            started_at: state.started_at,
            ended_at: state.ended_at,
            errors: state.errors,
            record_count: self.shared.aggregator.len(),
            last_report: state.last_report,
        }
    }

    /// Records matching `filter`, paged. `page` is 1-based; without a
    /// page size every match is returned.
    pub fn results(
        &self,
        filter: Option<&RecordFilter>,
        page: Option<usize>,
        page_size: Option<usize>,
    ) -> ResultsPage {
        let matching = match filter {
            Some(filter) => self.shared.aggregator.filtered(filter),
            None => self.shared.aggregator.records(),
        };
        let stats = AggregateStats::from_records(&matching);
        let total = matching.len();

        let records = match page_size {
            Some(size) if size > 0 => {
                let page = page.unwrap_or(1).max(1);
                matching
                    .into_iter()
                    .skip((page - 1).saturating_mul(size))
                    .take(size)
                    .collect()
            }
            _ => matching,
        };

        ResultsPage {
            records,
            stats,
            total,
        }
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.shared.aggregator.recommendations()
    }

    /// BUG records, most severe first.
    pub fn bugs(&self) -> Vec<Record> {
        self.shared.aggregator.bugs()
    }

    /// Export the current records. `destination` defaults to the
    /// configured report directory.
    pub fn export_report(&self, destination: Option<&Path>, format: ReportFormat) -> Result<PathBuf> {
        let options = ExportOptions {
            format,
            ..self.shared.settings.export
        };
        let path = self.shared.export(destination, options)?;
        self.shared.lock_state().last_report = Some(path.clone());
        Ok(path)
    }

    /// Wait for the background task of the current run, if any.
    pub async fn wait(&self) {
        let handle = self.lock_task().take();
        let Some(handle) = handle else {
            return;
        };

        if let Err(e) = handle.await {
            error!("Run task aborted: {}", e);
            let mut state = self.shared.lock_state();
            state.errors.push(format!("run task aborted: {}", e));
            state.status = RunStatus::Failed;
            state.ended_at = Some(Local::now());
            self.shared.progress.force_complete();
        }
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve the plan for a start request plus any resolution errors.
    fn plan(&self, mode: &str, options: &StartOptions) -> (ExecutionPlan, Vec<String>) {
        if let Some(units) = options.units.as_ref().filter(|u| !u.is_empty()) {
            let (plan, skipped) = modes::resolve_units(units, &self.registry);
            let errors = skipped.iter().map(|f| f.to_string()).collect();
            return (plan, errors);
        }

        let mut plan = modes::resolve(mode);
        let include_api = options.include_api.unwrap_or(self.settings.include_api);
        if include_api && self.registry.contains(unit::API) {
            plan.ensure_unit(unit::API);
        }
        (plan, Vec::new())
    }

    async fn execute(&self, plan: ExecutionPlan, target: String) {
        let dispatcher =
            Dispatcher::new(Arc::clone(&self.registry)).with_workers(self.settings.workers);
        let ctx = RunContext {
            target,
            aggregator: Arc::clone(&self.aggregator),
            progress: Arc::clone(&self.progress),
            data: Arc::clone(&self.data),
            cancel: Arc::clone(&self.cancel),
        };

        let summary = dispatcher.execute(&plan, &ctx).await;
        self.finalize(summary);
    }

    /// Move the run to its terminal state.
    fn finalize(&self, summary: DispatchSummary) {
        self.progress.force_complete();

        let status = if summary.cancelled {
            RunStatus::Cancelled
        } else if summary.units_run == 0 {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        let mut late_errors = Vec::new();
        if status == RunStatus::Failed && summary.units_failed_to_launch > 0 {
            let mode = self.lock_state().mode.clone();
            late_errors.push(EngineError::NoRunnableUnits(mode).to_string());
        }

        // A run cancelled before its first unit holds only the marker.
        let findings = self
            .aggregator
            .records()
            .iter()
            .filter(|r| r.outcome != Outcome::Cancelled)
            .count();
        let cancelled_early = summary.cancelled && summary.units_run == 0;

        let mut report = None;
        if self.settings.auto_export && (findings > 0 || !cancelled_early) {
            match self.export(None, self.settings.export) {
                Ok(path) => report = Some(path),
                Err(e) => {
                    error!("Report export failed: {}", e);
                    late_errors.push(e.to_string());
                }
            }
        }

        let mut state = self.lock_state();
        state.status = status;
        state.ended_at = Some(Local::now());
        state.errors.extend(late_errors);
        if report.is_some() {
            state.last_report = report;
        }

        let elapsed = match (state.started_at, state.ended_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        };
        info!(
            "Run {:?} finished: {} ({} records, {:.1}s)",
            state.run_id,
            status,
            self.aggregator.len(),
            elapsed
        );
    }

    fn export(&self, destination: Option<&Path>, options: ExportOptions) -> Result<PathBuf> {
        let records = self.aggregator.records();
        let host = self.lock_state().target.clone();
        let dir = destination.unwrap_or(&self.settings.report_dir);
        Ok(report::export(&records, dir, &host, options)?)
    }
}

/// Clean up a user-supplied target address.
///
/// Trims whitespace and quotes, drops a leading `@`, defaults the scheme
/// to `https://`. Anything that still is not an http(s) URL with a host
/// becomes [`DEFAULT_TARGET`].
pub fn normalize_target(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c: char| c == '"' || c == '\'').trim();
    let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return DEFAULT_TARGET.to_string();
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    match Url::parse(&candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            candidate
        }
        _ => {
            warn!("Unusable target '{}', using {}", raw, DEFAULT_TARGET);
            DEFAULT_TARGET.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Priority;
    use crate::engine::testing::{registry, Behavior, ScriptedUnit};
    use crate::models::{category, Severity};
    use std::time::Duration;
    use tempfile::TempDir;

    fn settings() -> RunSettings {
        RunSettings {
            include_api: false,
            auto_export: false,
            ..RunSettings::default()
        }
    }

    fn controller(units: Vec<ScriptedUnit>, settings: RunSettings) -> RunController {
        let (registry, _) = registry(units);
        RunController::new((*registry).clone(), settings)
    }

    fn subset(names: &[&str]) -> Option<StartOptions> {
        Some(StartOptions {
            units: Some(names.iter().map(|n| n.to_string()).collect()),
            include_api: None,
        })
    }

    #[tokio::test]
    async fn test_all_units_pass() {
        let controller = controller(
            vec![
                ScriptedUnit::new("a", Behavior::Pass),
                ScriptedUnit::new("b", Behavior::Pass),
                ScriptedUnit::new("c", Behavior::Pass),
            ],
            settings(),
        );

        assert!(controller.start("localhost", "smoke", subset(&["a", "b", "c"])).accepted);
        controller.wait().await;

        let status = controller.status_snapshot();
        assert_eq!(status.status, RunStatus::Completed);
        assert_eq!(status.percent, 100);
        assert_eq!(status.completed_units, 3);
        assert!(status.ended_at.is_some());

        let results = controller.results(None, None, None);
        assert_eq!(results.stats.total, 3);
        assert_eq!(results.stats.passed, 3);
        assert_eq!(results.stats.failed, 0);
        assert_eq!(results.stats.bugs, 0);
        assert!(controller.recommendations().is_empty());
    }

    #[tokio::test]
    async fn test_failing_unit_does_not_stop_run() {
        let controller = controller(
            vec![
                ScriptedUnit::new("a", Behavior::Error("selector not found")),
                ScriptedUnit::new("b", Behavior::Pass),
            ],
            settings(),
        );

        controller.start("localhost", "", subset(&["a", "b"]));
        controller.wait().await;

        let status = controller.status_snapshot();
        assert_eq!(status.status, RunStatus::Completed);
        assert_eq!(status.completed_units, 2);

        let records = controller.results(None, None, None).records;
        assert_eq!(records[0].outcome, Outcome::Fail);
        assert_eq!(records[0].category, category::SYSTEM);
        assert_eq!(records[0].severity, Severity::High);
        assert_eq!(records[1].title, "b passed");
    }

    #[test]
    fn test_security_bugs_raise_critical_recommendation() {
        let controller = controller(vec![], settings());
        let aggregator = &controller.shared.aggregator;
        for i in 0..7 {
            aggregator.append(Record::pass(format!("ok {}", i), "", category::UI));
        }
        for i in 0..3 {
            aggregator.append(Record::bug(
                format!("header {}", i),
                "missing",
                category::SECURITY,
                Severity::High,
            ));
        }

        let recommendations = controller.recommendations();
        assert!(recommendations
            .iter()
            .any(|r| r.priority == Priority::Critical));
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_without_side_effects() {
        let controller = controller(
            vec![ScriptedUnit::new("slow", Behavior::Slow(Duration::from_millis(50)))],
            settings(),
        );

        assert!(controller.start("localhost", "", subset(&["slow"])).accepted);
        let before = controller.status_snapshot();

        let second = controller.start("example.com", "full", None);
        assert!(!second.accepted);

        let after = controller.status_snapshot();
        assert_eq!(after.run_id, before.run_id);
        assert_eq!(after.target, before.target);
        assert_eq!(after.started_at, before.started_at);
        assert!(matches!(
            controller.try_start("x", "full", StartOptions::default()),
            Err(EngineError::Conflict)
        ));

        controller.wait().await;
        assert_eq!(controller.status_snapshot().status, RunStatus::Completed);

        // Terminal state accepts a new run.
        assert!(controller.start("localhost", "", subset(&["slow"])).accepted);
        controller.wait().await;
    }

    #[tokio::test]
    async fn test_cancel_before_first_unit() {
        let (registry, counters) = registry(vec![
            ScriptedUnit::new("a", Behavior::Pass),
            ScriptedUnit::new("b", Behavior::Pass),
        ]);
        let dir = TempDir::new().unwrap();
        let controller = RunController::new(
            (*registry).clone(),
            RunSettings {
                auto_export: true,
                report_dir: dir.path().to_path_buf(),
                ..settings()
            },
        );

        controller.start("localhost", "", subset(&["a", "b"]));
        controller.request_cancel();
        controller.request_cancel();
        assert_eq!(controller.status_snapshot().status, RunStatus::Cancelling);
        controller.wait().await;

        let status = controller.status_snapshot();
        assert_eq!(status.status, RunStatus::Cancelled);
        assert_eq!(status.percent, 100);
        assert_eq!(status.record_count, 1);
        assert_eq!(counters["a"].runs(), 0);
        assert!(status.last_report.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_between_units() {
        let (registry, counters) = registry(vec![
            ScriptedUnit::new("slow", Behavior::Slow(Duration::from_millis(200))),
            ScriptedUnit::new("next", Behavior::Pass),
        ]);
        let controller = RunController::new((*registry).clone(), settings());

        controller.start("localhost", "", subset(&["slow", "next"]));
        tokio::time::sleep(Duration::from_millis(20)).await;
        controller.request_cancel();
        controller.wait().await;

        assert_eq!(controller.status_snapshot().status, RunStatus::Cancelled);
        assert_eq!(counters["slow"].runs(), 1);
        assert_eq!(counters["next"].runs(), 0);

        let outcomes: Vec<Outcome> = controller
            .results(None, None, None)
            .records
            .iter()
            .map(|r| r.outcome)
            .collect();
        assert_eq!(outcomes, vec![Outcome::Pass, Outcome::Cancelled]);
    }

    #[tokio::test]
    async fn test_no_runnable_units_fails_run() {
        let controller = controller(vec![ScriptedUnit::new("a", Behavior::Pass)], settings());

        assert!(controller.start("localhost", "", subset(&["ghost"])).accepted);
        controller.wait().await;

        let status = controller.status_snapshot();
        assert_eq!(status.status, RunStatus::Failed);
        assert_eq!(status.percent, 100);
        assert!(status.errors.iter().any(|e| e.contains("ghost")));
        assert!(status.errors.iter().any(|e| e.contains("no resolvable units")));
    }

    #[tokio::test]
    async fn test_unresolvable_plan_units_fail_run() {
        // `smoke` names units this registry does not have.
        let controller = controller(vec![ScriptedUnit::new("a", Behavior::Pass)], settings());

        controller.start("localhost", "smoke", None);
        controller.wait().await;

        let status = controller.status_snapshot();
        assert_eq!(status.status, RunStatus::Failed);
        assert_eq!(status.record_count, 2);
    }

    #[tokio::test]
    async fn test_auto_export_writes_report() {
        let dir = TempDir::new().unwrap();
        let controller = controller(
            vec![ScriptedUnit::new("a", Behavior::Pass)],
            RunSettings {
                auto_export: true,
                report_dir: dir.path().to_path_buf(),
                ..settings()
            },
        );

        controller.start("example.com", "", subset(&["a"]));
        controller.wait().await;

        let report = controller.status_snapshot().last_report.unwrap();
        assert!(report.exists());
        let name = report.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("example.com_qa_"));
    }

    #[tokio::test]
    async fn test_export_failure_is_recorded_not_fatal() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let controller = controller(
            vec![ScriptedUnit::new("a", Behavior::Pass)],
            RunSettings {
                auto_export: true,
                report_dir: blocker,
                ..settings()
            },
        );

        controller.start("localhost", "", subset(&["a"]));
        controller.wait().await;

        let status = controller.status_snapshot();
        assert_eq!(status.status, RunStatus::Completed);
        assert_eq!(status.errors.len(), 1);
        assert!(status.last_report.is_none());
    }

    #[tokio::test]
    async fn test_explicit_export_and_paging() {
        let dir = TempDir::new().unwrap();
        let controller = controller(vec![ScriptedUnit::new("many", Behavior::Emit(5))], settings());

        controller.start("localhost", "", subset(&["many"]));
        controller.wait().await;

        let page = controller.results(None, Some(2), Some(2));
        assert_eq!(page.total, 5);
        assert_eq!(page.stats.total, 5);
        let titles: Vec<&str> = page.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["many #2", "many #3"]);

        let filter = RecordFilter::default().search("#4");
        assert_eq!(controller.results(Some(&filter), None, None).total, 1);

        let path = controller
            .export_report(Some(dir.path()), ReportFormat::Json)
            .unwrap();
        assert_eq!(path.extension().unwrap(), "json");
        assert_eq!(controller.status_snapshot().last_report, Some(path));
    }

    #[tokio::test]
    async fn test_include_api_appends_registered_unit() {
        let controller = controller(
            vec![ScriptedUnit::new(unit::API, Behavior::Pass)],
            RunSettings {
                include_api: true,
                ..settings()
            },
        );

        let (plan, _) = controller.shared.plan("smoke", &StartOptions::default());
        assert_eq!(plan.units.last().map(String::as_str), Some(unit::API));

        let opt_out = StartOptions {
            include_api: Some(false),
            ..StartOptions::default()
        };
        let (plan, _) = controller.shared.plan("smoke", &opt_out);
        assert!(!plan.units.iter().any(|u| u == unit::API));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn test_parallel_run_completes_with_every_record() {
        let (registry, counters) = registry(vec![
            ScriptedUnit::new("a", Behavior::Emit(2)),
            ScriptedUnit::new("b", Behavior::Emit(3)),
            ScriptedUnit::new("c", Behavior::Emit(4)),
            ScriptedUnit::new("d", Behavior::Pass),
        ]);
        let controller = RunController::new(
            (*registry).clone(),
            RunSettings {
                workers: 3,
                ..settings()
            },
        );

        assert!(controller
            .start("localhost", "", subset(&["a", "b", "c", "d"]))
            .accepted);
        controller.wait().await;

        let status = controller.status_snapshot();
        assert_eq!(status.status, RunStatus::Completed);
        assert_eq!(status.percent, 100);
        assert_eq!(status.total_units, 4);
        assert_eq!(status.completed_units, status.total_units);
        assert_eq!(status.record_count, 10);
        for name in ["a", "b", "c", "d"] {
            assert_eq!(counters[name].runs(), 1);
        }

        let results = controller.results(None, None, None);
        assert_eq!(results.total, 10);
        assert_eq!(
            results
                .records
                .iter()
                .filter(|r| r.title.starts_with("c #"))
                .count(),
            4
        );
    }

    #[test]
    fn test_start_outside_runtime_is_rejected_cleanly() {
        let controller = controller(vec![ScriptedUnit::new("a", Behavior::Pass)], settings());

        assert!(matches!(
            controller.try_start("localhost", "", StartOptions::default()),
            Err(EngineError::NoRuntime)
        ));
        assert!(!controller.start("localhost", "", subset(&["a"])).accepted);

        let status = controller.status_snapshot();
        assert_eq!(status.status, RunStatus::Idle);
        assert!(status.run_id.is_none());

        // The controller is still usable once a runtime is available.
        tokio_test::block_on(async {
            assert!(controller.start("localhost", "", subset(&["a"])).accepted);
            controller.wait().await;
        });
        assert_eq!(controller.status_snapshot().status, RunStatus::Completed);
        assert_eq!(controller.status_snapshot().record_count, 1);
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let controller = controller(vec![], settings());
        controller.request_cancel();
        let status = controller.status_snapshot();
        assert_eq!(status.status, RunStatus::Idle);
        assert!(!controller.shared.cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("  \"example.com\" "), "https://example.com");
        assert_eq!(normalize_target("@http://localhost:5000"), "http://localhost:5000");
        assert_eq!(normalize_target(""), DEFAULT_TARGET);
        assert_eq!(normalize_target("ftp://example.com"), DEFAULT_TARGET);
        assert_eq!(normalize_target("http://"), DEFAULT_TARGET);
    }

    #[test]
    fn test_status_flags() {
        assert!(RunStatus::Running.is_live());
        assert!(RunStatus::Cancelling.is_live());
        assert!(!RunStatus::Idle.is_live());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Idle.is_terminal());
    }
}
