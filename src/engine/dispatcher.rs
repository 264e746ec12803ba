//! Unit dispatch.
//!
//! Drives an [`ExecutionPlan`] unit by unit. Every failure a unit can
//! produce (unknown name, `Err`, panic) is turned into a System record
//! here; nothing a unit does can abort the run. Cancellation is checked
//! before each unit starts, never while one is running.

use crate::analysis::ResultAggregator;
use crate::data::DataGenerator;
use crate::models::Record;
use crate::modes::{ExecutionPlan, PlanOptions};
use crate::progress::ProgressTracker;
use crate::units::{UnitContext, UnitRegistry};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hard upper bound on concurrently running units.
pub const WORKER_CAP: usize = 5;

/// Largest worker count this machine gets: `min(available_parallelism, 5)`.
pub fn max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(WORKER_CAP)
}

/// Shared state a dispatch runs against.
#[derive(Clone)]
pub struct RunContext {
    pub target: String,
    pub aggregator: Arc<ResultAggregator>,
    pub progress: Arc<ProgressTracker>,
    pub data: Arc<DataGenerator>,
    pub cancel: Arc<AtomicBool>,
}

impl RunContext {
    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// What a dispatch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Units that were invoked, whether or not they succeeded.
    pub units_run: usize,
    /// Units whose name could not be resolved.
    pub units_failed_to_launch: usize,
    /// Dispatch stopped on a cancel request.
    pub cancelled: bool,
}

enum Step {
    Ran,
    NotLaunched,
    Cancelled,
}

pub struct Dispatcher {
    registry: Arc<UnitRegistry>,
    workers: usize,
}

impl Dispatcher {
    /// Sequential dispatcher.
    pub fn new(registry: Arc<UnitRegistry>) -> Self {
        Self {
            registry,
            workers: 1,
        }
    }

    /// Run up to `workers` units at once, clamped to `[1, max_workers()]`.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(1, max_workers());
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execute `plan` against `ctx`.
    ///
    /// Records go straight into the context's aggregator. In parallel mode
    /// record order is only preserved within a single unit.
    pub async fn execute(&self, plan: &ExecutionPlan, ctx: &RunContext) -> DispatchSummary {
        info!(
            "Dispatching {} units (mode '{}', {} worker(s))",
            plan.len(),
            plan.mode,
            self.workers
        );

        let options = Arc::new(plan.options.clone());
        let marker_sent = AtomicBool::new(false);
        let mut summary = DispatchSummary::default();

        if self.workers <= 1 {
            for name in &plan.units {
                let step = self
                    .dispatch_one(name, ctx, Arc::clone(&options), &marker_sent)
                    .await;
                if tally(&mut summary, step) {
                    break;
                }
            }
        } else {
            let options = &options;
            let marker_sent = &marker_sent;
            let steps: Vec<Step> = stream::iter(plan.units.iter().cloned())
                .map(move |name| async move {
                    self.dispatch_one(&name, ctx, Arc::clone(options), marker_sent)
                        .await
                })
                .buffer_unordered(self.workers)
                .collect()
                .await;
            for step in steps {
                tally(&mut summary, step);
            }
        }

        debug!("Dispatch finished: {:?}", summary);
        summary
    }

    async fn dispatch_one(
        &self,
        name: &str,
        ctx: &RunContext,
        options: Arc<PlanOptions>,
        marker_sent: &AtomicBool,
    ) -> Step {
        if ctx.cancel_requested() {
            if marker_sent
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                info!("Cancellation requested, not starting '{}'", name);
                ctx.aggregator.append(Record::cancelled_marker(format!(
                    "Run cancelled before unit '{}' started",
                    name
                )));
            }
            return Step::Cancelled;
        }

        let unit = match self.registry.get(name) {
            Ok(unit) => unit,
            Err(failure) => {
                warn!("{}", failure);
                ctx.aggregator.append(Record::system_failure(
                    format!("Load unit '{}'", name),
                    failure.to_string(),
                ));
                ctx.progress.increment();
                return Step::NotLaunched;
            }
        };

        let unit_ctx = UnitContext {
            target: ctx.target.clone(),
            aggregator: Arc::clone(&ctx.aggregator),
            data: Arc::clone(&ctx.data),
            options,
        };

        info!("Running unit '{}'", name);
        match AssertUnwindSafe(unit.run(unit_ctx)).catch_unwind().await {
            Ok(Ok(())) => debug!("Unit '{}' finished", name),
            Ok(Err(e)) => {
                warn!("Unit '{}' failed: {:#}", name, e);
                ctx.aggregator.append(Record::system_failure(
                    format!("Run unit '{}'", name),
                    format!("{:#}", e),
                ));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Unit '{}' panicked: {}", name, message);
                ctx.aggregator.append(Record::system_failure(
                    format!("Run unit '{}'", name),
                    format!("panicked: {}", message),
                ));
            }
        }

        ctx.progress.increment();
        Step::Ran
    }
}

/// Fold one step into the summary. Returns true when dispatch should stop.
fn tally(summary: &mut DispatchSummary, step: Step) -> bool {
    match step {
        Step::Ran => summary.units_run += 1,
        Step::NotLaunched => summary.units_failed_to_launch += 1,
        Step::Cancelled => summary.cancelled = true,
    }
    summary.cancelled
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
