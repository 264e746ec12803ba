//! Run orchestration: the dispatcher that drives units and the controller
//! that owns a run's lifecycle.

pub mod controller;
pub mod dispatcher;

pub use controller::{
    normalize_target, ResultsPage, RunController, RunSettings, RunState, RunStatus, StartOptions,
    StartOutcome, StatusSnapshot, DEFAULT_TARGET,
};
pub use dispatcher::{max_workers, DispatchSummary, Dispatcher, RunContext, WORKER_CAP};
