//! Qassurify - run orchestration and result aggregation for web QA checks.
//!
//! A run resolves a mode into an [`modes::ExecutionPlan`], dispatches the
//! plan's units on a background task, and aggregates every finding into
//! stats, recommendations and an exportable multi-view report.
//!
//! ```no_run
//! use qassurify::engine::{RunController, RunSettings};
//! use qassurify::units::UnitRegistry;
//!
//! # async fn demo() {
//! let controller = RunController::new(UnitRegistry::builtin(), RunSettings::default());
//! controller.start("localhost:8000", "smoke", None);
//! controller.wait().await;
//! println!("{:?}", controller.status_snapshot().status);
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod models;
pub mod modes;
pub mod progress;
pub mod report;
pub mod units;

pub use error::{EngineError, Result};
