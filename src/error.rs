//! Engine error taxonomy.
//!
//! Unit failures are not errors at this level: they become records.
//! Only the conditions below ever leave the engine as `Err`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A start was requested while another run is live.
    #[error("a run is already in progress")]
    Conflict,

    /// A named unit is absent from the registry.
    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),

    /// The report artifact could not be written.
    #[error(transparent)]
    Export(#[from] ExportFailure),

    /// `start` was called outside an async runtime.
    #[error("no async runtime available to run on")]
    NoRuntime,

    /// The resolved plan has nothing the registry can run.
    #[error("no resolvable units in plan for mode '{0}'")]
    NoRunnableUnits(String),
}

#[derive(Debug, Error)]
#[error("unit '{name}' is not registered")]
pub struct ResolutionFailure {
    pub name: String,
}

impl ResolutionFailure {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Error)]
pub enum ExportFailure {
    #[error("failed to create report directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_failure_message() {
        let err: EngineError = ResolutionFailure::new("test_checkout").into();
        assert_eq!(err.to_string(), "unit 'test_checkout' is not registered");
    }

    #[test]
    fn test_export_failure_names_path() {
        let err = ExportFailure::Write {
            path: PathBuf::from("/nope/report.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/nope/report.md"));
    }
}
