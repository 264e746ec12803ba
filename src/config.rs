//! Configuration file handling.
//!
//! This module handles loading `.qassurify.toml` and turning it into
//! [`RunSettings`] for the controller. CLI arguments are merged in by the
//! binary and always win.

use crate::engine::{max_workers, RunSettings};
use crate::modes::FALLBACK_MODE;
use crate::report::{ExportOptions, ReportFormat};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".qassurify.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Run settings.
    #[serde(default)]
    pub run: RunConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory reports are exported to.
    #[serde(default = "default_report_dir")]
    pub report_dir: String,

    /// Report format.
    #[serde(default)]
    pub format: ReportFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            report_dir: default_report_dir(),
            format: ReportFormat::default(),
            verbose: false,
        }
    }
}

fn default_report_dir() -> String {
    "reports".to_string()
}

/// What to run and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target address; normalized before use.
    #[serde(default = "default_target")]
    pub target: String,

    /// Mode name (smoke, fast, integration, full).
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Append the `api` unit to mode plans.
    #[serde(default = "default_true")]
    pub include_api: bool,

    /// Dispatch units across a worker pool instead of one by one.
    #[serde(default)]
    pub parallel: bool,

    /// Worker pool size when `parallel` is set. Capped at
    /// `min(available_parallelism, 5)`.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            mode: default_mode(),
            include_api: true,
            parallel: false,
            workers: default_workers(),
        }
    }
}

fn default_target() -> String {
    crate::engine::DEFAULT_TARGET.to_string()
}

fn default_mode() -> String {
    FALLBACK_MODE.to_string()
}

fn default_workers() -> usize {
    3
}

fn default_true() -> bool {
    true
}

/// Report generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Export a report when a run ends.
    #[serde(default = "default_true")]
    pub auto_export: bool,

    /// Attach charts when the format supports them.
    #[serde(default = "default_true")]
    pub charts: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            auto_export: true,
            charts: true,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Effective worker count: 1 unless parallel dispatch is enabled.
    pub fn workers(&self) -> usize {
        if self.run.parallel {
            self.run.workers.clamp(1, max_workers())
        } else {
            1
        }
    }

    pub fn report_dir(&self) -> PathBuf {
        PathBuf::from(&self.general.report_dir)
    }

    /// Controller settings described by this configuration.
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            workers: self.workers(),
            include_api: self.run.include_api,
            auto_export: self.report.auto_export,
            report_dir: self.report_dir(),
            export: ExportOptions {
                format: self.general.format,
                charts: self.report.charts,
            },
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
