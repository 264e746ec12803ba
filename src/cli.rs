//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and merging over the config file.

use clap::Parser;
use qassurify::config::Config;
use qassurify::models::Severity;
use qassurify::report::ReportFormat;
use std::path::PathBuf;

/// Qassurify - automated QA runs against a web application
///
/// Resolves a test mode into a plan of checks, runs them against the
/// target, and exports a Markdown or JSON report with stats, charts and
/// recommendations.
///
/// Examples:
///   qassurify --target localhost:8000 --mode smoke
///   qassurify --target https://staging.example.com --mode full --parallel
///   qassurify --target example.com --units login,security --format json
///   qassurify --list-reports
///   qassurify --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Target address to test
    ///
    /// Scheme defaults to https://. Falls back to http://127.0.0.1:8000
    /// when empty.
    #[arg(short, long, value_name = "URL", env = "QASSURIFY_TARGET")]
    pub target: Option<String>,

    /// Test mode: smoke, fast (quick), integration, full (e2e)
    ///
    /// Unknown modes run the full plan.
    #[arg(short, long, value_name = "MODE", env = "QASSURIFY_MODE")]
    pub mode: Option<String>,

    /// Run only these units (comma-separated), bypassing the mode
    ///
    /// Example: --units login,forms
    #[arg(short, long, value_name = "UNITS", value_delimiter = ',')]
    pub units: Option<Vec<String>>,

    /// Do not append the api unit to the mode's plan
    #[arg(long)]
    pub skip_api: bool,

    /// Directory reports are written to
    #[arg(short, long, value_name = "DIR", env = "QASSURIFY_REPORT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Leave charts out of the report
    #[arg(long)]
    pub no_charts: bool,

    /// Do not export a report when the run ends
    #[arg(long)]
    pub no_export: bool,

    /// Dispatch units across a small worker pool
    #[arg(long)]
    pub parallel: bool,

    /// Worker pool size for --parallel (capped at 5)
    #[arg(long, value_name = "NUM", requires = "parallel")]
    pub workers: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .qassurify.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Fail if FAIL or BUG findings at or above this severity exist
    ///
    /// Useful for CI pipelines. Exit code 2 when threshold is exceeded.
    /// Values: critical, high, medium, low
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// List registered units and exit
    #[arg(long)]
    pub list_units: bool,

    /// List known modes and exit
    #[arg(long)]
    pub list_modes: bool,

    /// List exported reports (newest first) and exit
    #[arg(long)]
    pub list_reports: bool,

    /// Generate a default .qassurify.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format with Mermaid charts (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Markdown => ReportFormat::Markdown,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

/// Severity level for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl From<FailOnLevel> for Severity {
    fn from(level: FailOnLevel) -> Self {
        match level {
            FailOnLevel::Low => Severity::Low,
            FailOnLevel::Medium => Severity::Medium,
            FailOnLevel::High => Severity::High,
            FailOnLevel::Critical => Severity::Critical,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// True when the invocation only lists or generates something.
    pub fn is_informational(&self) -> bool {
        self.list_units || self.list_modes || self.list_reports || self.init_config
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(workers) = self.workers {
            if workers == 0 {
                return Err("Workers must be at least 1".to_string());
            }
        }

        if let Some(ref units) = self.units {
            if units.iter().all(|u| u.trim().is_empty()) {
                return Err("--units needs at least one unit name".to_string());
            }
        }

        if let Some(ref mode) = self.mode {
            if mode.trim().is_empty() {
                return Err("Mode must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over `--verbose` and `[general] verbose`.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Merge these arguments over a loaded configuration.
    ///
    /// Only explicitly provided arguments override file settings.
    pub fn merge_into(&self, config: &mut Config) {
        if let Some(ref target) = self.target {
            config.run.target = target.clone();
        }
        if let Some(ref mode) = self.mode {
            config.run.mode = mode.clone();
        }
        if self.skip_api {
            config.run.include_api = false;
        }
        if self.parallel {
            config.run.parallel = true;
        }
        if let Some(workers) = self.workers {
            config.run.workers = workers;
        }

        if let Some(ref dir) = self.output_dir {
            config.general.report_dir = dir.to_string_lossy().to_string();
        }
        if let Some(format) = self.format {
            config.general.format = format.into();
        }
        if self.no_charts {
            config.report.charts = false;
        }
        if self.no_export {
            config.report.auto_export = false;
        }

        // Flags always override
        if self.verbose {
            config.general.verbose = true;
        }
    }
}
