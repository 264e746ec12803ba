//! Qassurify - automated QA runs against a web application.
//!
//! Thin CLI over the run engine: resolves config, starts one run, shows
//! live progress, prints a summary and exits with a CI-friendly code.
//!
//! Exit codes:
//!   0   - Success (no bugs, nothing above --fail-on)
//!   1   - Runtime error or the run could not execute (Failed)
//!   2   - Bugs found, or FAIL/BUG findings at or above --fail-on
//!   130 - Cancelled with Ctrl-C

mod cli;

use anyhow::{bail, Context, Result};
use cli::Args;
use indicatif::{ProgressBar, ProgressStyle};
use qassurify::config::{Config, CONFIG_FILE};
use qassurify::engine::{RunController, RunStatus, StartOptions, StatusSnapshot};
use qassurify::models::{Outcome, Severity};
use qassurify::report::list_reports;
use qassurify::units::UnitRegistry;
use qassurify::{modes, progress::ProgressObserver};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config first so `[general] verbose` can set the log level
    let (mut config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    args.merge_into(&mut config);

    init_logging(args.log_level(config.general.verbose));

    info!("Qassurify v{}", env!("CARGO_PKG_VERSION"));
    origin.log();
    debug!("Arguments: {:?}", args);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .qassurify.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the target, mode, report directory and more.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Execute the requested command. Returns the process exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let registry = UnitRegistry::builtin();

    if args.is_informational() {
        return handle_listing(&args, &config, &registry);
    }

    let controller = RunController::new(registry, config.run_settings());

    let bar = progress_bar(args.quiet);
    if let Some(ref bar) = bar {
        let bar = Arc::clone(bar);
        let observer: ProgressObserver = Arc::new(move |percent: u8| -> Result<()> {
            bar.set_position(u64::from(percent));
            Ok(())
        });
        controller.subscribe_progress(observer);
    }

    let options = StartOptions {
        units: args.units.clone(),
        include_api: None,
    };
    let started = controller.start(&config.run.target, &config.run.mode, Some(options));
    if !started.accepted {
        bail!("Run was not accepted");
    }

    let snapshot = controller.status_snapshot();
    println!(
        "🚀 Running '{}' against {} ({} units, {} worker(s))",
        snapshot.mode,
        snapshot.target,
        snapshot.total_units,
        controller.settings().workers
    );

    let mut interrupted = false;
    let wait = controller.wait();
    tokio::pin!(wait);
    tokio::select! {
        _ = &mut wait => {}
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    interrupted = true;
                    warn!("Interrupted, finishing the current unit before stopping");
                    controller.request_cancel();
                }
                Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
            }
            (&mut wait).await;
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let snapshot = controller.status_snapshot();
    print_summary(&controller, &snapshot);

    if interrupted && snapshot.status == RunStatus::Cancelled {
        return Ok(EXIT_CANCELLED);
    }
    if snapshot.status == RunStatus::Failed {
        return Ok(1);
    }

    let records = controller.results(None, None, None).records;
    if let Some(level) = args.fail_on {
        let threshold = Severity::from(level);
        let above = records
            .iter()
            .any(|r| r.outcome.is_problem() && r.severity >= threshold);
        if above {
            eprintln!(
                "\n⛔ Findings at or above {:?} severity. Failing (exit code 2).",
                level
            );
            return Ok(2);
        }
    }
    if records.iter().any(|r| r.outcome == Outcome::Bug) {
        return Ok(2);
    }

    Ok(0)
}

/// Handle --list-units, --list-modes and --list-reports.
fn handle_listing(args: &Args, config: &Config, registry: &UnitRegistry) -> Result<i32> {
    if args.list_units {
        println!("Registered units:");
        for (name, description) in registry.describe() {
            println!("  {:<12} {}", name, description);
        }
    }

    if args.list_modes {
        println!("Modes:");
        for mode in modes::mode_names() {
            let plan = modes::resolve(mode);
            println!("  {:<12} {}", mode, plan.units.join(", "));
        }
    }

    if args.list_reports {
        let dir = config.report_dir();
        let reports = list_reports(&dir)?;
        if reports.is_empty() {
            println!("No reports in {}", dir.display());
        } else {
            println!("Reports in {}:", dir.display());
            for report in reports {
                println!(
                    "  {}  {:>8} bytes  {}",
                    report.modified.format("%Y-%m-%d %H:%M:%S"),
                    report.size,
                    report.name
                );
            }
        }
    }

    Ok(0)
}

fn progress_bar(quiet: bool) -> Option<Arc<ProgressBar>> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}%")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    Some(Arc::new(pb))
}

fn print_summary(controller: &RunController, snapshot: &StatusSnapshot) {
    let stats = controller.results(None, None, None).stats;

    println!("\n📊 Run Summary:");
    println!("   Status: {}", snapshot.status);
    println!(
        "   Units: {}/{} completed",
        snapshot.completed_units, snapshot.total_units
    );
    println!("   Findings: {}", stats.total);
    println!(
        "   - ✅ Passed: {} | ❌ Failed: {} | 🐞 Bugs: {}",
        stats.passed, stats.failed, stats.bugs
    );
    println!("   Pass rate: {:.1}%", stats.pass_rate);
    if stats.security_total > 0 {
        println!("   Security pass rate: {:.1}%", stats.security_pass_rate);
    }
    if let (Some(start), Some(end)) = (snapshot.started_at, snapshot.ended_at) {
        println!(
            "   Duration: {:.1}s",
            (end - start).num_milliseconds() as f64 / 1000.0
        );
    }

    let bugs = controller.bugs();
    if !bugs.is_empty() {
        println!("\n🐞 Bugs:");
        for bug in bugs.iter().take(10) {
            println!(
                "   {} [{}] {} - {}",
                bug.severity.emoji(),
                bug.category,
                bug.title,
                bug.detail
            );
        }
        if bugs.len() > 10 {
            println!("   ... and {} more", bugs.len() - 10);
        }
    }

    for error in &snapshot.errors {
        println!("\n⚠️  {}", error);
    }

    if let Some(ref report) = snapshot.last_report {
        println!("\n✅ Report saved to: {}", report.display());
    }
}

/// Where the configuration came from. Logged once the subscriber is up.
enum ConfigOrigin {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    Unreadable(anyhow::Error),
}

impl ConfigOrigin {
    fn log(&self) {
        match self {
            ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigOrigin::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE),
            ConfigOrigin::Builtin => debug!("No config file found, using defaults"),
            ConfigOrigin::Unreadable(e) => warn!("Failed to load config: {}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigOrigin::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigOrigin::Builtin)),
        Err(e) => Ok((Config::default(), ConfigOrigin::Unreadable(e))),
    }
}
