//! Report generation.
//!
//! Renders [`ReportViews`] as Markdown (tables plus Mermaid charts) or
//! JSON (tables only), and writes the artifact to a report directory.

use crate::error::ExportFailure;
use crate::models::Record;
use crate::report::views::{CategoryRow, ReportViews, SeverityRow, SummaryView};
use crate::report::{charts, ReportFormat};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Export settings.
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub format: ReportFormat,
    /// Attach charts when the format supports them.
    pub charts: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ReportFormat::Markdown,
            charts: true,
        }
    }
}

/// Write a report for `records` into `dir` and return its path.
pub fn export(
    records: &[Record],
    dir: &Path,
    host_label: &str,
    options: ExportOptions,
) -> Result<PathBuf, ExportFailure> {
    let views = ReportViews::build(records, host_label);

    let content = match options.format {
        ReportFormat::Markdown => generate_markdown_report(&views, options.charts),
        ReportFormat::Json => {
            if options.charts {
                if let Err(e) = charts::render(ReportFormat::Json, &views) {
                    debug!("Charts skipped: {}", e);
                }
            }
            generate_json_report(&views)?
        }
    };

    std::fs::create_dir_all(dir).map_err(|source| ExportFailure::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = unused_path(dir, &report_file_name(host_label, &views.summary, options.format));
    std::fs::write(&path, content).map_err(|source| ExportFailure::Write {
        path: path.clone(),
        source,
    })?;

    info!("Report written to {}", path.display());
    Ok(path)
}

/// `{host}_qa_{date}_P{passed}_F{failed}_B{bugs}.{ext}`
pub fn report_file_name(host_label: &str, summary: &SummaryView, format: ReportFormat) -> String {
    format!(
        "{}_qa_{}_P{}_F{}_B{}.{}",
        safe_host(host_label),
        Local::now().format("%Y-%m-%d_%H%M%S"),
        summary.passed,
        summary.failed,
        summary.bugs,
        format.extension()
    )
}

/// `dir/name`, or `dir/{stem}_{n}.{ext}` with the first free `n >= 2` when
/// a report of that name already exists.
fn unused_path(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    if !path.exists() {
        return path;
    }

    let (stem, ext) = file_name.rsplit_once('.').unwrap_or((file_name, ""));
    let mut n = 2;
    loop {
        let candidate = dir.join(format!("{}_{}.{}", stem, n, ext));
        if !candidate.exists() {
            debug!("{} exists, writing {}", path.display(), candidate.display());
            return candidate;
        }
        n += 1;
    }
}

/// Host label reduced to filename-safe characters.
pub fn safe_host(host_label: &str) -> String {
    let stripped = host_label
        .trim()
        .trim_start_matches("http://")
        .trim_start_matches("https://");

    let safe: String = stripped
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let safe = safe.trim_matches('-');
    if safe.is_empty() {
        "localhost".to_string()
    } else {
        safe.to_string()
    }
}

/// Generate a JSON report. JSON has no chart support; every tabular view
/// is still present.
pub fn generate_json_report(views: &ReportViews) -> Result<String, ExportFailure> {
    Ok(serde_json::to_string_pretty(views)?)
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(views: &ReportViews, with_charts: bool) -> String {
    let mut output = String::new();

    output.push_str("# QA Test Report\n\n");
    output.push_str(&format!("- **Target:** {}\n", views.host));
    output.push_str(&format!(
        "- **Generated:** {}\n\n",
        views.generated_at.format("%Y-%m-%d %H:%M:%S")
    ));

    output.push_str(&generate_summary_section(&views.summary));

    if with_charts {
        // Best-effort: a chart failure never fails the export.
        match charts::render(ReportFormat::Markdown, views) {
            Ok(rendered) => output.push_str(&rendered),
            Err(e) => debug!("Charts skipped: {}", e),
        }
    }

    output.push_str(&generate_category_section(&views.categories));
    output.push_str(&generate_severity_section(&views.severities));
    output.push_str(&generate_record_section("Bugs Found", &views.bugs));

    if let Some(ref security) = views.security {
        output.push_str(&generate_record_section("Security Tests", security));
    }
    if let Some(ref performance) = views.performance {
        output.push_str(&generate_record_section("Performance Tests", performance));
    }

    output.push_str(&generate_recommendations_section(views));
    output.push_str(&generate_record_section("Test Results", &views.records));

    output
}

fn generate_summary_section(summary: &SummaryView) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|---:|\n");

    let rows: [(&str, String); 12] = [
        ("Total Tests Executed", summary.total.to_string()),
        ("Tests Passed", summary.passed.to_string()),
        ("Tests Failed", summary.failed.to_string()),
        ("Bugs Found", summary.bugs.to_string()),
        ("Cancelled", summary.cancelled.to_string()),
        ("Overall Pass Rate (%)", format!("{:.1}%", summary.pass_rate)),
        ("Security Tests", summary.security_total.to_string()),
        (
            "Security Pass Rate (%)",
            format!("{:.1}%", summary.security_pass_rate),
        ),
        ("Critical Issues", summary.critical.to_string()),
        ("High Priority Issues", summary.high.to_string()),
        ("Medium Priority Issues", summary.medium.to_string()),
        ("Low Priority Issues", summary.low.to_string()),
    ];
    for (metric, value) in rows {
        section.push_str(&format!("| {} | {} |\n", metric, value));
    }
    section.push('\n');

    section
}

fn generate_category_section(rows: &[CategoryRow]) -> String {
    let mut section = String::new();

    section.push_str("## Category Analysis\n\n");
    section.push_str("| Category | Total | Passed | Failed | Bugs | Pass Rate (%) |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {:.1}% |\n",
            cell(&row.category),
            row.total,
            row.passed,
            row.failed,
            row.bugs,
            row.pass_rate
        ));
    }
    section.push('\n');

    section
}

fn generate_severity_section(rows: &[SeverityRow]) -> String {
    let mut section = String::new();

    section.push_str("## Severity Analysis\n\n");
    section.push_str("| Severity | Count | Percentage (%) | Priority |\n");
    section.push_str("|:---|:---:|:---:|:---|\n");
    for row in rows {
        section.push_str(&format!(
            "| {} {} | {} | {:.1}% | {} |\n",
            row.severity.emoji(),
            row.severity,
            row.count,
            row.percentage,
            row.priority
        ));
    }
    section.push('\n');

    section
}

fn generate_record_section(title: &str, records: &[Record]) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));
    if records.is_empty() {
        section.push_str("_None._\n\n");
        return section;
    }

    section.push_str("| Title | Outcome | Detail | Category | Severity | Timestamp |\n");
    section.push_str("|:---|:---:|:---|:---|:---|:---|\n");
    for record in records {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            cell(&record.title),
            record.outcome,
            cell(&record.detail),
            cell(&record.category),
            record.severity,
            record.timestamp.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    section.push('\n');

    section
}

fn generate_recommendations_section(views: &ReportViews) -> String {
    let mut section = String::new();

    section.push_str("## Recommendations\n\n");
    if views.recommendations.is_empty() {
        section.push_str("No recommendations. All checks look healthy.\n\n");
        return section;
    }

    section.push_str("| # | Recommendation | Priority |\n");
    section.push_str("|:---:|:---|:---|\n");
    for (i, rec) in views.recommendations.iter().enumerate() {
        section.push_str(&format!("| {} | {} | {} |\n", i + 1, cell(&rec.text), rec.priority));
    }
    section.push('\n');

    section
}

/// Escape a value for a Markdown table cell.
fn cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}
