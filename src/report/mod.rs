//! Report export and listing.

pub mod charts;
pub mod generator;
pub mod views;

pub use generator::{export, ExportOptions};
pub use views::ReportViews;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// Output format of an exported report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "md" => Some(ReportFormat::Markdown),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

/// An exported report found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct ReportFile {
    pub name: String,
    pub path: PathBuf,
    pub format: ReportFormat,
    pub size: u64,
    pub modified: DateTime<Local>,
}

/// List reports in `dir`, newest first. A missing directory is empty.
pub fn list_reports(dir: &Path) -> Result<Vec<ReportFile>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut reports = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(format) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ReportFormat::from_extension)
        else {
            continue;
        };

        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        let modified = metadata
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());

        reports.push(ReportFile {
            name: entry.file_name().to_string_lossy().to_string(),
            path: path.to_path_buf(),
            format,
            size: metadata.len(),
            modified,
        });
    }

    reports.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_parsing() {
        assert_eq!("MD".parse::<ReportFormat>(), Ok(ReportFormat::Markdown));
        assert_eq!("json".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert!("xlsx".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_list_reports_filters_extensions() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a_qa_P1_F0_B0.md"), "# a").unwrap();
        std::fs::write(dir.path().join("b_qa_P1_F0_B0.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested.md")).unwrap();

        let reports = list_reports(dir.path()).unwrap();
        let mut names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["a_qa_P1_F0_B0.md", "b_qa_P1_F0_B0.json"]);
    }

    #[test]
    fn test_list_reports_missing_dir() {
        let reports = list_reports(Path::new("/definitely/not/here")).unwrap();
        assert!(reports.is_empty());
    }
}
