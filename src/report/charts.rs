//! Chart rendering.
//!
//! Charts are an enhancement attached to the summary view. Formats
//! without charting support return an error, which the exporter logs and
//! discards.

use crate::report::views::ReportViews;
use crate::report::ReportFormat;
use anyhow::{bail, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Pie,
    Bar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: String,
    pub kind: ChartKind,
    pub data: Vec<(String, usize)>,
}

/// Pass/fail/bug distribution.
pub fn outcome_chart(views: &ReportViews) -> Chart {
    Chart {
        title: "Results Distribution".to_string(),
        kind: ChartKind::Pie,
        data: vec![
            ("PASS".to_string(), views.summary.passed),
            ("FAIL".to_string(), views.summary.failed),
            ("BUG".to_string(), views.summary.bugs),
        ],
    }
}

/// Record counts per category.
pub fn category_chart(views: &ReportViews) -> Chart {
    Chart {
        title: "Counts by Category".to_string(),
        kind: ChartKind::Bar,
        data: views
            .categories
            .iter()
            .map(|row| (row.category.clone(), row.total))
            .collect(),
    }
}

/// Render both charts for `format`.
pub fn render(format: ReportFormat, views: &ReportViews) -> Result<String> {
    match format {
        ReportFormat::Markdown => {
            let mut out = String::new();
            for chart in [outcome_chart(views), category_chart(views)] {
                out.push_str(&render_mermaid(&chart)?);
            }
            Ok(out)
        }
        ReportFormat::Json => bail!("JSON reports have no chart support"),
    }
}

fn render_mermaid(chart: &Chart) -> Result<String> {
    if chart.data.is_empty() {
        bail!("chart '{}' has no data", chart.title);
    }

    let mut block = String::from("```mermaid\n");
    match chart.kind {
        ChartKind::Pie => {
            block.push_str(&format!("pie showData title {}\n", chart.title));
            for (label, value) in &chart.data {
                block.push_str(&format!("    \"{}\" : {}\n", escape(label), value));
            }
        }
        ChartKind::Bar => {
            let labels: Vec<String> = chart
                .data
                .iter()
                .map(|(label, _)| format!("\"{}\"", escape(label)))
                .collect();
            let values: Vec<String> = chart.data.iter().map(|(_, v)| v.to_string()).collect();
            let max = chart.data.iter().map(|(_, v)| *v).max().unwrap_or(0).max(1);

            block.push_str("xychart-beta\n");
            block.push_str(&format!("    title \"{}\"\n", escape(&chart.title)));
            block.push_str(&format!("    x-axis [{}]\n", labels.join(", ")));
            block.push_str(&format!("    y-axis \"Records\" 0 --> {}\n", max));
            block.push_str(&format!("    bar [{}]\n", values.join(", ")));
        }
    }
    block.push_str("```\n\n");
    Ok(block)
}

fn escape(label: &str) -> String {
    label.replace('"', "'")
}
