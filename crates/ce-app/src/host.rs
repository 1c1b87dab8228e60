//! File loading and argument handling for the host binary

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use tracing::info;

use ce_core::{ChartState, TraceDefinition};
use ce_data::document::{ChartDocument, ContentKind};
use ce_data::{DataError, LoadConfig, RawTable};

/// Open a table or chart document, apply a chart edit and print the
/// resolved plot payload as JSON
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "chart-editor", version)]
pub struct Args {
    /// Table (.csv, .tsv, .txt, .json) or chart document (.plotly) to open
    #[arg(value_name = "PATH")]
    pub input: PathBuf,

    /// JSON file with load options
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSON file with the chart state to apply as an edit
    #[arg(long, value_name = "FILE")]
    pub traces: Option<PathBuf>,

    /// Write the resolved chart back as a document to this path
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,
}

/// Content read from disk
#[derive(Debug)]
pub enum Loaded {
    Table(RawTable),
    Document(ChartDocument),
}

/// Decide what `text` is from its file name and, for `.json`, its shape
pub fn classify(path: &Path, text: String) -> Result<Loaded, DataError> {
    match ContentKind::from_path(path) {
        ContentKind::Chart => Ok(Loaded::Document(ChartDocument::from_json_str(&text)?)),
        ContentKind::Json => {
            let value: Value = serde_json::from_str(&text)?;
            if ChartDocument::is_chart_document(&value) {
                Ok(Loaded::Document(ChartDocument::from_value(value)?))
            } else {
                Ok(Loaded::Table(RawTable::from_json(&value)?))
            }
        }
        ContentKind::Delimited => Ok(Loaded::Table(RawTable::delimited(text))),
    }
}

pub async fn read_content(path: &Path) -> Result<Loaded> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    info!(path = %path.display(), bytes = text.len(), "read input");
    Ok(classify(path, text)?)
}

pub async fn read_config(path: Option<&Path>) -> Result<LoadConfig> {
    let Some(path) = path else {
        return Ok(LoadConfig::default());
    };
    let owned = path.to_path_buf();
    let config = tokio::task::spawn_blocking(move || LoadConfig::from_json_file(&owned))
        .await
        .context("config loader panicked")?
        .with_context(|| format!("failed to load config {}", path.display()))?;
    Ok(config)
}

pub async fn read_chart(path: &Path) -> Result<ChartState> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read traces {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid chart state in {}", path.display()))
}

/// Starter chart for a bare table: one scatter trace over the first two columns
pub fn default_chart(header: &[String]) -> ChartState {
    let mut chart = ChartState::default();
    if let [x, y, ..] = header {
        let mut trace = TraceDefinition::new();
        trace.set_direct("type", json!("scatter"));
        trace.set_direct("mode", json!("lines+markers"));
        trace.set_source("x", x.as_str());
        trace.set_source("y", y.as_str());
        chart.data.push(trace);
        chart.layout = json!({"xaxis": {"title": x}, "yaxis": {"title": y}});
    }
    chart
}
