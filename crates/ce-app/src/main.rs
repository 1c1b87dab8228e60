//! Chart editor host
//!
//! Opens a table or chart document, applies the chart edit, and prints the
//! resolved plot payload together with the editor's data-source options.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};

use ce_core::events::{EventBus, ResolutionFailed};
use ce_core::ColumnProvider;
use ce_data::EditorSession;

mod host;
mod renderer;

use host::{Args, Loaded};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = host::read_config(args.config.as_deref()).await?;

    let bus = Arc::new(EventBus::new());
    bus.subscribe(|failed: &ResolutionFailed| {
        warn!(trace = failed.trace_index, column = %failed.column, "edit references a missing column");
    });

    let mut session = EditorSession::new(config).with_event_bus(bus);
    let source_name = args.input.display().to_string();

    match host::read_content(&args.input).await? {
        Loaded::Table(raw) => session.load_content(&source_name, raw)?,
        Loaded::Document(document) => session.open_document(&source_name, document)?,
    }

    let chart = match &args.traces {
        Some(path) => host::read_chart(path).await?,
        None if session.view().current.data.is_empty() => {
            let header = session.registry().map(|r| r.header().to_vec()).unwrap_or_default();
            host::default_chart(&header)
        }
        None => session.view().current.clone(),
    };

    let payload = session.apply_edit(chart)?;
    let library = renderer::plot_library()?;
    info!(revision = payload.revision, traces = payload.data.len(), "chart ready");

    let output = json!({
        "renderer": library.bundle,
        "plot": payload,
        "options": session.data_source_options(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if let Some(path) = &args.save {
        let document = session.to_document(true).to_json_string()?;
        tokio::fs::write(path, document).await?;
        info!(path = %path.display(), "saved chart document");
    }

    Ok(())
}
