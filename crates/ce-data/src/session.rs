//! The editing session pipeline
//!
//! raw content → column registry (once per content change) → on every edit,
//! trace resolution against the registry → resolved payload for the renderer.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use ce_core::events::{ContentLoaded, ContentRejected, Event, EventBus, ResolutionFailed, TracesResolved};
use ce_core::{
    resolve_traces, resolve_traces_collect, ChartState, ColumnOption, ColumnProvider, EditorViewState,
    ResolveError, Scalar, TraceDefinition,
};

use crate::config::LoadConfig;
use crate::document::ChartDocument;
use crate::raw::RawTable;
use crate::registry::ColumnRegistry;
use crate::DataError;

/// What to do with a trace field that references an unknown column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownColumnPolicy {
    /// Reject the whole edit
    #[default]
    Abort,
    /// Keep the field's last value and drop the reference
    DetachField,
    /// Drop every trace with an unknown reference
    DropTrace,
}

/// Fully resolved chart handed to the plotting renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPayload {
    pub data: Vec<Value>,
    pub layout: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Value>,
    /// Render revision the renderer should draw
    pub revision: u64,
}

/// One editing session over one table
pub struct EditorSession {
    config: LoadConfig,
    source_name: String,
    registry: Option<ColumnRegistry>,
    view: EditorViewState,
    events: Option<Arc<EventBus>>,
}

impl EditorSession {
    pub fn new(config: LoadConfig) -> Self {
        Self {
            config,
            source_name: String::new(),
            registry: None,
            view: EditorViewState::default(),
            events: None,
        }
    }

    /// Publish pipeline events on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Replace the session's table. On failure the previous table is dropped
    /// as well, so no chart is drawn against stale or partial data.
    pub fn load_content(&mut self, source_name: &str, raw: RawTable) -> Result<(), DataError> {
        self.source_name = source_name.to_string();
        self.registry = None;

        match ColumnRegistry::from_raw(raw, &self.config) {
            Ok(registry) => {
                info!(source = source_name, columns = registry.header().len(), "content loaded");
                self.publish(ContentLoaded {
                    source_name: source_name.to_string(),
                    row_count: registry.row_count(),
                    column_count: registry.header().len(),
                    lazy: registry.is_lazy(),
                });
                self.registry = Some(registry);
                Ok(())
            }
            Err(err) => {
                warn!(source = source_name, error = %err, "content rejected");
                self.publish(ContentRejected {
                    source_name: source_name.to_string(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Open a persisted document: its stored table (if any) becomes the
    /// session's table and its chart becomes the current state.
    pub fn open_document(&mut self, source_name: &str, document: ChartDocument) -> Result<(), DataError> {
        if let Some(raw) = document.raw_table() {
            self.load_content(source_name, raw?)?;
        }
        self.view = EditorViewState::new(document.chart);
        Ok(())
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn registry(&self) -> Option<&ColumnRegistry> {
        self.registry.as_ref()
    }

    pub fn view(&self) -> &EditorViewState {
        &self.view
    }

    /// Data sources for the chart editor; empty when no table is loaded
    pub fn data_sources(&self) -> IndexMap<String, Arc<Vec<Scalar>>> {
        self.registry.as_ref().map(|r| r.data_sources()).unwrap_or_default()
    }

    /// Column picker options for the chart editor
    pub fn data_source_options(&self) -> Vec<ColumnOption> {
        self.registry.as_ref().map(|r| r.options()).unwrap_or_default()
    }

    /// Resolve an edit, aborting on the first unknown column
    pub fn apply_edit(&mut self, state: ChartState) -> Result<PlotPayload, DataError> {
        self.apply_edit_with(state, UnknownColumnPolicy::Abort)
    }

    /// Resolve an edit and record it as the current state.
    ///
    /// Resolution happens on every edit; nothing from a previous edit is
    /// reused. A rejected edit leaves the current state untouched.
    pub fn apply_edit_with(&mut self, mut state: ChartState, policy: UnknownColumnPolicy) -> Result<PlotPayload, DataError> {
        for trace in state.data.iter_mut() {
            trace.ensure_uid();
        }

        let has_sources = state.data.iter().any(|t| t.sources().next().is_some());
        match (&self.registry, has_sources) {
            (Some(registry), true) => {
                let errors: Vec<ResolveError> = match policy {
                    UnknownColumnPolicy::Abort => resolve_traces(&mut state.data, registry)
                        .err()
                        .into_iter()
                        .collect(),
                    _ => resolve_traces_collect(&mut state.data, registry),
                };
                if !errors.is_empty() {
                    for err in &errors {
                        self.report(err);
                    }
                    apply_policy(&mut state.data, errors, policy)?;
                }
            }
            (None, true) => return Err(DataError::NoTable),
            (_, false) => {}
        }

        let payload_data = state.data.iter().map(TraceDefinition::to_value).collect();
        let layout = state.layout.clone();
        let frames = state.frames.clone();
        let trace_count = state.data.len();
        let revision = self.view.record_edit(state);

        self.publish(TracesResolved {
            trace_count,
            render_revision: revision,
        });

        Ok(PlotPayload {
            data: payload_data,
            layout,
            frames,
            revision,
        })
    }

    /// Request a redraw of the current chart (resize, relayout)
    pub fn request_render(&mut self) -> u64 {
        self.view.request_render()
    }

    /// Current chart as a persisted document, optionally with the table
    pub fn to_document(&self, include_data_source: bool) -> ChartDocument {
        let mut document = ChartDocument::new(self.view.current.clone());
        if include_data_source {
            if let Some(registry) = &self.registry {
                document.set_data_source(&registry.to_column_source());
            }
        }
        document
    }

    fn report(&self, err: &ResolveError) {
        let ResolveError::UnknownColumn {
            trace_index,
            field,
            column,
            ..
        } = err;
        warn!(trace_index, field = %field, column = %column, "unknown column in trace");
        self.publish(ResolutionFailed {
            trace_index: *trace_index,
            field: field.clone(),
            column: column.clone(),
        });
    }

    fn publish<E: Event>(&self, event: E) {
        if let Some(bus) = &self.events {
            bus.publish(&event);
        }
    }
}

fn apply_policy(
    traces: &mut Vec<TraceDefinition>,
    errors: Vec<ResolveError>,
    policy: UnknownColumnPolicy,
) -> Result<(), DataError> {
    match policy {
        UnknownColumnPolicy::Abort => match errors.into_iter().next() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        },
        UnknownColumnPolicy::DetachField => {
            for ResolveError::UnknownColumn { trace_index, field, .. } in errors {
                traces[trace_index].detach_source(&field);
            }
            Ok(())
        }
        UnknownColumnPolicy::DropTrace => {
            let broken: BTreeSet<usize> = errors
                .into_iter()
                .map(|ResolveError::UnknownColumn { trace_index, .. }| trace_index)
                .collect();
            let mut idx = 0;
            traces.retain(|_| {
                let keep = !broken.contains(&idx);
                idx += 1;
                keep
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn chart(value: Value) -> ChartState {
        serde_json::from_value(value).unwrap()
    }

    fn session_with_table() -> EditorSession {
        let mut session = EditorSession::new(LoadConfig::default());
        session
            .load_content("data.csv", RawTable::delimited("time,value\n1,10\n2,20\n3,30\n"))
            .unwrap();
        session
    }

    #[test]
    fn test_edit_is_resolved() {
        let mut session = session_with_table();

        let payload = session
            .apply_edit(chart(json!({
                "data": [{"type": "scatter", "uid": "a", "x": [], "xsrc": "time", "y": [], "ysrc": "value"}],
                "layout": {"title": "t"}
            })))
            .unwrap();

        assert_eq!(
            payload.data,
            vec![json!({"type": "scatter", "uid": "a", "x": [1, 2, 3], "xsrc": "time", "y": [10, 20, 30], "ysrc": "value"})]
        );
        assert_eq!(payload.layout, json!({"title": "t"}));
        assert_eq!(payload.revision, 1);
        assert_eq!(session.view().edit_revision, 1);
    }

    #[test]
    fn test_options_follow_header() {
        let session = session_with_table();
        let options = session.data_source_options();
        assert_eq!(options.iter().map(|o| o.value.as_str()).collect::<Vec<_>>(), vec!["time", "value"]);
        assert_eq!(session.data_sources().len(), 2);
    }

    #[test]
    fn test_abort_keeps_previous_state() {
        let mut session = session_with_table();
        session
            .apply_edit(chart(json!({"data": [{"uid": "a", "xsrc": "time"}]})))
            .unwrap();

        let err = session
            .apply_edit(chart(json!({"data": [{"uid": "a", "xsrc": "nope"}]})))
            .unwrap_err();

        assert!(matches!(err, DataError::Resolve(ResolveError::UnknownColumn { ref column, .. }) if column == "nope"));
        assert_eq!(session.view().edit_revision, 1);
        assert_eq!(session.view().current.data[0].sources().next(), Some(("x", "time")));
    }

    #[test]
    fn test_detach_and_drop_policies() {
        let edit = json!({"data": [
            {"uid": "a", "x": [9], "xsrc": "nope"},
            {"uid": "b", "xsrc": "time"}
        ]});

        let mut session = session_with_table();
        let detached = session
            .apply_edit_with(chart(edit.clone()), UnknownColumnPolicy::DetachField)
            .unwrap();
        assert_eq!(detached.data[0], json!({"uid": "a", "x": [9]}));
        assert_eq!(detached.data[1], json!({"uid": "b", "x": [1, 2, 3], "xsrc": "time"}));

        let dropped = session
            .apply_edit_with(chart(edit), UnknownColumnPolicy::DropTrace)
            .unwrap();
        assert_eq!(dropped.data, vec![json!({"uid": "b", "x": [1, 2, 3], "xsrc": "time"})]);
    }

    #[test]
    fn test_sources_without_table() {
        let mut session = EditorSession::new(LoadConfig::default());
        let err = session
            .apply_edit(chart(json!({"data": [{"xsrc": "a"}]})))
            .unwrap_err();
        assert!(matches!(err, DataError::NoTable));

        // Traces without references need no table
        let payload = session.apply_edit(chart(json!({"data": [{"x": [1]}]}))).unwrap();
        assert_eq!(payload.data.len(), 1);
        assert!(payload.data[0].get("uid").is_some());
    }

    #[test]
    fn test_rejected_content_clears_table() {
        let mut session = session_with_table();
        let err = session.load_content("bad.txt", RawTable::delimited("abc\n1\n")).unwrap_err();

        assert!(matches!(err, DataError::Format(_)));
        assert!(session.registry().is_none());
        assert!(session.data_source_options().is_empty());
    }

    #[test]
    fn test_document_round_trip() {
        let mut session = session_with_table();
        session
            .apply_edit(chart(json!({"data": [{"uid": "a", "xsrc": "time"}], "layout": {}})))
            .unwrap();

        let text = session.to_document(true).to_json_string().unwrap();
        let mut reopened = EditorSession::new(LoadConfig::default());
        reopened
            .open_document("chart.plotly", ChartDocument::from_json_str(&text).unwrap())
            .unwrap();

        assert_eq!(reopened.registry().map(|r| r.header().to_vec()), Some(vec!["time".to_string(), "value".to_string()]));
        let state = reopened.view().current.clone();
        let payload = reopened.apply_edit(state).unwrap();
        assert_eq!(payload.data[0]["x"], json!([1, 2, 3]));
    }

    #[test]
    fn test_events_published() {
        let bus = Arc::new(EventBus::new());
        let loaded = Arc::new(Mutex::new(Vec::new()));
        let sink = loaded.clone();
        bus.subscribe(move |e: &ContentLoaded| sink.lock().push((e.row_count, e.column_count, e.lazy)));

        let mut session = EditorSession::new(LoadConfig::default()).with_event_bus(bus);
        session
            .load_content("rows.json", RawTable::from_json(&json!([{"a": 1}, {"a": 2}])).unwrap())
            .unwrap();

        assert_eq!(*loaded.lock(), vec![(2, 1, false)]);
        assert_eq!(session.request_render(), 1);
    }
}
