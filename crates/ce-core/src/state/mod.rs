//! Chart state and the editor's view state

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::trace::TraceDefinition;

/// Everything the chart editor emits on an edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartState {
    /// Trace definitions, possibly with unresolved column references
    #[serde(default)]
    pub data: Vec<TraceDefinition>,

    /// Layout object, passed through untouched
    #[serde(default = "empty_layout")]
    pub layout: Value,

    /// Animation frames, passed through untouched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Value>,
}

fn empty_layout() -> Value {
    Value::Object(Map::new())
}

impl Default for ChartState {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            layout: empty_layout(),
            frames: Vec::new(),
        }
    }
}

/// View state owned by the editing host.
///
/// The data layer never keeps per-edit state of its own; the host records
/// the latest chart here and bumps the revisions the renderer watches.
#[derive(Debug, Clone, Default)]
pub struct EditorViewState {
    /// Last chart state received from the editor
    pub current: ChartState,

    /// Bumped on every edit
    pub edit_revision: u64,

    /// Bumped whenever the renderer must redraw (edits, resizes, relayouts)
    pub render_revision: u64,
}

impl EditorViewState {
    pub fn new(initial: ChartState) -> Self {
        Self {
            current: initial,
            edit_revision: 0,
            render_revision: 0,
        }
    }

    /// Record an edit; returns the render revision the renderer should draw
    pub fn record_edit(&mut self, state: ChartState) -> u64 {
        self.current = state;
        self.edit_revision += 1;
        self.request_render()
    }

    /// Request a redraw without changing the chart
    pub fn request_render(&mut self) -> u64 {
        self.render_revision += 1;
        self.render_revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chart_state_defaults() {
        let state: ChartState = serde_json::from_value(json!({})).unwrap();
        assert!(state.data.is_empty());
        assert_eq!(state.layout, json!({}));
        assert!(state.frames.is_empty());

        // Empty frames are not written back
        assert_eq!(serde_json::to_value(&state).unwrap(), json!({"data": [], "layout": {}}));
    }

    #[test]
    fn test_revisions() {
        let mut view = EditorViewState::default();

        assert_eq!(view.request_render(), 1);
        assert_eq!(view.edit_revision, 0);

        let state: ChartState = serde_json::from_value(json!({"data": [{"type": "bar"}]})).unwrap();
        assert_eq!(view.record_edit(state), 2);
        assert_eq!(view.edit_revision, 1);
        assert_eq!(view.current.data.len(), 1);
    }
}
