//! Resolution of column references into concrete value arrays

use thiserror::Error;
use tracing::debug;

use super::{TraceDefinition, TraceField};
use crate::data::ColumnProvider;
use crate::value::scalars_to_json;

/// Errors raised while resolving trace column references
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Trace {trace_index} field '{source_key}' references unknown column '{column}'")]
    UnknownColumn {
        trace_index: usize,
        /// Field that was to receive the values (`x`)
        field: String,
        /// Persisted key holding the reference (`xsrc`)
        source_key: String,
        column: String,
    },
}

/// Resolve every column reference in `traces`, in place.
///
/// Stops at the first unknown column. Fields resolved before the failure keep
/// their new values; nothing else in any trace is touched.
pub fn resolve_traces(
    traces: &mut [TraceDefinition],
    provider: &dyn ColumnProvider,
) -> Result<(), ResolveError> {
    for (trace_index, trace) in traces.iter_mut().enumerate() {
        if let Some(err) = resolve_trace(trace_index, trace, provider, true).into_iter().next() {
            return Err(err);
        }
    }
    Ok(())
}

/// Resolve every column reference that can be resolved and report the rest.
///
/// Fields with unknown columns keep whatever value they held. The caller
/// decides whether to detach those fields, drop their traces, or give up.
pub fn resolve_traces_collect(
    traces: &mut [TraceDefinition],
    provider: &dyn ColumnProvider,
) -> Vec<ResolveError> {
    traces
        .iter_mut()
        .enumerate()
        .flat_map(|(trace_index, trace)| resolve_trace(trace_index, trace, provider, false))
        .collect()
}

fn resolve_trace(
    trace_index: usize,
    trace: &mut TraceDefinition,
    provider: &dyn ColumnProvider,
    fail_fast: bool,
) -> Vec<ResolveError> {
    let mut errors = Vec::new();

    for (name, field) in trace.fields_mut() {
        let TraceField::Sourced(sourced) = field else {
            continue;
        };

        match provider.column(&sourced.column) {
            Ok(values) => {
                debug!(trace_index, field = %name, column = %sourced.column, len = values.len(), "resolved trace field");
                sourced.values = Some(scalars_to_json(&values));
            }
            Err(err) => {
                errors.push(ResolveError::UnknownColumn {
                    trace_index,
                    field: name.clone(),
                    source_key: sourced.source_key.clone(),
                    column: err.column,
                });
                if fail_fast {
                    break;
                }
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use indexmap::IndexMap;
    use serde_json::{json, Value};

    use crate::{Scalar, UnknownColumnError};

    struct FixedColumns {
        header: Vec<String>,
        columns: IndexMap<String, Arc<Vec<Scalar>>>,
    }

    impl FixedColumns {
        fn new(columns: &[(&str, Vec<i64>)]) -> Self {
            let columns: IndexMap<_, _> = columns
                .iter()
                .map(|(name, values)| {
                    let values = values.iter().copied().map(Scalar::Int).collect();
                    (name.to_string(), Arc::new(values))
                })
                .collect();
            Self {
                header: columns.keys().cloned().collect(),
                columns,
            }
        }
    }

    impl ColumnProvider for FixedColumns {
        fn header(&self) -> &[String] {
            &self.header
        }

        fn column(&self, name: &str) -> Result<Arc<Vec<Scalar>>, UnknownColumnError> {
            self.columns
                .get(name)
                .cloned()
                .ok_or_else(|| UnknownColumnError::new(name))
        }
    }

    fn traces(values: Value) -> Vec<TraceDefinition> {
        serde_json::from_value(values).unwrap()
    }

    fn time_value() -> FixedColumns {
        FixedColumns::new(&[("time", vec![1, 2, 3]), ("value", vec![10, 20, 30])])
    }

    #[test]
    fn test_resolves_source_references() {
        let mut data = traces(json!([{"x": [], "xsrc": "time", "y": [], "ysrc": "value"}]));

        resolve_traces(&mut data, &time_value()).unwrap();

        assert_eq!(
            data[0].to_value(),
            json!({"x": [1, 2, 3], "xsrc": "time", "y": [10, 20, 30], "ysrc": "value"})
        );
    }

    #[test]
    fn test_unknown_column_names_trace_and_field() {
        let mut data = traces(json!([
            {"x": [], "xsrc": "time"},
            {"type": "bar", "xsrc": "nope"}
        ]));

        let err = resolve_traces(&mut data, &time_value()).unwrap_err();

        assert_eq!(
            err,
            ResolveError::UnknownColumn {
                trace_index: 1,
                field: "x".into(),
                source_key: "xsrc".into(),
                column: "nope".into(),
            }
        );
        assert!(err.to_string().contains("nope"));
        // The first trace was still resolved
        assert_eq!(data[0].to_value(), json!({"x": [1, 2, 3], "xsrc": "time"}));
    }

    #[test]
    fn test_direct_fields_untouched() {
        let mut data = traces(json!([{"type": "scatter", "x": [7], "mode": "markers", "ysrc": "value"}]));

        resolve_traces(&mut data, &time_value()).unwrap();

        assert_eq!(
            data[0].to_value(),
            json!({"type": "scatter", "x": [7], "mode": "markers", "y": [10, 20, 30], "ysrc": "value"})
        );
    }

    #[test]
    fn test_resolved_length_matches_column() {
        let mut data = traces(json!([{"x": [0, 0, 0, 0, 0], "xsrc": "time"}]));

        resolve_traces(&mut data, &time_value()).unwrap();

        let x = data[0].field("x").and_then(TraceField::value).unwrap();
        assert_eq!(x.as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_collect_reports_every_failure() {
        let mut data = traces(json!([
            {"xsrc": "missing", "ysrc": "value"},
            {"xsrc": "time", "ysrc": "gone"}
        ]));

        let errors = resolve_traces_collect(&mut data, &time_value());

        assert_eq!(errors.len(), 2);
        assert_eq!(data[0].to_value(), json!({"xsrc": "missing", "y": [10, 20, 30], "ysrc": "value"}));
        assert_eq!(data[1].to_value(), json!({"x": [1, 2, 3], "xsrc": "time", "ysrc": "gone"}));

        // Remediate by detaching the broken references
        for ResolveError::UnknownColumn { trace_index, field, .. } in errors {
            data[trace_index].detach_source(&field);
        }
        assert!(resolve_traces_collect(&mut data, &time_value()).is_empty());
    }
}
