//! Column source registry
//!
//! The registry is what the chart editor sees as its data sources: the
//! header, the column picker options and the values of any column. Small
//! tables are split into columns up front. Large delimited tables stay in row
//! form and a column is only materialized the first time a trace asks for it.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use ce_core::{ColumnOption, ColumnProvider, Scalar, UnknownColumnError};

use crate::columns::ColumnSource;
use crate::config::{LoadConfig, ParseMode, TableBacking};
use crate::model::{ArrowRowModel, RowModel};
use crate::normalize::normalize_rows;
use crate::raw::RawTable;
use crate::DataError;

/// Column data served to trace resolution
pub struct ColumnRegistry {
    header: Vec<String>,
    /// Header position by name
    index: AHashMap<String, usize>,
    backing: Backing,
}

enum Backing {
    /// Columns split up front, by header position
    Eager(Vec<Arc<Vec<Scalar>>>),
    /// Columns pulled from a row model on first use
    Lazy {
        model: Box<dyn RowModel>,
        cache: Mutex<MaterializationCache>,
    },
}

/// Materialized columns of a lazy registry, never shared between registries
#[derive(Default)]
struct MaterializationCache {
    columns: AHashMap<usize, Arc<Vec<Scalar>>>,
    /// Full row scans performed so far
    scans: usize,
}

impl ColumnRegistry {
    /// Serve an already column-oriented source
    pub fn eager(source: ColumnSource) -> Self {
        let mut header = Vec::with_capacity(source.column_count());
        let mut columns = Vec::with_capacity(source.column_count());
        for (name, values) in source.into_columns() {
            header.push(name);
            columns.push(Arc::new(values));
        }

        Self {
            index: build_index(&header),
            header,
            backing: Backing::Eager(columns),
        }
    }

    /// Serve columns from a row model, materializing each on first request
    pub fn lazy(model: impl RowModel + 'static) -> Self {
        Self::lazy_boxed(Box::new(model))
    }

    pub fn lazy_boxed(model: Box<dyn RowModel>) -> Self {
        let header = model.header().to_vec();
        Self {
            index: build_index(&header),
            header,
            backing: Backing::Lazy {
                model,
                cache: Mutex::new(MaterializationCache::default()),
            },
        }
    }

    /// Build a registry from raw content.
    ///
    /// Delimited tables with more than `lazy_row_threshold` rows are kept in
    /// row form; everything else is normalized into columns.
    pub fn from_raw(raw: RawTable, config: &LoadConfig) -> Result<Self, DataError> {
        let registry = match raw {
            RawTable::Delimited { text, delimiter } => match config.backing {
                TableBacking::Rows => {
                    let table = RawTable::parse_delimited(&text, delimiter, config)?;
                    if table.rows().len() > config.lazy_row_threshold {
                        Self::lazy(table)
                    } else {
                        Self::eager(normalize_rows(&table.to_records(), config.alignment))
                    }
                }
                TableBacking::Arrow => {
                    if matches!(config.parse.mode, ParseMode::Explicit { .. }) {
                        return Err(DataError::format("explicit parse mode needs the rows backing"));
                    }
                    let delimiter = RawTable::resolve_delimiter(&text, delimiter, config)?;
                    let model = ArrowRowModel::from_csv(&text, delimiter, &config.parse.null_config)?;
                    if model.row_count() > config.lazy_row_threshold {
                        Self::lazy(model)
                    } else {
                        Self::eager(split_columns(&model))
                    }
                }
            },
            other => Self::eager(other.into_column_source(config)?),
        };

        info!(
            columns = registry.header.len(),
            rows = registry.row_count(),
            lazy = registry.is_lazy(),
            "column registry ready"
        );
        Ok(registry)
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.backing, Backing::Lazy { .. })
    }

    /// Number of rows, or the longest column for ragged eager sources
    pub fn row_count(&self) -> usize {
        match &self.backing {
            Backing::Eager(columns) => columns.iter().map(|c| c.len()).max().unwrap_or(0),
            Backing::Lazy { model, .. } => model.row_count(),
        }
    }

    /// Whether a column's values are available without a scan
    pub fn is_materialized(&self, name: &str) -> bool {
        let Some(&idx) = self.index.get(name) else {
            return false;
        };
        match &self.backing {
            Backing::Eager(_) => true,
            Backing::Lazy { cache, .. } => cache.lock().columns.contains_key(&idx),
        }
    }

    /// Row scans performed by lazy materialization so far
    pub fn scan_count(&self) -> usize {
        match &self.backing {
            Backing::Eager(_) => 0,
            Backing::Lazy { cache, .. } => cache.lock().scans,
        }
    }

    /// Data sources as handed to the chart editor. In lazy mode columns that
    /// were never requested are present but empty.
    pub fn data_sources(&self) -> IndexMap<String, Arc<Vec<Scalar>>> {
        match &self.backing {
            Backing::Eager(columns) => self.header.iter().cloned().zip(columns.iter().cloned()).collect(),
            Backing::Lazy { cache, .. } => {
                let cache = cache.lock();
                self.header
                    .iter()
                    .enumerate()
                    .map(|(idx, name)| {
                        let values = cache.columns.get(&idx).cloned().unwrap_or_default();
                        (name.clone(), values)
                    })
                    .collect()
            }
        }
    }

    /// Full column-oriented copy of the table, materializing every column
    pub fn to_column_source(&self) -> ColumnSource {
        self.header
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), self.column_at(idx).as_ref().clone()))
            .collect()
    }

    fn column_at(&self, idx: usize) -> Arc<Vec<Scalar>> {
        match &self.backing {
            Backing::Eager(columns) => Arc::clone(&columns[idx]),
            Backing::Lazy { model, cache } => {
                let mut cache = cache.lock();
                if let Some(values) = cache.columns.get(&idx) {
                    return Arc::clone(values);
                }

                let values: Arc<Vec<Scalar>> = Arc::new((0..model.row_count()).map(|row| model.cell(row, idx)).collect());
                cache.scans += 1;
                cache.columns.insert(idx, Arc::clone(&values));
                debug!(column = %self.header[idx], rows = values.len(), "materialized column");
                values
            }
        }
    }
}

impl ColumnProvider for ColumnRegistry {
    fn header(&self) -> &[String] {
        &self.header
    }

    fn column(&self, name: &str) -> Result<Arc<Vec<Scalar>>, UnknownColumnError> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| UnknownColumnError::new(name))?;
        Ok(self.column_at(idx))
    }

    fn options(&self) -> Vec<ColumnOption> {
        self.header.iter().map(|name| ColumnOption::for_column(name)).collect()
    }
}

impl fmt::Debug for ColumnRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnRegistry")
            .field("header", &self.header)
            .field("lazy", &self.is_lazy())
            .field("rows", &self.row_count())
            .finish()
    }
}

/// Copy every column out of a row model
fn split_columns(model: &dyn RowModel) -> ColumnSource {
    model
        .header()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values: Vec<Scalar> = (0..model.row_count()).map(|row| model.cell(row, idx)).collect();
            (name.clone(), values)
        })
        .collect()
}

/// First occurrence wins for duplicate names
fn build_index(header: &[String]) -> AHashMap<String, usize> {
    let mut index = AHashMap::with_capacity(header.len());
    for (idx, name) in header.iter().enumerate() {
        index.entry(name.clone()).or_insert(idx);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::config::{FieldType, ParseOptions};
    use crate::model::RowTable;

    /// Row model that counts cell reads
    struct CountingModel {
        table: RowTable,
        reads: Arc<AtomicUsize>,
    }

    impl RowModel for CountingModel {
        fn header(&self) -> &[String] {
            self.table.header()
        }

        fn row_count(&self) -> usize {
            self.table.row_count()
        }

        fn cell(&self, row: usize, column: usize) -> Scalar {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.table.cell(row, column)
        }
    }

    fn table() -> RowTable {
        let rows = (0..4)
            .map(|i| vec![Scalar::Int(i), Scalar::Int(i * 10), Scalar::Text(format!("r{}", i))])
            .collect();
        RowTable::new(vec!["time".into(), "value".into(), "label".into()], rows).unwrap()
    }

    #[test]
    fn test_lazy_materialization_is_cached() {
        let reads = Arc::new(AtomicUsize::new(0));
        let registry = ColumnRegistry::lazy(CountingModel {
            table: table(),
            reads: reads.clone(),
        });

        assert!(registry.is_lazy());
        assert!(!registry.is_materialized("value"));

        let first = registry.column("value").unwrap();
        assert_eq!(registry.scan_count(), 1);
        assert_eq!(reads.load(Ordering::SeqCst), 4);

        let second = registry.column("value").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.scan_count(), 1);
        assert_eq!(reads.load(Ordering::SeqCst), 4);
        assert!(registry.is_materialized("value"));
        assert!(!registry.is_materialized("time"));
    }

    #[test]
    fn test_lazy_matches_eager() {
        let lazy = ColumnRegistry::lazy(table());
        let eager = ColumnRegistry::eager(normalize_rows(&table().to_records(), Default::default()));

        for name in ["time", "value", "label"] {
            assert_eq!(lazy.column(name).unwrap(), eager.column(name).unwrap());
        }
        assert_eq!(lazy.to_column_source(), eager.to_column_source());
    }

    #[test]
    fn test_unmaterialized_data_sources_are_empty() {
        let registry = ColumnRegistry::lazy(table());
        registry.column("time").unwrap();

        let sources = registry.data_sources();
        assert_eq!(sources.keys().collect::<Vec<_>>(), vec!["time", "value", "label"]);
        assert_eq!(sources["time"].len(), 4);
        assert!(sources["value"].is_empty());
    }

    #[test]
    fn test_unknown_column() {
        let registry = ColumnRegistry::lazy(table());

        let err = registry.column("nope").unwrap_err();
        assert_eq!(err, UnknownColumnError::new("nope"));
        assert_eq!(registry.scan_count(), 0);
    }

    #[test]
    fn test_options_align_with_header() {
        let registry = ColumnRegistry::eager(ColumnSource::from_json_object(
            json!({"b": [1], "a": [2], "c": [3]}).as_object().unwrap(),
        ).unwrap());

        let options = registry.options();
        assert_eq!(options.len(), registry.header().len());
        for (option, name) in options.iter().zip(registry.header()) {
            assert_eq!(&option.value, name);
            assert_eq!(&option.label, name);
        }
    }

    #[test]
    fn test_from_raw_picks_backing() {
        let text = "x,y\n1,2\n3,4\n5,6\n".to_string();

        let eager = ColumnRegistry::from_raw(RawTable::delimited(text.clone()), &LoadConfig::default()).unwrap();
        assert!(!eager.is_lazy());

        let config = LoadConfig {
            lazy_row_threshold: 2,
            ..LoadConfig::default()
        };
        let lazy = ColumnRegistry::from_raw(RawTable::delimited(text), &config).unwrap();
        assert!(lazy.is_lazy());
        assert_eq!(lazy.row_count(), 3);
        assert_eq!(*lazy.column("y").unwrap(), vec![Scalar::Int(2), Scalar::Int(4), Scalar::Int(6)]);
    }

    #[test]
    fn test_arrow_backing() {
        let text = "x\ty\n1\t0.5\n2\t1.5\n3\t2.5\n".to_string();
        let config = LoadConfig {
            backing: TableBacking::Arrow,
            ..LoadConfig::default()
        };

        let eager = ColumnRegistry::from_raw(RawTable::delimited(text.clone()), &config).unwrap();
        assert!(!eager.is_lazy());
        assert_eq!(*eager.column("x").unwrap(), vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)]);

        let lazy_config = LoadConfig {
            lazy_row_threshold: 1,
            ..config
        };
        let lazy = ColumnRegistry::from_raw(RawTable::delimited(text), &lazy_config).unwrap();
        assert!(lazy.is_lazy());
        assert_eq!(lazy.to_column_source(), eager.to_column_source());
    }

    #[test]
    fn test_arrow_backing_matches_rows_on_malformed_text() {
        let text = "a,a,b\n1,2,NA\n3\n4,5,6,7\n".to_string();
        let rows = ColumnRegistry::from_raw(RawTable::delimited(text.clone()), &LoadConfig::default()).unwrap();

        for lazy_row_threshold in [100, 1] {
            let config = LoadConfig {
                backing: TableBacking::Arrow,
                lazy_row_threshold,
                ..LoadConfig::default()
            };
            let arrow = ColumnRegistry::from_raw(RawTable::delimited(text.clone()), &config).unwrap();

            assert_eq!(arrow.header(), &["a", "a.1", "b"].map(String::from));
            assert_eq!(arrow.row_count(), 3);
            assert_eq!(*arrow.column("a.1").unwrap(), vec![Scalar::Int(2), Scalar::Absent, Scalar::Int(5)]);
            assert_eq!(*arrow.column("b").unwrap(), vec![Scalar::Absent, Scalar::Absent, Scalar::Int(6)]);
            assert_eq!(arrow.to_column_source(), rows.to_column_source());
        }
    }

    #[test]
    fn test_arrow_backing_uses_null_config() {
        let text = "v,w\n1,a\n-,b\n3,-\n".to_string();
        let mut config = LoadConfig {
            backing: TableBacking::Arrow,
            ..LoadConfig::default()
        };
        config.parse.null_config.add_pattern("-".to_string());

        let registry = ColumnRegistry::from_raw(RawTable::delimited(text), &config).unwrap();
        assert_eq!(*registry.column("v").unwrap(), vec![Scalar::Int(1), Scalar::Absent, Scalar::Int(3)]);
        assert_eq!(registry.column("w").unwrap()[2], Scalar::Absent);
    }

    #[test]
    fn test_arrow_backing_rejects_explicit_mode() {
        let config = LoadConfig {
            backing: TableBacking::Arrow,
            parse: ParseOptions::explicit([("x", FieldType::Number)]),
            ..LoadConfig::default()
        };

        let err = ColumnRegistry::from_raw(RawTable::delimited("x,y\n1,2\n"), &config).unwrap_err();
        assert!(matches!(err, DataError::Format(_)));
    }

    #[test]
    fn test_from_raw_rejects_unsniffable_text() {
        let err = ColumnRegistry::from_raw(RawTable::delimited("abc\n1\n"), &LoadConfig::default()).unwrap_err();
        assert!(matches!(err, DataError::Format(_)));
    }
}
