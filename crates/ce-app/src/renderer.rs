//! Plotting library location
//!
//! The host never loads or runs the plotting library itself. It resolves
//! where the bundle lives, once per process, and hands that location to the
//! viewer alongside the plot payload; the viewer does the loading.

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::info;

/// Environment variable overriding the plotting library bundle
pub const BUNDLE_ENV: &str = "CHART_EDITOR_PLOTLY_BUNDLE";

const DEFAULT_BUNDLE: &str = "plotly.min.js";

/// Resolved location of the plotting library bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotLibrary {
    /// Path or URL of the bundle, as given; not checked for existence
    pub bundle: String,
}

impl PlotLibrary {
    /// Bundle named by [`BUNDLE_ENV`], or the default file name
    fn from_env() -> Result<Self> {
        let bundle = env::var(BUNDLE_ENV).unwrap_or_else(|_| DEFAULT_BUNDLE.to_string());
        if bundle.trim().is_empty() {
            anyhow::bail!("{} is set but empty", BUNDLE_ENV);
        }
        Ok(Self { bundle })
    }
}

/// One-shot guard around resolving the bundle location
pub struct LibraryGuard {
    cell: OnceCell<PlotLibrary>,
    loads: AtomicUsize,
}

impl LibraryGuard {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Run `load` unless a previous call already succeeded. A failed attempt
    /// is not cached; the next call tries again.
    pub fn get_or_load<F>(&self, load: F) -> Result<&PlotLibrary>
    where
        F: FnOnce() -> Result<PlotLibrary>,
    {
        self.cell.get_or_try_init(|| {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let library = load()?;
            info!(bundle = %library.bundle, "plotting library resolved");
            Ok(library)
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Resolution attempts made so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Default for LibraryGuard {
    fn default() -> Self {
        Self::new()
    }
}

static PLOT_LIBRARY: LibraryGuard = LibraryGuard::new();

/// The process-wide plotting library location
pub fn plot_library() -> Result<&'static PlotLibrary> {
    PLOT_LIBRARY.get_or_load(PlotLibrary::from_env)
}
