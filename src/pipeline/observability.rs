use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ExtractionError, LoadError, SheetError, WarehouseError};
use crate::types::TableRef;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Error-level event (the sheet failed; a rerun needs different input).
    Error,
    /// Infrastructure failure (I/O, permissions, warehouse unavailable).
    Critical,
}

/// Map a sheet failure to a severity.
///
/// Warehouse and I/O faults are `Critical`; data problems (unreadable sheet, schema conflict)
/// are `Error`.
pub fn severity_for_error(error: &SheetError) -> Severity {
    match error {
        SheetError::Extraction(ExtractionError::Io(_)) => Severity::Critical,
        SheetError::Extraction(_) => Severity::Error,
        SheetError::Load(LoadError::SchemaConflict { .. }) => Severity::Error,
        SheetError::Load(LoadError::ContainerCreateFailed { .. }) => Severity::Critical,
        SheetError::Load(LoadError::WriteFailed { source, .. }) => match source {
            WarehouseError::InvalidData(_) => Severity::Error,
            _ => Severity::Critical,
        },
    }
}

/// Which sheet an event is about.
#[derive(Debug, Clone)]
pub struct SheetContext {
    pub sheet_name: String,
    /// Destination table, when extraction got far enough to name one.
    pub table: Option<TableRef>,
}

/// Observer interface for per-sheet pipeline outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait PipelineObserver: Send + Sync {
    /// Called after a sheet's table was replaced.
    fn on_loaded(&self, _ctx: &SheetContext, _rows_written: usize) {}

    /// Called when a sheet fails extraction or loading.
    fn on_failure(&self, _ctx: &SheetContext, _severity: Severity, _error: &SheetError) {}

    /// Called when a failure meets the configured alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &SheetContext, severity: Severity, error: &SheetError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }

    pub fn push(&mut self, observer: Arc<dyn PipelineObserver>) {
        self.observers.push(observer);
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_loaded(&self, ctx: &SheetContext, rows_written: usize) {
        for o in &self.observers {
            o.on_loaded(ctx, rows_written);
        }
    }

    fn on_failure(&self, ctx: &SheetContext, severity: Severity, error: &SheetError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &SheetContext, severity: Severity, error: &SheetError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

fn destination(ctx: &SheetContext) -> String {
    ctx.table
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string)
}

/// Reports pipeline events through the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn on_loaded(&self, ctx: &SheetContext, rows_written: usize) {
        info!(
            "[sheet][ok] sheet={} table={} rows={rows_written}",
            ctx.sheet_name,
            destination(ctx)
        );
    }

    fn on_failure(&self, ctx: &SheetContext, severity: Severity, error: &SheetError) {
        warn!(
            "[sheet][{severity:?}] sheet={} table={} err={error}",
            ctx.sheet_name,
            destination(ctx)
        );
    }

    fn on_alert(&self, ctx: &SheetContext, severity: Severity, error: &SheetError) {
        error!(
            "[ALERT][sheet][{severity:?}] sheet={} table={} err={error}",
            ctx.sheet_name,
            destination(ctx)
        );
    }
}

/// Appends pipeline events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_loaded(&self, ctx: &SheetContext, rows_written: usize) {
        self.append_line(&format!(
            "{} ok sheet={} table={} rows={rows_written}",
            unix_ts(),
            ctx.sheet_name,
            destination(ctx)
        ));
    }

    fn on_failure(&self, ctx: &SheetContext, severity: Severity, error: &SheetError) {
        self.append_line(&format!(
            "{} fail severity={severity:?} sheet={} table={} err={error}",
            unix_ts(),
            ctx.sheet_name,
            destination(ctx)
        ));
    }

    fn on_alert(&self, ctx: &SheetContext, severity: Severity, error: &SheetError) {
        self.append_line(&format!(
            "{} ALERT severity={severity:?} sheet={} table={} err={error}",
            unix_ts(),
            ctx.sheet_name,
            destination(ctx)
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
