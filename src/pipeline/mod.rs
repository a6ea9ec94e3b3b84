//! Pipeline orchestration: every sheet of a workbook → one warehouse table.
//!
//! [`Pipeline::run`] extracts sheets in workbook order, then loads the extracted datasets on a
//! bounded `rayon` pool. Each sheet moves through [`SheetState`]:
//!
//! ```text
//! Pending ─► Extracted ─► Loaded
//!    │           └──────► Failed
//!    └──────────────────► Failed
//! ```
//!
//! A failing sheet never stops the others. The run returns a [`PipelineReport`] describing every
//! sheet; whether a partial failure is fatal is up to the caller
//! ([`PipelineReport::into_result`]). Only workbook-level problems (no sheets) end a run early.

pub mod config;
pub mod observability;

use std::collections::HashSet;
use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;

use crate::error::{ExtractionError, PipelineError, PipelineResult, SheetError};
use crate::extraction::{artifact, extract_sheet, plan_table_names, Workbook};
use crate::loading::TableLoader;
use crate::naming::normalize;
use crate::types::{DataSet, Schema, TableRef};
use crate::warehouse::Warehouse;

pub use config::PipelineConfig;
pub use observability::{
    severity_for_error, CompositeObserver, FileObserver, LogObserver, PipelineObserver, Severity, SheetContext,
};

/// Where a sheet ended up in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SheetState {
    Pending,
    /// Extracted but not (yet) loaded. Final for sheets without columns: nothing to load.
    Extracted,
    Loaded,
    Failed,
}

/// Outcome for one source sheet.
#[derive(Debug)]
pub struct SheetRunResult {
    pub sheet_name: String,
    pub table: TableRef,
    pub state: SheetState,
    /// Data rows extracted from the sheet (header excluded).
    pub rows_extracted: usize,
    pub rows_written: usize,
    /// Schema the table was written with.
    pub schema: Option<Schema>,
    pub error: Option<SheetError>,
}

impl SheetRunResult {
    fn pending(sheet_name: String, table: TableRef) -> Self {
        Self {
            sheet_name,
            table,
            state: SheetState::Pending,
            rows_extracted: 0,
            rows_written: 0,
            schema: None,
            error: None,
        }
    }

    fn fail(&mut self, error: SheetError) {
        self.state = SheetState::Failed;
        self.error = Some(error);
    }

    pub fn is_loaded(&self) -> bool {
        self.state == SheetState::Loaded
    }

    pub fn is_failed(&self) -> bool {
        self.state == SheetState::Failed
    }
}

/// Per-sheet results of one run, in workbook order.
#[derive(Debug)]
pub struct PipelineReport {
    pub container: String,
    pub sheets: Vec<SheetRunResult>,
}

impl PipelineReport {
    pub fn get(&self, sheet_name: &str) -> Option<&SheetRunResult> {
        self.sheets.iter().find(|s| s.sheet_name == sheet_name)
    }

    pub fn loaded(&self) -> impl Iterator<Item = &SheetRunResult> {
        self.sheets.iter().filter(|s| s.is_loaded())
    }

    pub fn failed(&self) -> impl Iterator<Item = &SheetRunResult> {
        self.sheets.iter().filter(|s| s.is_failed())
    }

    /// Names of the sheets that failed, ready to pass to [`Pipeline::run_sheets`].
    pub fn failed_sheets(&self) -> Vec<String> {
        self.failed().map(|s| s.sheet_name.clone()).collect()
    }

    pub fn total_rows_written(&self) -> usize {
        self.sheets.iter().map(|s| s.rows_written).sum()
    }

    pub fn is_success(&self) -> bool {
        self.sheets.iter().all(|s| !s.is_failed())
    }

    /// Treat any failed sheet as a failed run.
    pub fn into_result(self) -> PipelineResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let sheets = self.failed_sheets();
        Err(PipelineError::PartialFailure {
            failed: sheets.len(),
            total: self.sheets.len(),
            sheets,
        })
    }

    /// Serializable view of the report.
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            container: self.container.clone(),
            loaded: self.loaded().count(),
            failed: self.failed().count(),
            rows_written: self.total_rows_written(),
            sheets: self
                .sheets
                .iter()
                .map(|s| SheetSummary {
                    sheet: s.sheet_name.clone(),
                    table: s.table.to_string(),
                    state: s.state,
                    rows_extracted: s.rows_extracted,
                    rows_written: s.rows_written,
                    schema: s.schema.clone(),
                    error: s.error.as_ref().map(ToString::to_string),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.summary())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub container: String,
    pub loaded: usize,
    pub failed: usize,
    pub rows_written: usize,
    pub sheets: Vec<SheetSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub sheet: String,
    pub table: String,
    pub state: SheetState,
    pub rows_extracted: usize,
    pub rows_written: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Extract-and-load orchestrator bound to one warehouse and one configuration.
pub struct Pipeline {
    config: PipelineConfig,
    loader: TableLoader,
    pool: ThreadPool,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("loader", &self.loader)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl Pipeline {
    /// Validate `config` and build the load pool.
    pub fn new(config: PipelineConfig, warehouse: Arc<dyn Warehouse>) -> PipelineResult<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.parallelism)
            .thread_name(|i| format!("sheet-load-{i}"))
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build load pool: {e}")))?;
        let loader = TableLoader::new(warehouse)
            .with_region(config.region.clone())
            .with_retry(config.retry.clone())
            .with_timeout(config.load_timeout);
        Ok(Self {
            config,
            loader,
            pool,
            observer: None,
        })
    }

    /// Attach an observer for per-sheet outcomes.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn loader(&self) -> &TableLoader {
        &self.loader
    }

    /// Extract and load every sheet of `workbook`.
    pub fn run<W: Workbook + ?Sized>(&self, workbook: &mut W) -> PipelineResult<PipelineReport> {
        self.run_selected(workbook, None)
    }

    /// Extract and load only the named sheets (e.g. the failed ones of an earlier run).
    ///
    /// Table names are planned over the whole workbook, so a sheet always maps to the same
    /// table whether it runs alone or with the others. Names not present in the workbook are
    /// reported as failed sheets.
    pub fn run_sheets<W, S>(&self, workbook: &mut W, sheets: &[S]) -> PipelineResult<PipelineReport>
    where
        W: Workbook + ?Sized,
        S: AsRef<str>,
    {
        let wanted: Vec<&str> = sheets.iter().map(AsRef::as_ref).collect();
        self.run_selected(workbook, Some(&wanted))
    }

    fn run_selected<W: Workbook + ?Sized>(
        &self,
        workbook: &mut W,
        only: Option<&[&str]>,
    ) -> PipelineResult<PipelineReport> {
        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            return Err(PipelineError::Extraction(ExtractionError::EmptyWorkbook));
        }
        let table_names = plan_table_names(&sheet_names);
        let container = &self.config.container_id;

        let mut results: Vec<SheetRunResult> = Vec::new();
        let mut datasets: Vec<Option<DataSet>> = Vec::new();

        for (sheet_name, table_name) in sheet_names.iter().zip(&table_names) {
            if only.is_some_and(|o| !o.contains(&sheet_name.as_str())) {
                continue;
            }
            let mut result = SheetRunResult::pending(sheet_name.clone(), TableRef::new(container, table_name));
            let dataset = match extract_sheet(workbook, sheet_name) {
                Ok(ds) => {
                    result.state = SheetState::Extracted;
                    result.rows_extracted = ds.row_count();
                    self.write_artifact(table_name, &ds);
                    Some(ds)
                }
                Err(e) => {
                    result.fail(e.into());
                    None
                }
            };
            results.push(result);
            datasets.push(dataset);
        }

        if let Some(only) = only {
            let known: HashSet<&str> = sheet_names.iter().map(String::as_str).collect();
            for missing in only.iter().filter(|name| !known.contains(*name)) {
                let mut result =
                    SheetRunResult::pending(missing.to_string(), TableRef::new(container, normalize(*missing)));
                result.fail(SheetError::Extraction(ExtractionError::UnreadableSheet {
                    sheet: missing.to_string(),
                    message: "no such sheet in workbook".to_string(),
                }));
                results.push(result);
                datasets.push(None);
            }
        }

        let mut jobs: Vec<(usize, &DataSet, TableRef)> = Vec::new();
        for (idx, dataset) in datasets.iter().enumerate() {
            let Some(ds) = dataset else { continue };
            if ds.column_count() == 0 {
                info!("sheet '{}' has no columns; nothing to load", results[idx].sheet_name);
                continue;
            }
            jobs.push((idx, ds, results[idx].table.clone()));
        }

        let outcomes: Vec<_> = self.pool.install(|| {
            jobs.par_iter()
                .map(|(idx, ds, table)| (*idx, self.loader.load(ds, table)))
                .collect()
        });

        for (idx, outcome) in outcomes {
            let result = &mut results[idx];
            match outcome {
                Ok(outcome) => {
                    result.state = SheetState::Loaded;
                    result.rows_written = outcome.rows_written;
                    result.schema = Some(outcome.schema);
                }
                Err(e) => result.fail(e.into()),
            }
        }

        for result in &results {
            self.notify(result);
        }

        let report = PipelineReport {
            container: container.clone(),
            sheets: results,
        };
        info!(
            "pipeline finished: {} loaded, {} failed, {} row(s) written to {}",
            report.loaded().count(),
            report.failed().count(),
            report.total_rows_written(),
            report.container
        );
        Ok(report)
    }

    fn write_artifact(&self, table_name: &str, dataset: &DataSet) {
        let Some(dir) = &self.config.artifact_dir else {
            return;
        };
        if dataset.column_count() == 0 {
            return;
        }
        if let Err(e) = artifact::write_csv_artifact(dir, table_name, dataset) {
            warn!("failed to write CSV artifact for '{table_name}' in {}: {e}", dir.display());
        }
    }

    fn notify(&self, result: &SheetRunResult) {
        let Some(observer) = &self.observer else {
            return;
        };
        let ctx = SheetContext {
            sheet_name: result.sheet_name.clone(),
            table: Some(result.table.clone()),
        };
        match (&result.state, &result.error) {
            (SheetState::Loaded, _) => observer.on_loaded(&ctx, result.rows_written),
            (SheetState::Failed, Some(error)) => {
                let severity = severity_for_error(error);
                if severity >= self.config.alert_at_or_above {
                    observer.on_alert(&ctx, severity, error);
                } else {
                    observer.on_failure(&ctx, severity, error);
                }
            }
            _ => {}
        }
    }
}
