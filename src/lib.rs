//! `sheet-warehouse` turns a multi-sheet spreadsheet workbook into warehouse tables.
//!
//! Every sheet becomes one table: sheet names and column headers are normalized into safe
//! identifiers, column types are inferred from the data, and each table is fully replaced on
//! every run, so re-running the pipeline over the same workbook is idempotent.
//!
//! ## Pipeline
//!
//! ```text
//! workbook ─► extraction (one DataSet per sheet) ─► loading (schema + replace) ─► warehouse table
//! ```
//!
//! - [`naming`]: label → identifier normalization (`"Order ID"` → `order_id`)
//! - [`extraction`]: the [`extraction::Workbook`] trait, calamine-backed Excel workbooks
//!   (feature `excel`), and optional per-sheet CSV artifacts
//! - [`loading`]: [`loading::infer_schema`], coercion and [`loading::TableLoader`] with retries
//! - [`warehouse`]: the [`warehouse::Warehouse`] trait with in-memory and Parquet implementations
//! - [`pipeline`]: [`pipeline::Pipeline`], configuration and per-sheet observers
//! - [`cleanup`]: corrective rewrites of loaded tables (the `people` header artifact)
//! - [`analytics`]: the business query catalogue over `polars-sql` (feature `sql`)
//!
//! ## Quick example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use sheet_warehouse::extraction::workbook::text;
//! use sheet_warehouse::extraction::InMemoryWorkbook;
//! use sheet_warehouse::pipeline::{Pipeline, PipelineConfig};
//! use sheet_warehouse::types::{DataType, TableRef, Value};
//! use sheet_warehouse::warehouse::{MemoryWarehouse, Warehouse};
//!
//! # fn main() -> Result<(), sheet_warehouse::PipelineError> {
//! let mut workbook = InMemoryWorkbook::new().with_sheet(
//!     "Returns",
//!     vec![
//!         vec![text("Returned"), text("Order ID")],
//!         vec![text("Yes"), text("CA-2016-100762")],
//!         vec![text("Yes"), text("CA-2016-100867")],
//!     ],
//! );
//!
//! let warehouse = Arc::new(MemoryWarehouse::new());
//! let pipeline = Pipeline::new(PipelineConfig::new("superstore_sales"), warehouse.clone())?;
//! let report = pipeline.run(&mut workbook)?.into_result()?;
//! assert_eq!(report.total_rows_written(), 2);
//!
//! let table = warehouse.read_table(&TableRef::new("superstore_sales", "returns")).unwrap();
//! assert_eq!(table.schema.field_names().collect::<Vec<_>>(), ["returned", "order_id"]);
//! assert_eq!(table.schema.fields[0].data_type, DataType::Utf8);
//! assert_eq!(table.rows[0][1], Value::Utf8("CA-2016-100762".to_string()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Cargo features
//!
//! - `excel` (default): read `.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods` via `calamine`
//! - `sql` (default): [`analytics`] via `polars-sql`
//! - `excel_test_writer`: generate workbooks in integration tests via `rust_xlsxwriter`

#[cfg(feature = "sql")]
pub mod analytics;
pub mod cleanup;
pub mod error;
pub mod extraction;
pub mod loading;
pub mod naming;
pub mod pipeline;
pub mod types;
pub mod warehouse;

#[cfg(feature = "sql")]
pub use error::AnalyticsError;
pub use error::{
    CleanupError, ExtractionError, ExtractionResult, LoadError, LoadResult, PipelineError, PipelineResult,
    SheetError, WarehouseError, WarehouseResult,
};
