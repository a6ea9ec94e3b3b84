//! Table loading: [`DataSet`] → warehouse table with full-replace semantics.
//!
//! [`TableLoader::load`] performs three steps against a [`Warehouse`]:
//!
//! 1. ensure the destination container exists (created with the configured region if absent)
//! 2. resolve the schema: the caller's explicit schema, or [`infer_schema`] over every row
//! 3. conform every row to that schema, then replace the table in one warehouse call
//!
//! Rows are conformed before the warehouse is touched, so a [`LoadError::SchemaConflict`]
//! never leaves a half-written table behind. Transient warehouse failures are retried per
//! [`RetryPolicy`]; schema conflicts never are.

mod coerce;
pub mod infer;
pub mod retry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::Serialize;

use crate::error::{LoadError, LoadResult, WarehouseError};
use crate::types::{DataSet, Schema, TableRef};
use crate::warehouse::{ContainerStatus, Warehouse, DEFAULT_REGION};

pub use infer::infer_schema;
pub use retry::RetryPolicy;

/// Result of one successful load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadOutcome {
    pub table: TableRef,
    pub rows_written: usize,
    pub schema: Schema,
}

/// Loads datasets into a [`Warehouse`] with idempotent replace semantics.
#[derive(Clone)]
pub struct TableLoader {
    warehouse: Arc<dyn Warehouse>,
    region: String,
    retry: RetryPolicy,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for TableLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableLoader")
            .field("region", &self.region)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TableLoader {
    /// A loader using the default region, default retry policy and no deadline.
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            warehouse,
            region: DEFAULT_REGION.to_string(),
            retry: RetryPolicy::default(),
            timeout: None,
        }
    }

    /// Region used when the destination container has to be created.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overall deadline for one load, including retries.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    /// Replace `destination` with `dataset`, inferring the schema from the data.
    pub fn load(&self, dataset: &DataSet, destination: &TableRef) -> LoadResult<LoadOutcome> {
        self.load_with_schema(dataset, destination, None)
    }

    /// Replace `destination` with `dataset`, using `schema` when given.
    pub fn load_with_schema(
        &self,
        dataset: &DataSet,
        destination: &TableRef,
        schema: Option<&Schema>,
    ) -> LoadResult<LoadOutcome> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let label = destination.to_string();

        let status = self
            .retry
            .run(
                &label,
                deadline,
                |_| {
                    self.warehouse
                        .create_container_if_absent(&destination.container, &self.region)
                },
                WarehouseError::is_transient,
            )
            .map_err(|e| LoadError::ContainerCreateFailed {
                table: destination.clone(),
                source: e.error,
            })?;
        if status == ContainerStatus::Created {
            info!(
                "created container '{}' in region {}",
                destination.container, self.region
            );
        }

        let schema = match schema {
            Some(explicit) => explicit.clone(),
            None => infer_schema(dataset),
        };
        debug!(
            "{destination}: schema {}",
            schema
                .fields
                .iter()
                .map(|f| format!("{}:{}{}", f.name, f.data_type, if f.nullable { "?" } else { "" }))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let rows = coerce::conform_rows(dataset, &schema).map_err(|message| LoadError::SchemaConflict {
            table: destination.clone(),
            message,
        })?;

        let rows_written = self
            .retry
            .run(
                &label,
                deadline,
                |_| self.warehouse.replace_table(destination, &schema, &rows),
                WarehouseError::is_transient,
            )
            .map_err(|e| LoadError::WriteFailed {
                table: destination.clone(),
                attempts: e.attempts,
                transient: e.error.is_transient(),
                source: e.error,
            })?;

        info!("loaded {rows_written} row(s) into {destination}");
        Ok(LoadOutcome {
            table: destination.clone(),
            rows_written,
            schema,
        })
    }
}
