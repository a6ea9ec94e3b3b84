//! Local column-store warehouse backed by Parquet files.
//!
//! Layout under the warehouse root:
//!
//! ```text
//! <root>/<container>/_container.json   container metadata (name, region)
//! <root>/<container>/<table>.parquet   one file per table
//! ```
//!
//! A replace writes `.<table>.parquet.tmp`, checks the row count recorded in the Parquet footer,
//! then renames it over the live file. The rename is the commit point: readers see either the old
//! or the new file.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::parquet::file::reader::FileReader;
use ::parquet::file::serialized_reader::SerializedFileReader;
use log::debug;
use polars::prelude::{DataFrame, ParquetReader, ParquetWriter, SerReader};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{WarehouseError, WarehouseResult};
use crate::types::{Schema, TableRef, Value, WarehouseTable};

use super::frame::{from_frame, to_frame};
use super::{is_valid_identifier, validate_rows, ContainerStatus, Warehouse};

const CONTAINER_METADATA: &str = "_container.json";
const TABLE_EXTENSION: &str = "parquet";

#[derive(Debug, Serialize, Deserialize)]
struct ContainerMetadata {
    name: String,
    region: String,
}

/// A [`Warehouse`] storing each table as a Parquet file on the local filesystem.
#[derive(Debug)]
pub struct ParquetWarehouse {
    root: PathBuf,
    // Serializes container creation.
    containers: Mutex<()>,
    // One writer per table.
    table_locks: Mutex<HashMap<TableRef, Arc<Mutex<()>>>>,
}

impl ParquetWarehouse {
    /// Open (or start) a warehouse rooted at `root`. The directory is created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            containers: Mutex::new(()),
            table_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the Parquet file backing `table`.
    pub fn table_path(&self, table: &TableRef) -> PathBuf {
        self.container_dir(&table.container)
            .join(format!("{}.{TABLE_EXTENSION}", table.table))
    }

    fn container_dir(&self, container: &str) -> PathBuf {
        self.root.join(container)
    }

    fn check_identifier(name: &str) -> WarehouseResult<()> {
        if is_valid_identifier(name) {
            Ok(())
        } else {
            Err(WarehouseError::InvalidData(format!(
                "'{name}' is not a valid identifier (expected [A-Za-z0-9_]+)"
            )))
        }
    }

    fn read_metadata(&self, container: &str) -> WarehouseResult<Option<ContainerMetadata>> {
        let path = self.container_dir(container).join(CONTAINER_METADATA);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn require_container(&self, container: &str) -> WarehouseResult<()> {
        Self::check_identifier(container)?;
        match self.read_metadata(container)? {
            Some(_) => Ok(()),
            None => Err(WarehouseError::ContainerNotFound(container.to_string())),
        }
    }

    fn table_lock(&self, table: &TableRef) -> WarehouseResult<Arc<Mutex<()>>> {
        let mut locks = self.table_locks.lock().map_err(|_| WarehouseError::Poisoned)?;
        Ok(locks.entry(table.clone()).or_default().clone())
    }
}

impl Warehouse for ParquetWarehouse {
    fn create_container_if_absent(&self, name: &str, region: &str) -> WarehouseResult<ContainerStatus> {
        Self::check_identifier(name)?;
        let _guard = self.containers.lock().map_err(|_| WarehouseError::Poisoned)?;
        if self.read_metadata(name)?.is_some() {
            return Ok(ContainerStatus::Existing);
        }

        let dir = self.container_dir(name);
        fs::create_dir_all(&dir)?;
        let metadata = ContainerMetadata {
            name: name.to_string(),
            region: region.to_string(),
        };
        let tmp = dir.join(format!(".{CONTAINER_METADATA}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(&metadata)?)?;
        fs::rename(&tmp, dir.join(CONTAINER_METADATA))?;
        debug!("created container directory {}", dir.display());
        Ok(ContainerStatus::Created)
    }

    fn replace_table(&self, table: &TableRef, schema: &Schema, rows: &[Vec<Value>]) -> WarehouseResult<usize> {
        Self::check_identifier(&table.table)?;
        self.require_container(&table.container)?;
        validate_rows(schema, rows)?;

        let lock = self.table_lock(table)?;
        let _guard = lock.lock().map_err(|_| WarehouseError::Poisoned)?;

        let mut df = to_frame(schema, rows)?;
        let live = self.table_path(table);
        let tmp = self
            .container_dir(&table.container)
            .join(format!(".{}.{TABLE_EXTENSION}.tmp", table.table));

        let written = match write_parquet(&tmp, &mut df) {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        };
        if usize::try_from(written).ok() != Some(rows.len()) {
            let _ = fs::remove_file(&tmp);
            return Err(WarehouseError::InvalidData(format!(
                "{table}: wrote {written} row(s), expected {}",
                rows.len()
            )));
        }

        fs::rename(&tmp, &live)?;
        debug!("{table}: committed {} row(s) to {}", rows.len(), live.display());
        Ok(rows.len())
    }

    fn read_table(&self, table: &TableRef) -> WarehouseResult<WarehouseTable> {
        Self::check_identifier(&table.table)?;
        self.require_container(&table.container)?;
        let path = self.table_path(table);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WarehouseError::TableNotFound(table.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let df = ParquetReader::new(file).finish()?;
        let (schema, rows) = from_frame(&df)?;
        Ok(WarehouseTable {
            table: table.clone(),
            schema,
            rows,
        })
    }

    fn list_tables(&self, container: &str) -> WarehouseResult<Vec<String>> {
        self.require_container(container)?;
        let mut tables = Vec::new();
        for entry in WalkDir::new(self.container_dir(container))
            .min_depth(1)
            .max_depth(1)
        {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => WarehouseError::Io(io),
                None => WarehouseError::InvalidData("filesystem loop in warehouse root".to_string()),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    tables.push(stem.to_string());
                }
            }
        }
        tables.sort();
        Ok(tables)
    }

    fn container_region(&self, name: &str) -> WarehouseResult<Option<String>> {
        Self::check_identifier(name)?;
        Ok(self.read_metadata(name)?.map(|m| m.region))
    }
}

/// Write `df` to `path` and return the row count recorded in the file footer.
fn write_parquet(path: &Path, df: &mut DataFrame) -> WarehouseResult<i64> {
    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file).finish(df)?;
    file.sync_all()?;
    let reader = SerializedFileReader::new(File::open(path)?)?;
    Ok(reader.metadata().file_metadata().num_rows())
}
