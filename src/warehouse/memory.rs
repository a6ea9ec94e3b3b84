//! In-process warehouse.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{WarehouseError, WarehouseResult};
use crate::types::{Schema, TableRef, Value, WarehouseTable};

use super::{validate_rows, ContainerStatus, Warehouse};

#[derive(Debug)]
struct Container {
    region: String,
    tables: BTreeMap<String, (Schema, Vec<Vec<Value>>)>,
}

/// A [`Warehouse`] kept entirely in memory.
///
/// One `RwLock` guards all containers, so a replace is atomic and writers are serialized.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    containers: RwLock<BTreeMap<String, Container>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table, `None` if it does not exist.
    pub fn row_count(&self, table: &TableRef) -> Option<usize> {
        let containers = self.containers.read().ok()?;
        containers
            .get(&table.container)?
            .tables
            .get(&table.table)
            .map(|(_, rows)| rows.len())
    }
}

impl Warehouse for MemoryWarehouse {
    fn create_container_if_absent(&self, name: &str, region: &str) -> WarehouseResult<ContainerStatus> {
        let mut containers = self.containers.write().map_err(|_| WarehouseError::Poisoned)?;
        if containers.contains_key(name) {
            return Ok(ContainerStatus::Existing);
        }
        containers.insert(
            name.to_string(),
            Container {
                region: region.to_string(),
                tables: BTreeMap::new(),
            },
        );
        Ok(ContainerStatus::Created)
    }

    fn replace_table(&self, table: &TableRef, schema: &Schema, rows: &[Vec<Value>]) -> WarehouseResult<usize> {
        validate_rows(schema, rows)?;
        let mut containers = self.containers.write().map_err(|_| WarehouseError::Poisoned)?;
        let container = containers
            .get_mut(&table.container)
            .ok_or_else(|| WarehouseError::ContainerNotFound(table.container.clone()))?;
        container
            .tables
            .insert(table.table.clone(), (schema.clone(), rows.to_vec()));
        Ok(rows.len())
    }

    fn read_table(&self, table: &TableRef) -> WarehouseResult<WarehouseTable> {
        let containers = self.containers.read().map_err(|_| WarehouseError::Poisoned)?;
        let container = containers
            .get(&table.container)
            .ok_or_else(|| WarehouseError::ContainerNotFound(table.container.clone()))?;
        let (schema, rows) = container
            .tables
            .get(&table.table)
            .ok_or_else(|| WarehouseError::TableNotFound(table.clone()))?;
        Ok(WarehouseTable {
            table: table.clone(),
            schema: schema.clone(),
            rows: rows.clone(),
        })
    }

    fn list_tables(&self, container: &str) -> WarehouseResult<Vec<String>> {
        let containers = self.containers.read().map_err(|_| WarehouseError::Poisoned)?;
        let container = containers
            .get(container)
            .ok_or_else(|| WarehouseError::ContainerNotFound(container.to_string()))?;
        Ok(container.tables.keys().cloned().collect())
    }

    fn container_region(&self, name: &str) -> WarehouseResult<Option<String>> {
        let containers = self.containers.read().map_err(|_| WarehouseError::Poisoned)?;
        Ok(containers.get(name).map(|c| c.region.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Field};

    fn schema() -> Schema {
        Schema::new(vec![Field::required("id", DataType::Int64)])
    }

    #[test]
    fn container_creation_is_idempotent_and_keeps_region() {
        let wh = MemoryWarehouse::new();
        assert_eq!(
            wh.create_container_if_absent("ds", "asia-southeast1").unwrap(),
            ContainerStatus::Created
        );
        assert_eq!(
            wh.create_container_if_absent("ds", "us-east1").unwrap(),
            ContainerStatus::Existing
        );
        assert_eq!(wh.container_region("ds").unwrap().as_deref(), Some("asia-southeast1"));
    }

    #[test]
    fn replace_never_appends() {
        let wh = MemoryWarehouse::new();
        wh.create_container_if_absent("ds", "r").unwrap();
        let t = TableRef::new("ds", "t");
        let rows = vec![vec![Value::Int64(1)], vec![Value::Int64(2)]];
        assert_eq!(wh.replace_table(&t, &schema(), &rows).unwrap(), 2);
        assert_eq!(wh.replace_table(&t, &schema(), &rows[..1]).unwrap(), 1);
        assert_eq!(wh.read_table(&t).unwrap().rows, vec![vec![Value::Int64(1)]]);
        assert_eq!(wh.list_tables("ds").unwrap(), vec!["t".to_string()]);
    }

    #[test]
    fn invalid_rows_leave_previous_contents() {
        let wh = MemoryWarehouse::new();
        wh.create_container_if_absent("ds", "r").unwrap();
        let t = TableRef::new("ds", "t");
        wh.replace_table(&t, &schema(), &[vec![Value::Int64(1)]]).unwrap();
        assert!(wh.replace_table(&t, &schema(), &[vec![Value::Null]]).is_err());
        assert_eq!(wh.row_count(&t), Some(1));
    }

    #[test]
    fn missing_container_and_table() {
        let wh = MemoryWarehouse::new();
        let t = TableRef::new("ds", "t");
        assert!(matches!(
            wh.replace_table(&t, &schema(), &[]),
            Err(WarehouseError::ContainerNotFound(_))
        ));
        wh.create_container_if_absent("ds", "r").unwrap();
        assert!(matches!(wh.read_table(&t), Err(WarehouseError::TableNotFound(_))));
    }
}
