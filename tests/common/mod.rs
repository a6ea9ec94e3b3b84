//! Shared fixtures for integration tests: a Superstore-shaped workbook and fault-injecting
//! warehouses.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use sheet_warehouse::error::{ExtractionError, ExtractionResult, WarehouseError, WarehouseResult};
use sheet_warehouse::extraction::workbook::text;
use sheet_warehouse::extraction::{Grid, InMemoryWorkbook, Workbook};
use sheet_warehouse::types::{Schema, TableRef, Value, WarehouseTable};
use sheet_warehouse::warehouse::{ContainerStatus, MemoryWarehouse, Warehouse};

pub const ORDER_LINES: usize = 9994;
pub const MANAGERS: usize = 4;
pub const RETURNED_ORDERS: usize = 296;

const REGIONS: [&str; 4] = ["West", "East", "Central", "South"];
const MANAGER_NAMES: [&str; 4] = ["Anna Andreadi", "Chuck Magee", "Kelly Williams", "Cassandra Brandow"];
const SEGMENTS: [&str; 3] = ["Consumer", "Corporate", "Home Office"];
const SHIP_MODES: [&str; 4] = ["Standard Class", "Second Class", "First Class", "Same Day"];
const CATEGORIES: [&str; 3] = ["Furniture", "Office Supplies", "Technology"];

/// Two order lines per order.
pub fn order_id(line: usize) -> String {
    format!("CA-2016-{}", 100_000 + line / 2)
}

pub fn orders_grid() -> Grid {
    let mut grid = vec![vec![
        text("Row ID"),
        text("Order ID"),
        text("Order Date"),
        text("Ship Mode"),
        text("Customer ID"),
        text("Segment"),
        text("Region"),
        text("Product ID"),
        text("Category"),
        text("Sales"),
        text("Profit"),
    ]];
    let start = NaiveDate::from_ymd_opt(2014, 1, 3).unwrap();
    for i in 0..ORDER_LINES {
        let sales = (i % 200) as f64 * 1.5 + 0.99;
        grid.push(vec![
            Value::Float64((i + 1) as f64),
            text(order_id(i)),
            Value::Date(start + chrono::Days::new((i / 8) as u64)),
            text(SHIP_MODES[(i / 3) % 4]),
            text(format!("CU-{:05}", i % 793)),
            text(SEGMENTS[i % 3]),
            text(REGIONS[i % 4]),
            text(format!("PR-{:08}", i % 1862)),
            text(CATEGORIES[(i / 2) % 3]),
            Value::Float64(sales),
            Value::Float64(sales * 0.125 - 4.5),
        ]);
    }
    grid
}

/// Four managers plus the stray header row that the corrective transform removes.
pub fn people_grid() -> Grid {
    let mut grid = vec![vec![text("Regional Manager"), text("Region")]];
    for (name, region) in MANAGER_NAMES.iter().zip(REGIONS) {
        grid.push(vec![text(*name), text(region)]);
    }
    grid.push(vec![text("regional_manager"), text("region")]);
    grid
}

pub fn returns_grid() -> Grid {
    let mut grid = vec![vec![text("Returned"), text("Order ID")]];
    for k in 0..RETURNED_ORDERS {
        grid.push(vec![text("Yes"), text(order_id(k * 6))]);
    }
    grid
}

pub fn superstore_workbook() -> InMemoryWorkbook {
    InMemoryWorkbook::new()
        .with_sheet("Orders", orders_grid())
        .with_sheet("People", people_grid())
        .with_sheet("Returns", returns_grid())
}

/// Workbook whose listed sheets fail to read.
pub struct BrokenSheets {
    pub inner: InMemoryWorkbook,
    pub broken: HashSet<String>,
}

impl Workbook for BrokenSheets {
    fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names()
    }

    fn read_sheet(&mut self, name: &str) -> ExtractionResult<Grid> {
        if self.broken.contains(name) {
            return Err(ExtractionError::UnreadableSheet {
                sheet: name.to_string(),
                message: "corrupt sheet stream".to_string(),
            });
        }
        self.inner.read_sheet(name)
    }
}

/// Memory warehouse that fails writes on demand.
#[derive(Default)]
pub struct FaultyWarehouse {
    pub inner: MemoryWarehouse,
    /// Tables whose writes fail permanently.
    pub denied_tables: Mutex<HashSet<String>>,
    /// Number of upcoming writes (any table) that fail with a transient error.
    pub transient_failures: AtomicUsize,
    /// Fail container creation with a permission error.
    pub deny_containers: bool,
    pub write_calls: AtomicUsize,
}

impl FaultyWarehouse {
    pub fn deny_table(&self, table: &str) {
        self.denied_tables.lock().unwrap().insert(table.to_string());
    }

    pub fn allow_all(&self) {
        self.denied_tables.lock().unwrap().clear();
    }

    pub fn fail_next_writes(&self, n: usize) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

impl Warehouse for FaultyWarehouse {
    fn create_container_if_absent(&self, name: &str, region: &str) -> WarehouseResult<ContainerStatus> {
        if self.deny_containers {
            return Err(WarehouseError::PermissionDenied(format!("cannot create dataset {name}")));
        }
        self.inner.create_container_if_absent(name, region)
    }

    fn replace_table(&self, table: &TableRef, schema: &Schema, rows: &[Vec<Value>]) -> WarehouseResult<usize> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.denied_tables.lock().unwrap().contains(&table.table) {
            return Err(WarehouseError::PermissionDenied(format!("write to {table}")));
        }
        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0
            && self
                .transient_failures
                .compare_exchange(pending, pending - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(WarehouseError::Unavailable("503 backend error".to_string()));
        }
        self.inner.replace_table(table, schema, rows)
    }

    fn read_table(&self, table: &TableRef) -> WarehouseResult<WarehouseTable> {
        self.inner.read_table(table)
    }

    fn list_tables(&self, container: &str) -> WarehouseResult<Vec<String>> {
        self.inner.list_tables(container)
    }

    fn container_region(&self, name: &str) -> WarehouseResult<Option<String>> {
        self.inner.container_region(name)
    }
}
