mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use sheet_warehouse::cleanup::reconcile_people;
use sheet_warehouse::error::{LoadError, PipelineError, SheetError};
use sheet_warehouse::extraction::workbook::text;
use sheet_warehouse::extraction::InMemoryWorkbook;
use sheet_warehouse::loading::RetryPolicy;
use sheet_warehouse::pipeline::{
    Pipeline, PipelineConfig, PipelineObserver, Severity, SheetContext, SheetState,
};
use sheet_warehouse::types::{DataType, TableRef, Value};
use sheet_warehouse::warehouse::{MemoryWarehouse, Warehouse};

use common::*;

const CONTAINER: &str = "superstore_sales";

fn config() -> PipelineConfig {
    PipelineConfig::new(CONTAINER)
        .with_parallelism(3)
        .with_retry(RetryPolicy::none())
}

fn table(name: &str) -> TableRef {
    TableRef::new(CONTAINER, name)
}

#[test]
fn superstore_workbook_loads_three_tables() {
    let wh = Arc::new(MemoryWarehouse::new());
    let pipeline = Pipeline::new(config(), wh.clone()).unwrap();
    let report = pipeline.run(&mut superstore_workbook()).unwrap();

    assert!(report.is_success());
    assert_eq!(
        report.sheets.iter().map(|s| s.table.table.as_str()).collect::<Vec<_>>(),
        ["orders", "people", "returns"]
    );
    assert_eq!(report.get("Orders").unwrap().rows_written, ORDER_LINES);
    assert_eq!(report.get("People").unwrap().rows_written, MANAGERS + 1);
    assert_eq!(report.get("Returns").unwrap().rows_written, RETURNED_ORDERS);
    assert_eq!(report.total_rows_written(), ORDER_LINES + MANAGERS + 1 + RETURNED_ORDERS);

    assert_eq!(
        wh.list_tables(CONTAINER).unwrap(),
        vec!["orders".to_string(), "people".to_string(), "returns".to_string()]
    );
    assert_eq!(wh.container_region(CONTAINER).unwrap().as_deref(), Some("asia-southeast1"));

    let orders = wh.read_table(&table("orders")).unwrap();
    let names: Vec<&str> = orders.schema.field_names().collect();
    assert_eq!(
        names,
        [
            "row_id",
            "order_id",
            "order_date",
            "ship_mode",
            "customer_id",
            "segment",
            "region",
            "product_id",
            "category",
            "sales",
            "profit"
        ]
    );
    let type_of = |name: &str| orders.schema.fields[orders.schema.index_of(name).unwrap()].data_type;
    assert_eq!(type_of("row_id"), DataType::Int64);
    assert_eq!(type_of("order_date"), DataType::Date);
    assert_eq!(type_of("sales"), DataType::Float64);
    assert_eq!(type_of("region"), DataType::Utf8);
    assert_eq!(orders.rows[0][0], Value::Int64(1));
}

#[test]
fn people_header_artifact_is_removed_by_the_corrective_transform() {
    let wh = Arc::new(MemoryWarehouse::new());
    let pipeline = Pipeline::new(config(), wh.clone()).unwrap();
    pipeline.run(&mut superstore_workbook()).unwrap();
    assert_eq!(wh.row_count(&table("people")), Some(MANAGERS + 1));

    let outcome = reconcile_people(pipeline.loader(), CONTAINER).unwrap();
    assert_eq!(outcome.removed, 1);
    assert_eq!(outcome.remaining, MANAGERS);

    let people = wh.read_table(&table("people")).unwrap();
    assert_eq!(people.row_count(), MANAGERS);
    assert!(people
        .rows
        .iter()
        .all(|row| row[0] != Value::Utf8("regional_manager".to_string())));

    // A second pass finds nothing to do.
    assert_eq!(reconcile_people(pipeline.loader(), CONTAINER).unwrap().removed, 0);
}

#[test]
fn rerunning_the_pipeline_is_idempotent() {
    let wh = Arc::new(MemoryWarehouse::new());
    let pipeline = Pipeline::new(config(), wh.clone()).unwrap();

    let first = pipeline.run(&mut superstore_workbook()).unwrap();
    let snapshot: Vec<_> = ["orders", "people", "returns"]
        .iter()
        .map(|t| wh.read_table(&table(t)).unwrap())
        .collect();

    let second = pipeline.run(&mut superstore_workbook()).unwrap();
    for (a, b) in first.sheets.iter().zip(&second.sheets) {
        assert_eq!(a.rows_written, b.rows_written, "{}", a.sheet_name);
        assert_eq!(a.schema, b.schema, "{}", a.sheet_name);
    }
    for before in snapshot {
        assert_eq!(wh.read_table(&before.table).unwrap(), before);
    }
}

#[test]
fn header_only_sheet_loads_an_empty_table() {
    let wh = Arc::new(MemoryWarehouse::new());
    let mut wb = InMemoryWorkbook::new().with_sheet("Returns", vec![vec![text("Returned"), text("Order ID")]]);
    let report = Pipeline::new(config(), wh.clone()).unwrap().run(&mut wb).unwrap();

    let sheet = report.get("Returns").unwrap();
    assert_eq!(sheet.state, SheetState::Loaded);
    assert_eq!(sheet.rows_written, 0);
    let stored = wh.read_table(&table("returns")).unwrap();
    assert_eq!(stored.row_count(), 0);
    assert_eq!(stored.schema.field_names().collect::<Vec<_>>(), ["returned", "order_id"]);
}

#[test]
fn one_failing_write_does_not_stop_the_other_sheets() {
    let wh = Arc::new(FaultyWarehouse::default());
    wh.deny_table("people");
    let pipeline = Pipeline::new(config(), wh.clone()).unwrap();

    let report = pipeline.run(&mut superstore_workbook()).unwrap();
    assert_eq!(report.loaded().count(), 2);
    assert_eq!(report.failed_sheets(), vec!["People".to_string()]);

    let people = report.get("People").unwrap();
    assert_eq!(people.state, SheetState::Failed);
    assert!(matches!(
        people.error,
        Some(SheetError::Load(LoadError::WriteFailed { attempts: 1, transient: false, .. }))
    ));
    assert_eq!(wh.inner.row_count(&table("orders")), Some(ORDER_LINES));
    assert_eq!(wh.inner.row_count(&table("people")), None);

    match report.into_result() {
        Err(PipelineError::PartialFailure { failed, total, sheets }) => {
            assert_eq!((failed, total), (1, 3));
            assert_eq!(sheets, vec!["People".to_string()]);
        }
        other => panic!("expected partial failure, got {other:?}"),
    }

    // Retry only what failed once the cause is fixed.
    wh.allow_all();
    let retry = pipeline.run_sheets(&mut superstore_workbook(), &["People"]).unwrap();
    assert!(retry.is_success());
    assert_eq!(retry.sheets.len(), 1);
    assert_eq!(retry.sheets[0].table, table("people"));
    assert_eq!(wh.inner.row_count(&table("people")), Some(MANAGERS + 1));
}

#[test]
fn transient_write_failures_are_retried() {
    let wh = Arc::new(FaultyWarehouse::default());
    wh.fail_next_writes(2);
    let config = PipelineConfig::new(CONTAINER).with_parallelism(1).with_retry(RetryPolicy {
        max_attempts: 3,
        initial_backoff: std::time::Duration::ZERO,
        ..RetryPolicy::default()
    });
    let mut wb = InMemoryWorkbook::new().with_sheet("Returns", returns_grid());
    let report = Pipeline::new(config, wh.clone()).unwrap().run(&mut wb).unwrap();

    assert!(report.is_success());
    assert_eq!(wh.writes(), 3);
}

#[test]
fn unreadable_sheet_fails_alone() {
    let wh = Arc::new(MemoryWarehouse::new());
    let mut wb = BrokenSheets {
        inner: superstore_workbook(),
        broken: HashSet::from(["Returns".to_string()]),
    };
    let report = Pipeline::new(config(), wh.clone()).unwrap().run(&mut wb).unwrap();

    let returns = report.get("Returns").unwrap();
    assert_eq!(returns.state, SheetState::Failed);
    assert!(matches!(returns.error, Some(SheetError::Extraction(_))));
    assert_eq!(report.loaded().count(), 2);
    assert_eq!(wh.list_tables(CONTAINER).unwrap(), vec!["orders".to_string(), "people".to_string()]);
}

#[test]
fn sheets_with_clashing_names_get_distinct_tables() {
    let wh = Arc::new(MemoryWarehouse::new());
    let mut wb = InMemoryWorkbook::new()
        .with_sheet("Orders", vec![vec![text("id")], vec![Value::Int64(1)]])
        .with_sheet("orders ", vec![vec![text("id")], vec![Value::Int64(2)]]);
    let report = Pipeline::new(config(), wh.clone()).unwrap().run(&mut wb).unwrap();

    assert_eq!(report.sheets[0].table, table("orders"));
    assert_eq!(report.sheets[1].table, table("orders_2"));
    assert_eq!(wh.list_tables(CONTAINER).unwrap().len(), 2);
}

#[test]
fn container_creation_failure_is_reported_per_sheet() {
    let wh = Arc::new(FaultyWarehouse {
        deny_containers: true,
        ..FaultyWarehouse::default()
    });
    let mut wb = InMemoryWorkbook::new().with_sheet("People", people_grid());
    let report = Pipeline::new(config(), wh.clone()).unwrap().run(&mut wb).unwrap();

    let people = report.get("People").unwrap();
    assert!(matches!(
        people.error,
        Some(SheetError::Load(LoadError::ContainerCreateFailed { .. }))
    ));
    assert_eq!(wh.writes(), 0);
}

#[test]
fn artifacts_are_written_when_configured() {
    let dir = std::env::temp_dir().join(format!("sheet_warehouse_artifacts_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let wh = Arc::new(MemoryWarehouse::new());
    let config = config().with_artifact_dir(&dir);
    let mut wb = InMemoryWorkbook::new().with_sheet("People", people_grid());
    Pipeline::new(config, wh).unwrap().run(&mut wb).unwrap();

    let csv = std::fs::read_to_string(dir.join("people.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("regional_manager,region"));
    assert_eq!(lines.next(), Some("Anna Andreadi,West"));
    assert_eq!(csv.lines().count(), MANAGERS + 2);
    let _ = std::fs::remove_dir_all(&dir);
}

#[derive(Default)]
struct RecordingObserver {
    loaded: Mutex<Vec<(String, usize)>>,
    failures: Mutex<Vec<Severity>>,
    alerts: Mutex<Vec<(String, Severity)>>,
}

impl PipelineObserver for RecordingObserver {
    fn on_loaded(&self, ctx: &SheetContext, rows_written: usize) {
        self.loaded.lock().unwrap().push((ctx.sheet_name.clone(), rows_written));
    }

    fn on_failure(&self, _ctx: &SheetContext, severity: Severity, _error: &SheetError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, ctx: &SheetContext, severity: Severity, _error: &SheetError) {
        self.alerts.lock().unwrap().push((ctx.sheet_name.clone(), severity));
    }
}

#[test]
fn observer_sees_loads_failures_and_alerts() {
    let wh = Arc::new(FaultyWarehouse::default());
    wh.deny_table("people");
    let obs = Arc::new(RecordingObserver::default());
    let mut wb = BrokenSheets {
        inner: superstore_workbook(),
        broken: HashSet::from(["Returns".to_string()]),
    };

    let pipeline = Pipeline::new(config().with_alert_at_or_above(Severity::Critical), wh)
        .unwrap()
        .with_observer(obs.clone());
    pipeline.run(&mut wb).unwrap();

    assert_eq!(*obs.loaded.lock().unwrap(), vec![("Orders".to_string(), ORDER_LINES)]);
    // Unreadable sheet: Error, below the alert threshold.
    assert_eq!(*obs.failures.lock().unwrap(), vec![Severity::Error]);
    // Permission denied on write: Critical.
    assert_eq!(*obs.alerts.lock().unwrap(), vec![("People".to_string(), Severity::Critical)]);
}
