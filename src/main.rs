//! `sheet-warehouse` command line: load a workbook, run catalogue queries, repair `people`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use sheet_warehouse::cleanup::reconcile_people;
use sheet_warehouse::loading::TableLoader;
use sheet_warehouse::pipeline::config::{
    ENV_ARTIFACT_DIR, ENV_CONTAINER_ID, ENV_PARALLELISM, ENV_REGION, ENV_WAREHOUSE_ROOT,
};
use sheet_warehouse::pipeline::{CompositeObserver, FileObserver, LogObserver, Pipeline, PipelineConfig, PipelineObserver};
use sheet_warehouse::warehouse::{ParquetWarehouse, Warehouse};

#[derive(Parser, Debug)]
#[command(
    name = "sheet-warehouse",
    version,
    about = "Load spreadsheet workbooks into warehouse tables and query them"
)]
struct Cli {
    #[command(flatten)]
    target: Target,

    #[command(subcommand)]
    command: Command,
}

/// Where tables live. Flags override the environment (and `.env`).
#[derive(Args, Debug)]
struct Target {
    /// Destination container (env: DATASET_ID)
    #[arg(long, global = true)]
    container: Option<String>,

    /// Region for newly created containers (env: DATASET_REGION)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Warehouse root directory (env: SHEET_WAREHOUSE_ROOT)
    #[arg(long, global = true)]
    warehouse_root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract every sheet of a workbook and replace the matching tables
    Load {
        /// Workbook file (.xlsx, .xls, .xlsm, .xlsb, .ods)
        workbook: PathBuf,

        /// Only load these sheets (repeatable)
        #[arg(long = "sheet")]
        sheets: Vec<String>,

        /// Concurrent table loads (env: SHEET_WAREHOUSE_PARALLELISM)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Also write one CSV per sheet here (env: SHEET_WAREHOUSE_ARTIFACT_DIR)
        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        /// Append per-sheet outcomes to this file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List the tables of the container
    Tables,

    /// Run a catalogue query ("all" runs every query)
    #[cfg(feature = "sql")]
    Query {
        /// Query name, e.g. sales-by-region
        name: String,
    },

    /// Remove the header artifact row from the `people` table
    ReconcilePeople,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let overrides = |key: &str| -> Option<String> {
        let flag = match key {
            ENV_CONTAINER_ID => cli.target.container.clone(),
            ENV_REGION => cli.target.region.clone(),
            ENV_WAREHOUSE_ROOT => cli.target.warehouse_root.as_ref().map(|p| p.display().to_string()),
            ENV_PARALLELISM => match &cli.command {
                Command::Load { parallelism, .. } => parallelism.map(|n| n.to_string()),
                _ => None,
            },
            ENV_ARTIFACT_DIR => match &cli.command {
                Command::Load { artifact_dir, .. } => artifact_dir.as_ref().map(|p| p.display().to_string()),
                _ => None,
            },
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    };
    let config = PipelineConfig::from_lookup(overrides).context("invalid configuration")?;
    let warehouse: Arc<dyn Warehouse> = Arc::new(ParquetWarehouse::new(&config.warehouse_root));

    match cli.command {
        Command::Load {
            workbook,
            sheets,
            log_file,
            json,
            ..
        } => load(config, warehouse, workbook, &sheets, log_file, json),
        Command::Tables => {
            for table in warehouse.list_tables(&config.container_id)? {
                println!("{}.{table}", config.container_id);
            }
            Ok(())
        }
        #[cfg(feature = "sql")]
        Command::Query { name } => query(warehouse, &config.container_id, &name),
        Command::ReconcilePeople => {
            let loader = TableLoader::new(warehouse)
                .with_region(config.region.clone())
                .with_retry(config.retry.clone());
            let outcome = reconcile_people(&loader, &config.container_id)?;
            println!(
                "{}.people: removed {} row(s), {} remaining",
                config.container_id, outcome.removed, outcome.remaining
            );
            Ok(())
        }
    }
}

fn load(
    config: PipelineConfig,
    warehouse: Arc<dyn Warehouse>,
    path: PathBuf,
    sheets: &[String],
    log_file: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut observers: Vec<Arc<dyn PipelineObserver>> = vec![Arc::new(LogObserver)];
    if let Some(log_file) = log_file {
        observers.push(Arc::new(FileObserver::new(log_file)));
    }
    let pipeline = Pipeline::new(config, warehouse)?.with_observer(Arc::new(CompositeObserver::new(observers)));

    let mut workbook = open_workbook(&path)?;
    info!("loading {} into {}", path.display(), pipeline.config().container_id);
    let report = if sheets.is_empty() {
        pipeline.run(&mut workbook)?
    } else {
        pipeline.run_sheets(&mut workbook, sheets)?
    };

    if json {
        println!("{}", report.to_json()?);
    } else {
        for sheet in &report.sheets {
            match &sheet.error {
                None => println!(
                    "{:<20} -> {:<30} {:?} rows={}",
                    sheet.sheet_name, sheet.table.to_string(), sheet.state, sheet.rows_written
                ),
                Some(e) => println!("{:<20} -> {:<30} Failed: {e}", sheet.sheet_name, sheet.table.to_string()),
            }
        }
    }
    report.into_result()?;
    Ok(())
}

#[cfg(feature = "excel")]
fn open_workbook(path: &std::path::Path) -> Result<sheet_warehouse::extraction::excel::ExcelWorkbook> {
    sheet_warehouse::extraction::excel::ExcelWorkbook::open(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))
}

#[cfg(not(feature = "excel"))]
fn open_workbook(path: &std::path::Path) -> Result<sheet_warehouse::extraction::InMemoryWorkbook> {
    anyhow::bail!(
        "cannot read {}: built without the `excel` feature",
        path.display()
    )
}

#[cfg(feature = "sql")]
fn query(warehouse: Arc<dyn Warehouse>, container: &str, name: &str) -> Result<()> {
    use sheet_warehouse::analytics::{Analytics, Query};

    let queries: Vec<Query> = if name.eq_ignore_ascii_case("all") {
        Query::ALL.to_vec()
    } else {
        vec![name.parse()?]
    };
    let analytics = Analytics::new(warehouse, container);
    for q in queries {
        let df = analytics.run(q).with_context(|| format!("query {q} failed"))?;
        println!("-- {q}\n{df}\n");
    }
    Ok(())
}
