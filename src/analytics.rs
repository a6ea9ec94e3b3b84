//! Read-only analytical queries over loaded tables (feature `sql`).
//!
//! Tables are read from a [`Warehouse`] container, converted to Polars frames and queried with
//! `polars-sql`. The catalogue expects the normalized Superstore layout:
//!
//! - `orders(order_id, order_date, ship_mode, segment, region, category, sales, profit, customer_id, product_id)`
//! - `people(regional_manager, region)`
//! - `returns(order_id, returned)`
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sheet_warehouse::analytics::{Analytics, Query};
//! use sheet_warehouse::warehouse::ParquetWarehouse;
//!
//! # fn main() -> Result<(), sheet_warehouse::AnalyticsError> {
//! let warehouse = Arc::new(ParquetWarehouse::new("warehouse"));
//! let df = Analytics::new(warehouse, "superstore_sales").run(Query::SalesByRegion)?;
//! println!("{df}");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;
use polars::prelude::{DataFrame, IntoLazy};
use polars_sql::SQLContext;

use crate::error::AnalyticsError;
use crate::types::TableRef;
use crate::warehouse::{to_frame, Warehouse};

/// The fixed catalogue of business queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    /// Sales, profit and order lines per region.
    SalesByRegion,
    /// Sales, profit and margin per product category.
    ProfitByCategory,
    /// Sales and profit per regional manager (orders joined with people on region).
    RegionalManagerPerformance,
    /// Share of order lines and sales that were returned, per region.
    ReturnRateByRegion,
    SegmentSummary,
    ShipModeSummary,
}

impl Query {
    pub const ALL: [Query; 6] = [
        Query::SalesByRegion,
        Query::ProfitByCategory,
        Query::RegionalManagerPerformance,
        Query::ReturnRateByRegion,
        Query::SegmentSummary,
        Query::ShipModeSummary,
    ];

    /// Kebab-case name used on the command line.
    pub const fn name(&self) -> &'static str {
        match self {
            Query::SalesByRegion => "sales-by-region",
            Query::ProfitByCategory => "profit-by-category",
            Query::RegionalManagerPerformance => "regional-manager-performance",
            Query::ReturnRateByRegion => "return-rate-by-region",
            Query::SegmentSummary => "segment-summary",
            Query::ShipModeSummary => "ship-mode-summary",
        }
    }

    /// Tables the query reads.
    pub const fn tables(&self) -> &'static [&'static str] {
        match self {
            Query::RegionalManagerPerformance => &["orders", "people"],
            Query::ReturnRateByRegion => &["orders", "returns"],
            _ => &["orders"],
        }
    }

    pub const fn sql(&self) -> &'static str {
        match self {
            Query::SalesByRegion => {
                "SELECT region, SUM(sales) AS total_sales, SUM(profit) AS total_profit, COUNT(*) AS order_lines \
                 FROM orders GROUP BY region ORDER BY total_sales DESC"
            }
            Query::ProfitByCategory => {
                "SELECT category, SUM(sales) AS total_sales, SUM(profit) AS total_profit, \
                 SUM(profit) / SUM(sales) AS profit_margin \
                 FROM orders GROUP BY category ORDER BY total_profit DESC"
            }
            Query::RegionalManagerPerformance => {
                "SELECT p.regional_manager, SUM(o.sales) AS total_sales, \
                 SUM(o.profit) AS total_profit, COUNT(*) AS order_lines \
                 FROM orders o INNER JOIN people p ON o.region = p.region \
                 GROUP BY p.regional_manager ORDER BY total_sales DESC"
            }
            Query::ReturnRateByRegion => {
                "SELECT o.region, COUNT(*) AS order_lines, \
                 SUM(CASE WHEN r.returned IS NULL THEN 0 ELSE 1 END) AS returned_lines, \
                 SUM(CASE WHEN r.returned IS NULL THEN 0.0 ELSE o.sales END) AS returned_sales \
                 FROM orders o LEFT JOIN returns r ON o.order_id = r.order_id \
                 GROUP BY o.region ORDER BY region"
            }
            Query::SegmentSummary => {
                "SELECT segment, COUNT(*) AS order_lines, SUM(sales) AS total_sales, \
                 SUM(profit) AS total_profit, AVG(sales) AS avg_sale \
                 FROM orders GROUP BY segment ORDER BY total_sales DESC"
            }
            Query::ShipModeSummary => {
                "SELECT ship_mode, COUNT(*) AS order_lines, SUM(sales) AS total_sales \
                 FROM orders GROUP BY ship_mode ORDER BY order_lines DESC"
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Query {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Query::ALL
            .into_iter()
            .find(|q| q.name() == wanted)
            .ok_or_else(|| AnalyticsError::UnknownQuery(s.to_string()))
    }
}

/// Runs SQL over the tables of one warehouse container.
pub struct Analytics {
    warehouse: Arc<dyn Warehouse>,
    container: String,
}

impl fmt::Debug for Analytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analytics")
            .field("container", &self.container)
            .finish()
    }
}

impl Analytics {
    pub fn new(warehouse: Arc<dyn Warehouse>, container: impl Into<String>) -> Self {
        Self {
            warehouse,
            container: container.into(),
        }
    }

    /// Run a catalogue query.
    pub fn run(&self, query: Query) -> Result<DataFrame, AnalyticsError> {
        debug!("running query {query}");
        self.run_sql(query.sql(), query.tables())
    }

    /// Run arbitrary read-only SQL with `tables` registered under their own names.
    pub fn run_sql(&self, sql: &str, tables: &[&str]) -> Result<DataFrame, AnalyticsError> {
        let mut ctx = SQLContext::new();
        for name in tables {
            ctx.register(name, self.frame(name)?.lazy());
        }
        Ok(ctx.execute(sql)?.collect()?)
    }

    /// Load one table of the container as a `DataFrame`.
    pub fn frame(&self, table: &str) -> Result<DataFrame, AnalyticsError> {
        let stored = self
            .warehouse
            .read_table(&TableRef::new(self.container.as_str(), table))?;
        Ok(to_frame(&stored.schema, &stored.rows)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_names_round_trip() {
        for q in Query::ALL {
            assert_eq!(q.name().parse::<Query>().unwrap(), q);
        }
        assert_eq!("Sales_By_Region".parse::<Query>().unwrap(), Query::SalesByRegion);
        assert!(matches!(
            "top-customers".parse::<Query>(),
            Err(AnalyticsError::UnknownQuery(_))
        ));
    }

    #[test]
    fn every_query_reads_orders() {
        for q in Query::ALL {
            assert!(q.tables().contains(&"orders"), "{q}");
            assert!(q.sql().contains("FROM orders"), "{q}");
        }
    }
}
