//! Demo dataset: twelve products, a deliberately incomplete fee schedule
//! table and seven orders.

use medsupply_catalog::{Catalog, FeeSchedule, FeeScheduleError, FeeScheduleTable, PatientShareDefaults, Product};
use medsupply_order::{Order, OrderManager};
use serde::Deserialize;
use tracing::info;

const MOCK_DATA: &str = include_str!("../fixtures/mock_data.json");

#[derive(Debug, Deserialize)]
struct MockData {
    products: Vec<Product>,
    fee_schedules: Vec<FeeSchedule>,
    orders: Vec<Order>,
}

pub struct Fixtures {
    pub catalog: Catalog,
    pub orders: OrderManager,
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Failed to parse fixture data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    FeeSchedule(#[from] FeeScheduleError),
}

impl Fixtures {
    /// Load the demo dataset. Stored order totals and margins are recomputed.
    pub fn load(share_defaults: PatientShareDefaults) -> Result<Self, FixtureError> {
        let data: MockData = serde_json::from_str(MOCK_DATA)?;
        let table = FeeScheduleTable::from_entries(data.fee_schedules)?;

        info!(
            "Loaded fixtures: {} products, {} fee schedules, {} orders",
            data.products.len(),
            table.len(),
            data.orders.len()
        );

        Ok(Self {
            catalog: Catalog::new(data.products, table, share_defaults),
            orders: OrderManager::with_orders(data.orders),
        })
    }

    /// Empty catalog and order book
    pub fn empty(share_defaults: PatientShareDefaults) -> Self {
        Self {
            catalog: Catalog::new(Vec::new(), FeeScheduleTable::new(), share_defaults),
            orders: OrderManager::new(),
        }
    }
}
