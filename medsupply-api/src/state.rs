use std::sync::Arc;
use medsupply_catalog::Catalog;
use medsupply_order::{Order, OrderManager};
use medsupply_store::{Config, Fixtures, FixtureError, SessionStore};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<RwLock<Catalog>>,
    pub orders: Arc<RwLock<OrderManager>>,
    pub session: SessionStore,
}

impl AppState {
    pub fn new(fixtures: Fixtures, session: SessionStore) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(fixtures.catalog)),
            orders: Arc::new(RwLock::new(fixtures.orders)),
            session,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, FixtureError> {
        let share_defaults = config.pricing.share_defaults();
        let fixtures = if config.fixtures.seed {
            Fixtures::load(share_defaults)?
        } else {
            Fixtures::empty(share_defaults)
        };
        let session = SessionStore::in_memory(config.session.max_attachment_bytes);
        Ok(Self::new(fixtures, session))
    }

    /// Copy of an order with session state applied
    pub fn view(&self, order: &Order) -> Order {
        let mut order = order.clone();
        self.session.overlay(&mut order);
        order
    }
}
