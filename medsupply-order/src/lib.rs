pub mod models;
pub mod manager;
pub mod documents;
pub mod finance;
pub mod changes;
pub mod intake;
pub mod query;

pub use models::{LineItem, Note, Order, OrderStatus};
pub use manager::{OrderError, OrderManager, Submission};
pub use documents::{Document, DocumentError, DocumentKind, DocumentService};
pub use changes::{ChangeError, ChangeHandler, LineChange};
pub use finance::OrderTotals;
pub use intake::{LineItemInput, MissingFeeSchedule, OrderForm};
pub use query::{DashboardMetrics, OrderFilter, PayerFilter};
