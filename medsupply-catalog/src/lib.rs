pub mod catalog;
pub mod fee_schedule;
pub mod pricing;
pub mod product;

pub use catalog::{Catalog, CatalogError, FeeSchedulePrefill, NewFeeSchedule};
pub use fee_schedule::{FeeSchedule, FeeScheduleError, FeeScheduleTable, PatientShareDefaults};
pub use pricing::{LinePricing, PricingContext, PricingOutcome, PricingResolver};
pub use product::{NewProduct, Product};
