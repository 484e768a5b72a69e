use medsupply_shared::Payer;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fee_schedule::FeeScheduleTable;
use crate::product::Product;

/// Who pays for an order: a payer, the patient directly, or nobody chosen yet
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricingContext {
    pub payer: Option<Payer>,
    pub self_pay: bool,
}

impl PricingContext {
    pub fn payer(payer: Payer) -> Self {
        Self { payer: Some(payer), self_pay: false }
    }

    pub fn self_pay() -> Self {
        Self { payer: None, self_pay: true }
    }
}

/// How a line's price was arrived at
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingOutcome {
    SelfPay,
    /// No payer selected yet
    Unpriced,
    Scheduled {
        fee_schedule_id: String,
        patient_share_percent: u32,
    },
    /// The payer has no entry for this code; the caller should surface it
    NoFeeSchedule { payer: Payer, hcpcs: String },
}

/// Per-unit amounts for one line item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinePricing {
    pub allowed_cents: i64,
    pub patient_share_cents: i64,
    pub outcome: PricingOutcome,
}

impl LinePricing {
    fn zero(outcome: PricingOutcome) -> Self {
        Self {
            allowed_cents: 0,
            patient_share_cents: 0,
            outcome,
        }
    }

    pub fn is_missing_fee_schedule(&self) -> bool {
        matches!(self.outcome, PricingOutcome::NoFeeSchedule { .. })
    }
}

/// Resolves line pricing against a fee schedule table. Pure: no state of its own.
pub struct PricingResolver<'a> {
    table: &'a FeeScheduleTable,
}

impl<'a> PricingResolver<'a> {
    pub fn new(table: &'a FeeScheduleTable) -> Self {
        Self { table }
    }

    pub fn resolve(&self, context: PricingContext, product: &Product) -> LinePricing {
        if context.self_pay {
            return LinePricing {
                allowed_cents: product.msrp_cents,
                patient_share_cents: product.msrp_cents,
                outcome: PricingOutcome::SelfPay,
            };
        }

        let Some(payer) = context.payer else {
            return LinePricing::zero(PricingOutcome::Unpriced);
        };

        match self.table.get(payer, &product.hcpcs) {
            Some(fs) => {
                debug!("Fee schedule {} prices {} for {}", fs.id, product.hcpcs, payer);
                LinePricing {
                    allowed_cents: fs.allowed_cents,
                    patient_share_cents: fs.patient_share_cents(),
                    outcome: PricingOutcome::Scheduled {
                        fee_schedule_id: fs.id.clone(),
                        patient_share_percent: fs.patient_share_percent,
                    },
                }
            }
            None => {
                debug!("No fee schedule for {} / {}", payer, product.hcpcs);
                LinePricing::zero(PricingOutcome::NoFeeSchedule {
                    payer,
                    hcpcs: product.hcpcs.clone(),
                })
            }
        }
    }
}
