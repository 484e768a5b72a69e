use serde::{Deserialize, Serialize};

use crate::models::LineItem;

/// Money totals across an order's line items
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderTotals {
    pub total_allowed_cents: i64,
    pub total_cost_cents: i64,
    pub total_patient_share_cents: i64,
    pub margin_percent: f64,
}

impl OrderTotals {
    pub fn from_line_items(items: &[LineItem]) -> Self {
        let mut allowed = 0;
        let mut cost = 0;
        let mut patient_share = 0;

        for item in items {
            let qty = i64::from(item.qty);
            allowed = line_total(allowed, item.allowed_cents, qty);
            cost = line_total(cost, item.cost_cents, qty);
            patient_share = line_total(patient_share, item.patient_share_cents, qty);
        }

        Self {
            total_allowed_cents: allowed,
            total_cost_cents: cost,
            total_patient_share_cents: patient_share,
            margin_percent: margin_percent(allowed, cost),
        }
    }

    /// What the payer covers once the patient's share is taken out
    pub fn insurance_pays_cents(&self) -> i64 {
        self.total_allowed_cents.saturating_sub(self.total_patient_share_cents)
    }
}

fn line_total(running: i64, unit_cents: i64, qty: i64) -> i64 {
    running.saturating_add(unit_cents.saturating_mul(qty))
}

/// Margin over cost in percent, one decimal place. Zero when there is no cost.
///
/// Halves round toward positive infinity.
pub fn margin_percent(total_allowed_cents: i64, total_cost_cents: i64) -> f64 {
    if total_cost_cents <= 0 {
        return 0.0;
    }
    let ratio = (total_allowed_cents as f64 - total_cost_cents as f64) / total_cost_cents as f64;
    (ratio * 1000.0 + 0.5).floor() / 10.0
}
