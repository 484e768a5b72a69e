use medsupply_shared::Payer;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::{Order, OrderStatus};

/// Payer column filter. `Self-Pay` is a filter value even though it is not a payer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayerFilter {
    Payer(Payer),
    SelfPay,
}

impl FromStr for PayerFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("self-pay") {
            return Ok(PayerFilter::SelfPay);
        }
        Payer::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .map(PayerFilter::Payer)
            .ok_or_else(|| format!("Unknown payer filter: {}", s))
    }
}

/// Order list filter; empty fields match everything
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub payer: Option<PayerFilter>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(q) = self.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            if !order.patient.to_lowercase().contains(&q) && !order.id.to_lowercase().contains(&q) {
                return false;
            }
        }

        if self.status.is_some_and(|s| s != order.status) {
            return false;
        }

        match self.payer {
            Some(PayerFilter::SelfPay) => order.self_pay,
            Some(PayerFilter::Payer(p)) => !order.self_pay && order.payer == Some(p),
            None => true,
        }
    }

    pub fn apply<'a>(&self, orders: impl IntoIterator<Item = &'a Order>) -> Vec<&'a Order> {
        orders.into_iter().filter(|o| self.matches(o)).collect()
    }
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardMetrics {
    /// Draft plus Needs Approval
    pub open_orders: usize,
    pub needs_approval: usize,
    pub docs_ready: usize,
}

impl DashboardMetrics {
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        orders.into_iter().fold(Self::default(), |mut m, order| {
            match order.status {
                OrderStatus::Draft => m.open_orders += 1,
                OrderStatus::NeedsApproval => {
                    m.open_orders += 1;
                    m.needs_approval += 1;
                }
                OrderStatus::DocsReady => m.docs_ready += 1,
                OrderStatus::Approved | OrderStatus::ActionRequired => {}
            }
            m
        })
    }
}
