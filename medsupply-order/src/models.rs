use chrono::{DateTime, NaiveDate, Utc};
use medsupply_catalog::{LinePricing, PricingContext, Product};
use medsupply_shared::{Masked, Payer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::finance::OrderTotals;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Draft,
    #[serde(rename = "Needs Approval")]
    NeedsApproval,
    Approved,
    #[serde(rename = "Docs Ready")]
    DocsReady,
    #[serde(rename = "Action Required")]
    ActionRequired,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Draft,
        OrderStatus::NeedsApproval,
        OrderStatus::Approved,
        OrderStatus::DocsReady,
        OrderStatus::ActionRequired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "Draft",
            OrderStatus::NeedsApproval => "Needs Approval",
            OrderStatus::Approved => "Approved",
            OrderStatus::DocsReady => "Docs Ready",
            OrderStatus::ActionRequired => "Action Required",
        }
    }

    /// Draft and rejected orders can still be edited and resubmitted
    pub fn is_editable(&self) -> bool {
        matches!(self, OrderStatus::Draft | OrderStatus::ActionRequired)
    }

    /// Submitted and not yet finished; these can be rejected
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::NeedsApproval | OrderStatus::Approved)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown order status: {}", s))
    }
}

/// A DME order: patient, coverage, priced line items and the note trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub patient: String,
    pub payer: Option<Payer>,
    pub self_pay: bool,
    pub status: OrderStatus,
    pub total_allowed_cents: i64,
    pub margin_percent: f64,
    pub updated: NaiveDate,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: Masked<String>,
    pub dob: Option<Masked<NaiveDate>>,
    pub insurance_id: Masked<String>,
    pub group_number: String,
    pub line_items: Vec<LineItem>,
    pub notes: Vec<Note>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl Order {
    pub fn pricing_context(&self) -> PricingContext {
        PricingContext {
            payer: self.payer,
            self_pay: self.self_pay,
        }
    }

    /// Payer as shown on documents and in the order list
    pub fn payer_label(&self) -> String {
        if self.self_pay {
            "Self-Pay".to_string()
        } else {
            self.payer.map(|p| p.to_string()).unwrap_or_else(|| "—".to_string())
        }
    }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals::from_line_items(&self.line_items)
    }

    /// Refresh the stored total and margin from the line items
    pub fn recalculate(&mut self) {
        let totals = self.totals();
        self.total_allowed_cents = totals.total_allowed_cents;
        self.margin_percent = totals.margin_percent;
    }

    pub fn touch(&mut self) {
        self.updated = Utc::now().date_naive();
    }

    pub fn update_status(&mut self, new_status: OrderStatus) {
        self.status = new_status;
        self.touch();
    }

    pub fn add_note(&mut self, author: &str, text: &str) -> &Note {
        self.notes.push(Note::new(author, text));
        &self.notes[self.notes.len() - 1]
    }

    pub fn line(&self, line_id: &str) -> Option<&LineItem> {
        self.line_items.iter().find(|li| li.id == line_id)
    }

    pub fn line_mut(&mut self, line_id: &str) -> Option<&mut LineItem> {
        self.line_items.iter_mut().find(|li| li.id == line_id)
    }

    /// Next free `LI-n` id within this order
    pub fn next_line_id(&self) -> String {
        let max = self
            .line_items
            .iter()
            .filter_map(|li| li.id.strip_prefix("LI-"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("LI-{}", max + 1)
    }
}

/// A product on an order. Name, code and cost are copied from the catalog when
/// the line is filled in; allowed and patient share are per unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub product: String,
    pub hcpcs: String,
    pub qty: u32,
    pub cost_cents: i64,
    pub allowed_cents: i64,
    pub patient_share_cents: i64,
    pub has_measurement: bool,
}

impl LineItem {
    pub fn blank(id: String, qty: u32) -> Self {
        Self {
            id,
            product_id: None,
            product: String::new(),
            hcpcs: String::new(),
            qty,
            cost_cents: 0,
            allowed_cents: 0,
            patient_share_cents: 0,
            has_measurement: false,
        }
    }

    pub fn from_product(id: String, product: &Product, qty: u32, pricing: &LinePricing) -> Self {
        let mut item = Self::blank(id, qty);
        item.set_product(product, pricing);
        item
    }

    pub fn set_product(&mut self, product: &Product, pricing: &LinePricing) {
        self.product_id = Some(product.id.clone());
        self.product = product.name.clone();
        self.hcpcs = product.hcpcs.clone();
        self.cost_cents = product.cost_cents;
        self.has_measurement = product.requires_measurement;
        self.apply_pricing(pricing);
    }

    pub fn apply_pricing(&mut self, pricing: &LinePricing) {
        self.allowed_cents = pricing.allowed_cents;
        self.patient_share_cents = pricing.patient_share_cents;
    }

    /// Drop the product but keep the row (and its quantity) for re-selection
    pub fn clear(&mut self) {
        let qty = self.qty;
        *self = Self::blank(std::mem::take(&mut self.id), qty);
    }

    pub fn has_product(&self) -> bool {
        self.product_id.is_some() || !self.hcpcs.is_empty()
    }
}

/// Append-only free-text note
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Note {
    pub fn new(author: &str, text: &str) -> Self {
        Self {
            id: format!("N-{}", Uuid::new_v4().simple()),
            author: author.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }
}
