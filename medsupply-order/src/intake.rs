//! Order intake: the create-order form, its validation, and conversion to
//! and from stored orders.

use chrono::{NaiveDate, Utc};
use medsupply_catalog::{Catalog, LinePricing, PricingContext, PricingOutcome, Product};
use medsupply_shared::{FieldErrors, Masked, Payer};
use serde::{Deserialize, Serialize};

use crate::models::{LineItem, Order, OrderStatus};

/// Summary toast shows at most this many distinct messages
pub const SUMMARY_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub dob: Option<Masked<NaiveDate>>,
    #[serde(default)]
    pub phone: Masked<String>,
    #[serde(default)]
    pub self_pay: bool,
    #[serde(default)]
    pub payer: String,
    #[serde(default)]
    pub insurance_id: Masked<String>,
    #[serde(default)]
    pub group_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItemInput {
    #[serde(default)]
    pub product_id: String,
    #[serde(default = "default_qty")]
    pub qty: u32,
}

fn default_qty() -> u32 {
    1
}

/// A line priced at zero because its payer has no fee schedule for the code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissingFeeSchedule {
    pub line_id: String,
    pub payer: Payer,
    pub hcpcs: String,
    pub product: String,
}

impl MissingFeeSchedule {
    pub fn from_pricing(line_id: &str, product: &Product, pricing: &LinePricing) -> Option<Self> {
        match &pricing.outcome {
            PricingOutcome::NoFeeSchedule { payer, hcpcs } => Some(Self {
                line_id: line_id.to_string(),
                payer: *payer,
                hcpcs: hcpcs.clone(),
                product: product.name.clone(),
            }),
            _ => None,
        }
    }
}

fn has_digits(v: &str) -> bool {
    v.chars().any(|c| c.is_ascii_digit())
}

fn required(errors: &mut FieldErrors, field: &str, value: &str, message: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, message);
        false
    } else {
        true
    }
}

impl OrderForm {
    /// Field-level validation for submitting (not for saving a draft).
    pub fn validate(&self, catalog: &Catalog) -> FieldErrors {
        let mut errors = FieldErrors::new();

        required(&mut errors, "first_name", &self.first_name, "First name is required");
        required(&mut errors, "last_name", &self.last_name, "Last name is required");
        if self.dob.is_none() {
            errors.add("dob", "Date of birth is required");
        }
        if required(&mut errors, "phone", self.phone.expose(), "Phone is required") && !has_digits(self.phone.expose()) {
            errors.add("phone", "Phone must be a number");
        }

        if !self.self_pay {
            required(&mut errors, "insurance_id", self.insurance_id.expose(), "Insurance ID is required");
            if required(&mut errors, "payer", &self.payer, "Payer is required") && self.payer.trim().parse::<Payer>().is_err() {
                errors.add("payer", "Payer must be one of Medicare, BCBS, Aetna");
            }
            if required(&mut errors, "group_number", &self.group_number, "Group number is required")
                && !has_digits(&self.group_number)
            {
                errors.add("group_number", "Group number must be a number");
            }
        }

        required(&mut errors, "address", &self.address, "Address is required");
        required(&mut errors, "city", &self.city, "City is required");
        required(&mut errors, "state", &self.state, "State is required");
        if required(&mut errors, "zip", &self.zip, "ZIP is required") && !has_digits(&self.zip) {
            errors.add("zip", "ZIP must be a number");
        }

        if self.line_items.is_empty() {
            errors.add("line_items", "Add at least one line item");
        } else {
            if self
                .line_items
                .iter()
                .any(|li| li.product_id.trim().is_empty() || catalog.product(li.product_id.trim()).is_none())
            {
                errors.add("line_items", "Each line item must have a product selected");
            }
            if self.line_items.iter().any(|li| li.qty == 0) {
                errors.add("line_items", "Quantity must be at least 1");
            }
        }

        errors
    }

    pub fn pricing_context(&self) -> PricingContext {
        if self.self_pay {
            PricingContext::self_pay()
        } else {
            PricingContext {
                payer: self.payer.trim().parse().ok(),
                self_pay: false,
            }
        }
    }

    /// Build a priced order (id left empty) with the given status. Lines whose
    /// product is unknown are kept blank, which only happens for drafts.
    pub fn to_order(&self, catalog: &Catalog, status: OrderStatus) -> (Order, Vec<MissingFeeSchedule>) {
        let context = self.pricing_context();
        let mut missing = Vec::new();

        let line_items = self
            .line_items
            .iter()
            .enumerate()
            .map(|(idx, input)| {
                let id = format!("LI-{}", idx + 1);
                match catalog.product(input.product_id.trim()) {
                    Some(product) => {
                        let pricing = catalog.price(context, product);
                        missing.extend(MissingFeeSchedule::from_pricing(&id, product, &pricing));
                        LineItem::from_product(id, product, input.qty, &pricing)
                    }
                    None => LineItem::blank(id, input.qty),
                }
            })
            .collect();

        let mut order = Order {
            id: String::new(),
            patient: format!("{} {}", self.first_name.trim(), self.last_name.trim())
                .trim()
                .to_string(),
            payer: context.payer,
            self_pay: self.self_pay,
            status,
            total_allowed_cents: 0,
            margin_percent: 0.0,
            updated: Utc::now().date_naive(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            zip: self.zip.trim().to_string(),
            phone: Masked::new(self.phone.expose().trim().to_string()),
            dob: self.dob.clone(),
            insurance_id: if self.self_pay {
                Masked::default()
            } else {
                Masked::new(self.insurance_id.expose().trim().to_string())
            },
            group_number: if self.self_pay {
                "N/A".to_string()
            } else {
                self.group_number.trim().to_string()
            },
            line_items,
            notes: Vec::new(),
            rejection_reason: None,
        };
        order.recalculate();

        (order, missing)
    }

    /// Prefill the form from an existing order ("continue" / "edit").
    pub fn from_order(order: &Order, catalog: &Catalog) -> Self {
        let mut parts = order.patient.split_whitespace();
        let first_name = parts.next().unwrap_or_default().to_string();
        let last_name = parts.collect::<Vec<_>>().join(" ");

        let line_items = order
            .line_items
            .iter()
            .map(|li| LineItemInput {
                product_id: catalog
                    .product_for_line(li.product_id.as_deref(), &li.product, &li.hcpcs)
                    .map(|p| p.id.clone())
                    .unwrap_or_default(),
                qty: li.qty,
            })
            .collect();

        Self {
            first_name,
            last_name,
            dob: order.dob.clone(),
            phone: order.phone.clone(),
            self_pay: order.self_pay,
            payer: if order.self_pay {
                String::new()
            } else {
                order.payer.map(|p| p.to_string()).unwrap_or_default()
            },
            insurance_id: order.insurance_id.clone(),
            group_number: if order.group_number == "N/A" {
                String::new()
            } else {
                order.group_number.clone()
            },
            address: order.address.clone(),
            city: order.city.clone(),
            state: order.state.clone(),
            zip: order.zip.clone(),
            line_items,
        }
    }
}
