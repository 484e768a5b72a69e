use medsupply_catalog::Catalog;
use medsupply_shared::Payer;
use serde::Serialize;
use tracing::{debug, info};

use crate::intake::MissingFeeSchedule;
use crate::models::{LineItem, Order};

/// Outcome of an edit that touched one line
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LineChange {
    pub line_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fee_schedule: Option<MissingFeeSchedule>,
}

/// Handles edits to draft and rejected orders
pub struct ChangeHandler;

impl ChangeHandler {
    /// Switch payer or self-pay and reprice every line
    pub fn set_coverage(
        order: &mut Order,
        catalog: &Catalog,
        payer: Option<Payer>,
        self_pay: bool,
    ) -> Result<Vec<MissingFeeSchedule>, ChangeError> {
        Self::ensure_modifiable(order)?;

        order.payer = if self_pay { None } else { payer };
        order.self_pay = self_pay;
        let missing = Self::reprice(order, catalog);
        order.touch();

        info!("Order {} coverage changed to {}", order.id, order.payer_label());
        Ok(missing)
    }

    /// Append a line, blank or with a product already chosen
    pub fn add_line(
        order: &mut Order,
        catalog: &Catalog,
        product_id: Option<&str>,
        qty: u32,
    ) -> Result<LineChange, ChangeError> {
        Self::ensure_modifiable(order)?;
        if qty == 0 {
            return Err(ChangeError::InvalidQuantity);
        }

        let product_id = product_id.map(str::trim).filter(|id| !id.is_empty());
        if let Some(id) = product_id {
            if catalog.product(id).is_none() {
                return Err(ChangeError::ProductNotFound(id.to_string()));
            }
        }

        let line_id = order.next_line_id();
        order.line_items.push(LineItem::blank(line_id.clone(), qty));

        match product_id {
            Some(id) => Self::set_line(order, catalog, &line_id, id, qty),
            None => {
                order.touch();
                Ok(LineChange {
                    line_id,
                    missing_fee_schedule: None,
                })
            }
        }
    }

    /// Select a product and quantity for a line and price it for the order's coverage
    pub fn set_line(
        order: &mut Order,
        catalog: &Catalog,
        line_id: &str,
        product_id: &str,
        qty: u32,
    ) -> Result<LineChange, ChangeError> {
        Self::ensure_modifiable(order)?;
        if qty == 0 {
            return Err(ChangeError::InvalidQuantity);
        }

        let product = catalog
            .product(product_id.trim())
            .ok_or_else(|| ChangeError::ProductNotFound(product_id.to_string()))?;
        let pricing = catalog.price(order.pricing_context(), product);

        let item = order
            .line_mut(line_id)
            .ok_or_else(|| ChangeError::ItemNotFound(line_id.to_string()))?;
        item.set_product(product, &pricing);
        item.qty = qty;

        order.recalculate();
        order.touch();

        Ok(LineChange {
            line_id: line_id.to_string(),
            missing_fee_schedule: MissingFeeSchedule::from_pricing(line_id, product, &pricing),
        })
    }

    /// Drop a line's product but keep the row
    pub fn clear_line(order: &mut Order, line_id: &str) -> Result<(), ChangeError> {
        Self::ensure_modifiable(order)?;

        order
            .line_mut(line_id)
            .ok_or_else(|| ChangeError::ItemNotFound(line_id.to_string()))?
            .clear();

        order.recalculate();
        order.touch();
        Ok(())
    }

    pub fn remove_line(order: &mut Order, line_id: &str) -> Result<LineItem, ChangeError> {
        Self::ensure_modifiable(order)?;

        let idx = order
            .line_items
            .iter()
            .position(|li| li.id == line_id)
            .ok_or_else(|| ChangeError::ItemNotFound(line_id.to_string()))?;
        let removed = order.line_items.remove(idx);

        order.recalculate();
        order.touch();
        Ok(removed)
    }

    /// Re-derive allowed and patient share on every line with a known product.
    /// Lines whose product cannot be found keep their stored prices.
    pub fn reprice(order: &mut Order, catalog: &Catalog) -> Vec<MissingFeeSchedule> {
        let context = order.pricing_context();
        let mut missing = Vec::new();

        for item in order.line_items.iter_mut() {
            let Some(product) = catalog.product_for_line(item.product_id.as_deref(), &item.product, &item.hcpcs) else {
                if item.has_product() {
                    debug!("Line {} ({}) has no catalog product, keeping prices", item.id, item.hcpcs);
                }
                continue;
            };
            let pricing = catalog.price(context, product);
            item.apply_pricing(&pricing);
            missing.extend(MissingFeeSchedule::from_pricing(&item.id, product, &pricing));
        }

        order.recalculate();
        missing
    }

    fn ensure_modifiable(order: &Order) -> Result<(), ChangeError> {
        if order.status.is_editable() {
            Ok(())
        } else {
            Err(ChangeError::OrderNotModifiable(order.id.clone()))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChangeError {
    #[error("Order not modifiable: {0}")]
    OrderNotModifiable(String),

    #[error("Line item not found: {0}")]
    ItemNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Quantity must be at least 1")]
    InvalidQuantity,
}
