use medsupply_catalog::Catalog;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::changes::ChangeError;
use crate::intake::{MissingFeeSchedule, OrderForm, SUMMARY_LIMIT};
use crate::models::{Note, Order, OrderStatus};
use medsupply_shared::FieldErrors;

/// Author recorded on rejection notes
pub const REJECTION_AUTHOR: &str = "Manager";

/// Result of submitting an order: the stored order and any lines that
/// could not be priced for lack of a fee schedule
#[derive(Debug, Clone, serde::Serialize)]
pub struct Submission {
    pub order: Order,
    pub missing_fee_schedules: Vec<MissingFeeSchedule>,
}

/// Manages order lifecycle and state transitions
pub struct OrderManager {
    orders: BTreeMap<String, Order>,
}

impl OrderManager {
    pub fn new() -> Self {
        Self {
            orders: BTreeMap::new(),
        }
    }

    /// Load existing orders. Totals and margins are recomputed from line
    /// items so the stored figures always agree with them.
    pub fn with_orders(orders: Vec<Order>) -> Self {
        let mut manager = Self::new();
        for mut order in orders {
            order.recalculate();
            manager.orders.insert(key(&order.id), order);
        }
        manager
    }

    /// Case-insensitive lookup
    pub fn get_order(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(&key(order_id))
    }

    pub fn list(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn next_order_id(&self) -> String {
        let max = self
            .orders
            .keys()
            .filter_map(|k| k.strip_prefix("ORD-"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(1000);
        format!("ORD-{}", max + 1)
    }

    fn store(&mut self, mut order: Order) -> Order {
        if order.id.is_empty() {
            order.id = self.next_order_id();
        }
        self.orders.insert(key(&order.id), order.clone());
        order
    }

    /// Validate and create an order. Initial status follows the approval rule.
    pub fn submit(&mut self, form: &OrderForm, catalog: &Catalog) -> Result<Submission, OrderError> {
        let errors = form.validate(catalog);
        if !errors.is_empty() {
            return Err(OrderError::Invalid(errors));
        }

        let (mut order, missing) = form.to_order(catalog, OrderStatus::Draft);
        order.status = initial_status(&order, catalog);
        let order = self.store(order);

        info!("Order {} submitted as {}", order.id, order.status);
        log_missing(&order.id, &missing);
        Ok(Submission {
            order,
            missing_fee_schedules: missing,
        })
    }

    /// Store the form as a draft without validation
    pub fn save_draft(&mut self, form: &OrderForm, catalog: &Catalog) -> Submission {
        let (order, missing) = form.to_order(catalog, OrderStatus::Draft);
        let order = self.store(order);

        info!("Draft order {} saved", order.id);
        Submission {
            order,
            missing_fee_schedules: missing,
        }
    }

    /// Replace an editable order's form data. Status, notes and id are kept.
    pub fn update_form(&mut self, order_id: &str, form: &OrderForm, catalog: &Catalog) -> Result<Submission, OrderError> {
        let order = self.get_order_mut(order_id)?;
        if !order.status.is_editable() {
            return Err(ChangeError::OrderNotModifiable(order.id.clone()).into());
        }

        let (mut updated, missing) = form.to_order(catalog, order.status);
        updated.id = order.id.clone();
        updated.notes = std::mem::take(&mut order.notes);
        updated.rejection_reason = order.rejection_reason.take();
        *order = updated;

        Ok(Submission {
            order: order.clone(),
            missing_fee_schedules: missing,
        })
    }

    /// Transition: Draft / Action Required → Needs Approval or Approved.
    /// The order's current data must pass intake validation.
    pub fn resubmit(&mut self, order_id: &str, catalog: &Catalog) -> Result<Submission, OrderError> {
        let order = self.get_order_mut(order_id)?;
        if !order.status.is_editable() {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::NeedsApproval,
            });
        }

        let form = OrderForm::from_order(order, catalog);
        let errors = form.validate(catalog);
        if !errors.is_empty() {
            return Err(OrderError::Invalid(errors));
        }

        let missing = crate::changes::ChangeHandler::reprice(order, catalog);
        order.rejection_reason = None;
        let next = initial_status(order, catalog);
        order.update_status(next);

        info!("Order {} resubmitted as {}", order.id, order.status);
        log_missing(&order.id, &missing);
        Ok(Submission {
            order: order.clone(),
            missing_fee_schedules: missing,
        })
    }

    /// Transition: Needs Approval → Approved
    pub fn approve(&mut self, order_id: &str) -> Result<&Order, OrderError> {
        let order = self.get_order_mut(order_id)?;

        if order.status != OrderStatus::NeedsApproval {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Approved,
            });
        }

        order.update_status(OrderStatus::Approved);
        info!("Order {} approved", order.id);
        Ok(&*order)
    }

    /// Transition: Needs Approval / Approved → Action Required.
    /// A blank reason leaves the order untouched.
    pub fn reject(&mut self, order_id: &str, reason: &str) -> Result<&Order, OrderError> {
        let reason = reason.trim();
        let order = self.get_order_mut(order_id)?;

        if reason.is_empty() {
            return Err(OrderError::EmptyRejectionReason);
        }
        if !order.status.is_active() {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::ActionRequired,
            });
        }

        order.rejection_reason = Some(reason.to_string());
        order.add_note(REJECTION_AUTHOR, &format!("Order rejected: {}", reason));
        order.update_status(OrderStatus::ActionRequired);
        info!("Order {} rejected", order.id);
        Ok(&*order)
    }

    /// Transition: Approved → Docs Ready
    pub fn generate_documents(&mut self, order_id: &str) -> Result<&Order, OrderError> {
        let order = self.get_order_mut(order_id)?;

        if order.status != OrderStatus::Approved {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::DocsReady,
            });
        }

        order.update_status(OrderStatus::DocsReady);
        info!("Documents generated for order {}", order.id);
        Ok(&*order)
    }

    pub fn add_note(&mut self, order_id: &str, author: &str, text: &str) -> Result<Note, OrderError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OrderError::EmptyNote);
        }
        let order = self.get_order_mut(order_id)?;
        let author = if author.trim().is_empty() { "You" } else { author.trim() };
        Ok(order.add_note(author, text).clone())
    }

    /// Run an edit against an editable order and return the updated copy
    pub fn edit<T>(
        &mut self,
        order_id: &str,
        f: impl FnOnce(&mut Order) -> Result<T, ChangeError>,
    ) -> Result<(Order, T), OrderError> {
        let order = self.get_order_mut(order_id)?;
        let out = f(&mut *order)?;
        Ok((order.clone(), out))
    }

    /// Helper to get mutable order reference
    fn get_order_mut(&mut self, order_id: &str) -> Result<&mut Order, OrderError> {
        self.orders
            .get_mut(&key(order_id))
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }
}

impl Default for OrderManager {
    fn default() -> Self {
        Self::new()
    }
}

fn key(order_id: &str) -> String {
    order_id.trim().to_ascii_uppercase()
}

fn log_missing(order_id: &str, missing: &[MissingFeeSchedule]) {
    for m in missing {
        warn!(
            "Order {} line {}: no {} fee schedule for {} ({})",
            order_id, m.line_id, m.payer, m.hcpcs, m.product
        );
    }
}

/// `Needs Approval` when any line's product requires approval, else `Approved`
pub fn initial_status(order: &Order, catalog: &Catalog) -> OrderStatus {
    let needs_approval = order.line_items.iter().any(|li| {
        catalog
            .product_for_line(li.product_id.as_deref(), &li.product, &li.hcpcs)
            .map(|p| p.requires_approval)
            .unwrap_or(false)
    });

    if needs_approval {
        OrderStatus::NeedsApproval
    } else {
        OrderStatus::Approved
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Please provide a reason for rejection")]
    EmptyRejectionReason,

    #[error("Note text is empty")]
    EmptyNote,

    #[error("Please fix the form: {}", .0.summary(SUMMARY_LIMIT))]
    Invalid(FieldErrors),

    #[error(transparent)]
    Change(#[from] ChangeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::tests::{catalog, form};

    #[test]
    fn test_order_lifecycle() {
        let c = catalog();
        let mut manager = OrderManager::new();

        // Wheelchair requires approval
        let submission = manager.submit(&form("Medicare", &[("P-1", 1)]), &c).unwrap();
        let order_id = submission.order.id.clone();
        assert_eq!(order_id, "ORD-1001");
        assert_eq!(submission.order.status, OrderStatus::NeedsApproval);

        // Needs Approval → Approved
        manager.approve(&order_id).unwrap();
        assert_eq!(manager.get_order(&order_id).unwrap().status, OrderStatus::Approved);

        // Approved → Docs Ready
        manager.generate_documents(&order_id).unwrap();
        assert_eq!(manager.get_order(&order_id).unwrap().status, OrderStatus::DocsReady);
    }

    #[test]
    fn test_no_approval_items_start_approved() {
        let c = catalog();
        let mut manager = OrderManager::new();
        let submission = manager.submit(&form("Medicare", &[("P-4", 1), ("P-7", 2)]), &c).unwrap();
        assert_eq!(submission.order.status, OrderStatus::Approved);
    }

    #[test]
    fn test_empty_order_starts_approved_with_zero_totals() {
        let c = catalog();
        let order = crate::models::Order {
            line_items: vec![],
            ..form("Medicare", &[("P-4", 1)]).to_order(&c, OrderStatus::Draft).0
        };
        assert_eq!(initial_status(&order, &c), OrderStatus::Approved);
        assert_eq!(order.totals().total_allowed_cents, 0);
        assert_eq!(order.totals().margin_percent, 0.0);
    }

    #[test]
    fn test_submit_rejects_invalid_form() {
        let c = catalog();
        let mut manager = OrderManager::new();
        let err = manager.submit(&form("Medicare", &[]), &c).unwrap_err();
        assert!(matches!(err, OrderError::Invalid(ref e) if e.contains("line_items")));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_invalid_transition() {
        let c = catalog();
        let mut manager = OrderManager::new();
        let order_id = manager.submit(&form("Medicare", &[("P-4", 1)]), &c).unwrap().order.id;

        // Approved cannot be approved again
        let err = manager.approve(&order_id).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition { from: OrderStatus::Approved, to: OrderStatus::Approved }
        ));
    }

    #[test]
    fn test_generate_documents_requires_approval_first() {
        let c = catalog();
        let mut manager = OrderManager::new();
        let order_id = manager.submit(&form("Medicare", &[("P-1", 1)]), &c).unwrap().order.id;

        assert!(manager.generate_documents(&order_id).is_err());
        assert_eq!(manager.get_order(&order_id).unwrap().status, OrderStatus::NeedsApproval);
    }

    #[test]
    fn test_reject_requires_reason() {
        let c = catalog();
        let mut manager = OrderManager::new();
        let order_id = manager.submit(&form("Medicare", &[("P-1", 1)]), &c).unwrap().order.id;

        let err = manager.reject(&order_id, "   ").unwrap_err();
        assert!(matches!(err, OrderError::EmptyRejectionReason));

        let order = manager.get_order(&order_id).unwrap();
        assert_eq!(order.status, OrderStatus::NeedsApproval);
        assert!(order.notes.is_empty());
        assert!(order.rejection_reason.is_none());
    }

    #[test]
    fn test_reject_records_reason_and_note() {
        let c = catalog();
        let mut manager = OrderManager::new();
        let order_id = manager.submit(&form("Medicare", &[("P-1", 1)]), &c).unwrap().order.id;

        let order = manager.reject(&order_id, "  Missing CMN  ").unwrap();
        assert_eq!(order.status, OrderStatus::ActionRequired);
        assert_eq!(order.rejection_reason.as_deref(), Some("Missing CMN"));

        let note = order.notes.last().unwrap();
        assert_eq!(note.author, "Manager");
        assert_eq!(note.text, "Order rejected: Missing CMN");
    }

    #[test]
    fn test_reject_approved_order() {
        let c = catalog();
        let mut manager = OrderManager::new();
        let order_id = manager.submit(&form("Medicare", &[("P-4", 1)]), &c).unwrap().order.id;
        assert_eq!(manager.get_order(&order_id).unwrap().status, OrderStatus::Approved);

        let order = manager.reject(&order_id, "Wrong size").unwrap();
        assert_eq!(order.status, OrderStatus::ActionRequired);
        assert_eq!(order.rejection_reason.as_deref(), Some("Wrong size"));
    }

    #[test]
    fn test_reject_refused_outside_active_states() {
        let c = catalog();
        let mut manager = OrderManager::new();

        let docs_id = manager.submit(&form("Medicare", &[("P-4", 1)]), &c).unwrap().order.id;
        manager.generate_documents(&docs_id).unwrap();
        let draft_id = manager.save_draft(&form("Medicare", &[("P-4", 1)]), &c).order.id;
        let rejected_id = manager.submit(&form("Medicare", &[("P-1", 1)]), &c).unwrap().order.id;
        manager.reject(&rejected_id, "Missing CMN").unwrap();

        for (order_id, status) in [
            (&docs_id, OrderStatus::DocsReady),
            (&draft_id, OrderStatus::Draft),
            (&rejected_id, OrderStatus::ActionRequired),
        ] {
            let notes_before = manager.get_order(order_id).unwrap().notes.len();
            let err = manager.reject(order_id, "Too late").unwrap_err();
            assert!(matches!(
                err,
                OrderError::InvalidTransition { from, to: OrderStatus::ActionRequired } if from == status
            ));

            let order = manager.get_order(order_id).unwrap();
            assert_eq!(order.status, status);
            assert_eq!(order.notes.len(), notes_before);
        }
    }

    #[test]
    fn test_resubmit_recomputes_status() {
        let c = catalog();
        let mut manager = OrderManager::new();
        let order_id = manager.submit(&form("Medicare", &[("P-1", 1)]), &c).unwrap().order.id;
        manager.reject(&order_id, "Wrong chair").unwrap();

        // Swap the wheelchair for a mattress, then resubmit
        manager
            .update_form(&order_id, &form("Medicare", &[("P-4", 1)]), &c)
            .unwrap();
        let submission = manager.resubmit(&order_id, &c).unwrap();

        assert_eq!(submission.order.status, OrderStatus::Approved);
        assert!(submission.order.rejection_reason.is_none());
        assert_eq!(submission.order.notes.len(), 1);
        assert_eq!(submission.order.total_allowed_cents, 30000);
    }

    #[test]
    fn test_resubmit_draft_validates() {
        let c = catalog();
        let mut manager = OrderManager::new();
        let mut incomplete = form("Medicare", &[("P-1", 1)]);
        incomplete.zip = String::new();
        let order_id = manager.save_draft(&incomplete, &c).order.id;

        assert_eq!(manager.get_order(&order_id).unwrap().status, OrderStatus::Draft);
        let err = manager.resubmit(&order_id, &c).unwrap_err();
        assert!(matches!(err, OrderError::Invalid(ref e) if e.contains("zip")));
        assert_eq!(manager.get_order(&order_id).unwrap().status, OrderStatus::Draft);
    }

    #[test]
    fn test_cannot_resubmit_active_order() {
        let c = catalog();
        let mut manager = OrderManager::new();
        let order_id = manager.submit(&form("Medicare", &[("P-1", 1)]), &c).unwrap().order.id;
        assert!(matches!(
            manager.resubmit(&order_id, &c),
            Err(OrderError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let c = catalog();
        let mut manager = OrderManager::new();
        manager.submit(&form("Medicare", &[("P-4", 1)]), &c).unwrap();
        assert!(manager.get_order("ord-1001").is_some());
        assert!(matches!(manager.approve("ORD-9999"), Err(OrderError::NotFound(_))));
    }

    #[test]
    fn test_notes_are_appended_in_order() {
        let c = catalog();
        let mut manager = OrderManager::new();
        let order_id = manager.submit(&form("Medicare", &[("P-4", 1)]), &c).unwrap().order.id;

        manager.add_note(&order_id, "Sarah Kim", "Intake done").unwrap();
        manager.add_note(&order_id, "", "Delivery booked").unwrap();
        assert!(matches!(manager.add_note(&order_id, "x", "  "), Err(OrderError::EmptyNote)));

        let notes = &manager.get_order(&order_id).unwrap().notes;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].text, "Intake done");
        assert_eq!(notes[1].author, "You");
    }

    #[test]
    fn test_with_orders_recomputes_totals() {
        let c = catalog();
        let (mut order, _) = form("Medicare", &[("P-1", 1)]).to_order(&c, OrderStatus::NeedsApproval);
        order.id = "ORD-1001".to_string();
        order.total_allowed_cents = 1;
        order.margin_percent = 38.2;

        let manager = OrderManager::with_orders(vec![order]);
        let stored = manager.get_order("ORD-1001").unwrap();
        assert_eq!(stored.total_allowed_cents, 165000);
        assert_eq!(stored.margin_percent, 85.4);
        assert_eq!(manager.next_order_id(), "ORD-1002");
    }
}
