use chrono::NaiveDate;
use medsupply_shared::Masked;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::models::{LineItem, Order, OrderStatus};

/// Printable documents generated for an order
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Encounter,
    Invoice,
    Pod,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [DocumentKind::Encounter, DocumentKind::Invoice, DocumentKind::Pod];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Encounter => "encounter",
            DocumentKind::Invoice => "invoice",
            DocumentKind::Pod => "pod",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DocumentKind::Encounter => "Encounter Form",
            DocumentKind::Invoice => "Patient Invoice",
            DocumentKind::Pod => "Proof of Delivery",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DocumentKind::Encounter => "Clinical encounter documentation with diagnosis and prescription details.",
            DocumentKind::Invoice => "Itemized invoice for patient with allowed amounts and co-pay breakdown.",
            DocumentKind::Pod => "Delivery confirmation form with patient acknowledgment and signature.",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DocumentError::UnknownKind(s.to_string()))
    }
}

/// Entry in an order's document list
#[derive(Debug, Clone, Serialize)]
pub struct DocumentLink {
    pub kind: DocumentKind,
    pub title: &'static str,
    pub description: &'static str,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DocumentItem {
    pub product: String,
    pub hcpcs: String,
    pub qty: u32,
}

impl From<&LineItem> for DocumentItem {
    fn from(li: &LineItem) -> Self {
        Self {
            product: li.product.clone(),
            hcpcs: li.hcpcs.clone(),
            qty: li.qty,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EncounterForm {
    pub order_id: String,
    pub date: NaiveDate,
    pub patient: String,
    pub dob: Option<Masked<NaiveDate>>,
    pub payer: String,
    pub insurance_id: Masked<String>,
    pub items: Vec<DocumentItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InvoiceLine {
    pub product: String,
    pub hcpcs: String,
    pub qty: u32,
    pub allowed_cents: i64,
    pub patient_share_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientInvoice {
    pub order_id: String,
    pub date: NaiveDate,
    pub bill_to: BillTo,
    pub insurance: InsuranceBlock,
    pub lines: Vec<InvoiceLine>,
    pub total_allowed_cents: i64,
    pub insurance_pays_cents: i64,
    pub patient_responsibility_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillTo {
    pub patient: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsuranceBlock {
    pub payer: String,
    pub insurance_id: Masked<String>,
    pub group_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProofOfDelivery {
    pub order_id: String,
    pub date: NaiveDate,
    pub patient: String,
    pub phone: Masked<String>,
    pub delivery_address: String,
    pub items: Vec<DocumentItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Document {
    Encounter(EncounterForm),
    Invoice(PatientInvoice),
    Pod(ProofOfDelivery),
}

/// Renders order documents once they have been generated
pub struct DocumentService;

impl DocumentService {
    /// Document links for an order, empty until its documents are generated
    pub fn available(order: &Order) -> Vec<DocumentLink> {
        if order.status != OrderStatus::DocsReady {
            return Vec::new();
        }
        DocumentKind::ALL
            .into_iter()
            .map(|kind| DocumentLink {
                kind,
                title: kind.title(),
                description: kind.description(),
                href: format!("/v1/orders/{}/documents/{}", order.id, kind),
            })
            .collect()
    }

    pub fn render(order: &Order, kind: DocumentKind) -> Result<Document, DocumentError> {
        if order.status != OrderStatus::DocsReady {
            return Err(DocumentError::NotGenerated(order.id.clone()));
        }

        let doc = match kind {
            DocumentKind::Encounter => Document::Encounter(Self::encounter(order)),
            DocumentKind::Invoice => Document::Invoice(Self::invoice(order)),
            DocumentKind::Pod => Document::Pod(Self::proof_of_delivery(order)),
        };
        Ok(doc)
    }

    fn encounter(order: &Order) -> EncounterForm {
        EncounterForm {
            order_id: order.id.clone(),
            date: order.updated,
            patient: order.patient.clone(),
            dob: order.dob.clone(),
            payer: order.payer_label(),
            insurance_id: order.insurance_id.clone(),
            items: order.line_items.iter().map(DocumentItem::from).collect(),
        }
    }

    fn invoice(order: &Order) -> PatientInvoice {
        let totals = order.totals();
        let lines = order
            .line_items
            .iter()
            .map(|li| InvoiceLine {
                product: li.product.clone(),
                hcpcs: li.hcpcs.clone(),
                qty: li.qty,
                allowed_cents: li.allowed_cents * li.qty as i64,
                patient_share_cents: li.patient_share_cents * li.qty as i64,
            })
            .collect();

        PatientInvoice {
            order_id: order.id.clone(),
            date: order.updated,
            bill_to: BillTo {
                patient: order.patient.clone(),
                address: order.address.clone(),
                city: order.city.clone(),
                state: order.state.clone(),
                zip: order.zip.clone(),
            },
            insurance: InsuranceBlock {
                payer: order.payer_label(),
                insurance_id: order.insurance_id.clone(),
                group_number: order.group_number.clone(),
            },
            lines,
            total_allowed_cents: totals.total_allowed_cents,
            insurance_pays_cents: totals.insurance_pays_cents(),
            patient_responsibility_cents: totals.total_patient_share_cents,
        }
    }

    fn proof_of_delivery(order: &Order) -> ProofOfDelivery {
        ProofOfDelivery {
            order_id: order.id.clone(),
            date: order.updated,
            patient: order.patient.clone(),
            phone: order.phone.clone(),
            delivery_address: format!("{}, {}, {} {}", order.address, order.city, order.state, order.zip),
            items: order.line_items.iter().map(DocumentItem::from).collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Documents have not been generated for order {0}")]
    NotGenerated(String),

    #[error("Unknown document: {0}")]
    UnknownKind(String),
}
