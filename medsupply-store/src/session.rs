//! Session-scoped key-value storage.
//!
//! Generated documents, attachments, rejections and the pending order form
//! live here as JSON values under fixed keys. Reads never fail: a missing or
//! unreadable value is treated as empty.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use medsupply_order::{Order, OrderForm, OrderStatus};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

pub const DOCS_READY_KEY: &str = "medsupply-docs-ready-order-ids";
pub const ATTACHMENTS_KEY: &str = "medsupply-order-attachments";
pub const REJECTIONS_KEY: &str = "medsupply-rejected-orders";
pub const ORDER_DRAFT_KEY: &str = "orderDraft";

const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

/// Raw string storage behind the session
pub trait SessionBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
    fn clear(&self);
}

#[derive(Default)]
pub struct MemorySessionBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl SessionBackend for MemorySessionBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: usize,
    /// Base64 file content
    pub content: String,
}

/// An attachment as uploaded. Files already stored keep their id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachmentUpload {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectionRecord {
    #[serde(rename = "rejectionReason")]
    pub rejection_reason: String,
}

/// Files that passed and files that were turned away, with the reason
#[derive(Debug, Clone, Default, Serialize)]
pub struct AttachmentReport {
    pub stored: Vec<Attachment>,
    pub rejected: Vec<RejectedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("{0}: PDF or Word only")]
    UnsupportedType(String),

    #[error("File too large: {name} (max {max_mb}MB)")]
    TooLarge { name: String, max_mb: usize },

    #[error("Failed to read {0}")]
    InvalidContent(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to encode session value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Typed access to the session records
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    max_attachment_bytes: usize,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>, max_attachment_bytes: usize) -> Self {
        Self {
            backend,
            max_attachment_bytes,
        }
    }

    pub fn in_memory(max_attachment_bytes: usize) -> Self {
        Self::new(Arc::new(MemorySessionBackend::default()), max_attachment_bytes)
    }

    /// Decoded size limit for one attachment
    pub fn max_attachment_bytes(&self) -> usize {
        self.max_attachment_bytes
    }

    fn read<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let Some(raw) = self.backend.get(key) else {
            return T::default();
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring malformed session value for {}: {}", key, e);
                T::default()
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SessionError> {
        self.backend.set(key, serde_json::to_string(value)?);
        Ok(())
    }

    pub fn docs_ready_ids(&self) -> Vec<String> {
        self.read(DOCS_READY_KEY)
    }

    pub fn mark_docs_ready(&self, order_id: &str) -> Result<(), SessionError> {
        let mut ids = self.docs_ready_ids();
        if !ids.iter().any(|id| id == order_id) {
            ids.push(order_id.to_string());
            self.write(DOCS_READY_KEY, &ids)?;
        }
        Ok(())
    }

    pub fn rejections(&self) -> BTreeMap<String, RejectionRecord> {
        self.read(REJECTIONS_KEY)
    }

    pub fn record_rejection(&self, order_id: &str, reason: &str) -> Result<(), SessionError> {
        let mut records = self.rejections();
        records.insert(
            order_id.to_string(),
            RejectionRecord {
                rejection_reason: reason.to_string(),
            },
        );
        self.write(REJECTIONS_KEY, &records)
    }

    pub fn clear_rejection(&self, order_id: &str) -> Result<(), SessionError> {
        let mut records = self.rejections();
        if records.remove(order_id).is_some() {
            self.write(REJECTIONS_KEY, &records)?;
        }
        Ok(())
    }

    /// Apply session state to an order read from the book: generated documents
    /// read as `Docs Ready`, then a recorded rejection reads as `Action Required`.
    pub fn overlay(&self, order: &mut Order) {
        if self.docs_ready_ids().iter().any(|id| id == &order.id) {
            order.status = OrderStatus::DocsReady;
        }
        if let Some(record) = self.rejections().remove(&order.id) {
            order.status = OrderStatus::ActionRequired;
            order.rejection_reason = Some(record.rejection_reason);
        }
    }

    pub fn attachments(&self, order_id: &str) -> Vec<Attachment> {
        let mut all: BTreeMap<String, Vec<Attachment>> = self.read(ATTACHMENTS_KEY);
        all.remove(order_id).unwrap_or_default()
    }

    /// Replace an order's attachments. Invalid files are reported and skipped.
    pub fn set_attachments(&self, order_id: &str, uploads: Vec<AttachmentUpload>) -> Result<AttachmentReport, SessionError> {
        let mut report = AttachmentReport::default();

        for upload in uploads {
            let name = upload.name.clone();
            match self.check_attachment(upload) {
                Ok(attachment) => report.stored.push(attachment),
                Err(e) => {
                    warn!("Attachment rejected for {}: {}", order_id, e);
                    report.rejected.push(RejectedFile {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut all: BTreeMap<String, Vec<Attachment>> = self.read(ATTACHMENTS_KEY);
        all.insert(order_id.to_string(), report.stored.clone());
        self.write(ATTACHMENTS_KEY, &all)?;

        info!("{} attachment(s) stored for {}", report.stored.len(), order_id);
        Ok(report)
    }

    fn check_attachment(&self, upload: AttachmentUpload) -> Result<Attachment, AttachmentError> {
        let ext = upload
            .name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AttachmentError::UnsupportedType(upload.name));
        }

        let bytes = STANDARD
            .decode(upload.content.trim())
            .map_err(|_| AttachmentError::InvalidContent(upload.name.clone()))?;
        if bytes.len() > self.max_attachment_bytes {
            return Err(AttachmentError::TooLarge {
                name: upload.name,
                max_mb: self.max_attachment_bytes / (1024 * 1024),
            });
        }

        Ok(Attachment {
            id: upload
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("att-{}", Uuid::new_v4().simple())),
            name: upload.name,
            mime_type: upload.mime_type,
            size: bytes.len(),
            content: upload.content.trim().to_string(),
        })
    }

    /// Order form parked while the user creates a missing fee schedule
    pub fn order_draft(&self) -> Option<OrderForm> {
        self.read(ORDER_DRAFT_KEY)
    }

    pub fn save_order_draft(&self, form: &OrderForm) -> Result<(), SessionError> {
        self.write(ORDER_DRAFT_KEY, form)
    }

    pub fn clear_order_draft(&self) {
        self.backend.remove(ORDER_DRAFT_KEY);
    }

    pub fn clear(&self) {
        self.backend.clear();
        info!("Session cleared");
    }
}
