use serde::Serialize;
use std::collections::BTreeMap;

/// Field-level form errors.
///
/// Keeps the first message reported for each field plus every message in
/// report order, so callers can show inline errors and a short summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    fields: BTreeMap<String, String>,
    #[serde(skip)]
    messages: Vec<String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| message.clone());
        self.messages.push(message);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Unique messages in report order, at most `limit`, joined with ". ".
    /// A trailing ellipsis marks a truncated list.
    pub fn summary(&self, limit: usize) -> String {
        let mut unique: Vec<&str> = Vec::new();
        for m in &self.messages {
            if !unique.contains(&m.as_str()) {
                unique.push(m);
            }
        }

        let mut out = unique
            .iter()
            .take(limit)
            .copied()
            .collect::<Vec<_>>()
            .join(". ");
        if unique.len() > limit {
            out.push_str(" …");
        }
        out
    }

    /// `Ok(value)` when nothing was reported.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary(usize::MAX))
    }
}
