use medsupply_shared::Payer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Allowed amount a payer reimburses for one HCPCS code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeSchedule {
    pub id: String,
    pub payer: Payer,
    pub hcpcs: String,
    pub allowed_cents: i64,
    pub patient_share_percent: u32,
}

impl FeeSchedule {
    /// Patient share of the allowed amount, rounded to the nearest cent.
    ///
    /// Saturates instead of overflowing on out-of-range stored amounts.
    pub fn patient_share_cents(&self) -> i64 {
        self.allowed_cents
            .saturating_mul(i64::from(self.patient_share_percent))
            .saturating_add(50)
            .div_euclid(100)
    }
}

/// Sparse (payer, HCPCS) → fee schedule table.
///
/// Entries keep insertion order for listing; lookups go through the index.
#[derive(Debug, Clone, Default)]
pub struct FeeScheduleTable {
    entries: Vec<FeeSchedule>,
    index: HashMap<(Payer, String), usize>,
}

impl FeeScheduleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<FeeSchedule>) -> Result<Self, FeeScheduleError> {
        let mut table = Self::new();
        for entry in entries {
            table.insert(entry)?;
        }
        Ok(table)
    }

    /// Add an entry; a second entry for the same payer and code is refused.
    pub fn insert(&mut self, entry: FeeSchedule) -> Result<(), FeeScheduleError> {
        let key = (entry.payer, entry.hcpcs.clone());
        if self.index.contains_key(&key) {
            return Err(FeeScheduleError::Duplicate {
                payer: entry.payer,
                hcpcs: entry.hcpcs,
            });
        }

        self.index.insert(key, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, payer: Payer, hcpcs: &str) -> Option<&FeeSchedule> {
        self.index
            .get(&(payer, hcpcs.to_string()))
            .map(|&i| &self.entries[i])
    }

    pub fn contains(&self, payer: Payer, hcpcs: &str) -> bool {
        self.get(payer, hcpcs).is_some()
    }

    pub fn entries(&self) -> &[FeeSchedule] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Next free `FS-n` identifier.
    pub fn next_id(&self) -> String {
        let max = self
            .entries
            .iter()
            .filter_map(|e| e.id.strip_prefix("FS-"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("FS-{}", max + 1)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeeScheduleError {
    #[error("Fee schedule already exists for {payer} / {hcpcs}")]
    Duplicate { payer: Payer, hcpcs: String },
}

/// Patient share percent applied to newly added fee schedules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientShareDefaults {
    pub fallback_percent: u32,
    pub per_payer: HashMap<Payer, u32>,
}

impl PatientShareDefaults {
    pub fn percent_for(&self, payer: Payer) -> u32 {
        self.per_payer
            .get(&payer)
            .copied()
            .unwrap_or(self.fallback_percent)
    }
}

impl Default for PatientShareDefaults {
    fn default() -> Self {
        Self {
            fallback_percent: 20,
            per_payer: {
                let mut m = HashMap::new();
                m.insert(Payer::Medicare, 20);
                m.insert(Payer::Aetna, 20);
                m.insert(Payer::Bcbs, 15);
                m
            },
        }
    }
}
