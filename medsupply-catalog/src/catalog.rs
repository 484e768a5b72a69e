use medsupply_shared::{FieldErrors, Payer};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::fee_schedule::{FeeSchedule, FeeScheduleError, FeeScheduleTable, PatientShareDefaults};
use crate::pricing::{LinePricing, PricingContext, PricingResolver};
use crate::product::{amount_field, NewProduct, Product};

/// Reference data: products and payer fee schedules
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    fee_schedules: FeeScheduleTable,
    share_defaults: PatientShareDefaults,
}

/// Add-fee-schedule form. Payer and amount arrive as text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFeeSchedule {
    #[serde(default)]
    pub payer: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub allowed_amount: String,
}

/// Form prefill when redirected from a "no fee schedule" prompt
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FeeSchedulePrefill {
    pub payer: Payer,
    pub product_id: Option<String>,
    pub patient_share_percent: u32,
}

impl Catalog {
    pub fn new(
        products: Vec<Product>,
        fee_schedules: FeeScheduleTable,
        share_defaults: PatientShareDefaults,
    ) -> Self {
        Self {
            products,
            fee_schedules,
            share_defaults,
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn product_by_hcpcs(&self, hcpcs: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.hcpcs == hcpcs)
    }

    /// Find the product behind a denormalized line item: by id when known,
    /// otherwise by matching name or HCPCS code.
    pub fn product_for_line(&self, product_id: Option<&str>, name: &str, hcpcs: &str) -> Option<&Product> {
        if let Some(p) = product_id.and_then(|id| self.product(id)) {
            return Some(p);
        }
        self.products
            .iter()
            .find(|p| (!name.is_empty() && p.name == name) || (!hcpcs.is_empty() && p.hcpcs == hcpcs))
    }

    pub fn fee_schedules(&self) -> &FeeScheduleTable {
        &self.fee_schedules
    }

    pub fn share_defaults(&self) -> &PatientShareDefaults {
        &self.share_defaults
    }

    pub fn resolver(&self) -> PricingResolver<'_> {
        PricingResolver::new(&self.fee_schedules)
    }

    pub fn price(&self, context: PricingContext, product: &Product) -> LinePricing {
        self.resolver().resolve(context, product)
    }

    fn next_product_id(&self) -> String {
        let max = self
            .products
            .iter()
            .filter_map(|p| p.id.strip_prefix("P-"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("P-{}", max + 1)
    }

    pub fn add_product(&mut self, form: NewProduct) -> Result<Product, CatalogError> {
        let product = form.into_product(self.next_product_id())?;
        info!("Product added: {} ({}) {}", product.id, product.hcpcs, product.name);
        self.products.push(product.clone());
        Ok(product)
    }

    pub fn add_fee_schedule(&mut self, form: NewFeeSchedule) -> Result<FeeSchedule, CatalogError> {
        let mut errors = FieldErrors::new();

        let payer = if form.payer.trim().is_empty() {
            errors.add("payer", "Payer is required");
            None
        } else {
            match form.payer.trim().parse::<Payer>() {
                Ok(p) => Some(p),
                Err(_) => {
                    errors.add("payer", "Payer is required");
                    None
                }
            }
        };

        let product = if form.product_id.trim().is_empty() {
            errors.add("product_id", "Product is required");
            None
        } else {
            let found = self.product(form.product_id.trim());
            if found.is_none() {
                errors.add("product_id", "Product is required");
            }
            found
        };

        let allowed = amount_field(&mut errors, "allowed_amount", "Allowed amount", &form.allowed_amount);

        let (payer, product) = match (payer, product) {
            (Some(payer), Some(product)) if errors.is_empty() => (payer, product),
            _ => return Err(CatalogError::Invalid(errors)),
        };

        let entry = FeeSchedule {
            id: self.fee_schedules.next_id(),
            payer,
            hcpcs: product.hcpcs.clone(),
            allowed_cents: allowed,
            patient_share_percent: self.share_defaults.percent_for(payer),
        };
        self.fee_schedules.insert(entry.clone())?;

        info!(
            "Fee schedule added: {} {} / {} allowed {} cents",
            entry.id, entry.payer, entry.hcpcs, entry.allowed_cents
        );
        Ok(entry)
    }

    /// Prefill for the add-fee-schedule form from `payer` / `hcpcs` query values.
    /// An unknown payer yields no prefill at all.
    pub fn fee_schedule_prefill(&self, payer: Option<&str>, hcpcs: Option<&str>) -> Option<FeeSchedulePrefill> {
        let payer: Payer = payer?.parse().ok()?;
        let product_id = hcpcs
            .and_then(|code| self.product_by_hcpcs(code))
            .map(|p| p.id.clone());

        Some(FeeSchedulePrefill {
            payer,
            product_id,
            patient_share_percent: self.share_defaults.percent_for(payer),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error(transparent)]
    FeeSchedule(#[from] FeeScheduleError),

    #[error("Invalid form: {0}")]
    Invalid(FieldErrors),
}

impl From<FieldErrors> for CatalogError {
    fn from(errors: FieldErrors) -> Self {
        CatalogError::Invalid(errors)
    }
}
