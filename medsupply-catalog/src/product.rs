use medsupply_shared::{parse_amount, AmountError, FieldErrors};
use serde::{Deserialize, Serialize};

/// A billable piece of equipment in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub hcpcs: String,
    pub vendor: String,
    pub cost_cents: i64,
    /// List price, charged as-is to self-pay patients
    pub msrp_cents: i64,
    pub requires_approval: bool,
    pub requires_measurement: bool,
}

/// Add-product form as typed by an admin. Amounts arrive as text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hcpcs: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub cost: String,
    #[serde(default)]
    pub msrp: String,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub requires_measurement: bool,
}

impl NewProduct {
    /// Validate the form and build a product with the given id.
    pub fn into_product(self, id: String) -> Result<Product, FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", "Product name is required");
        }
        if self.hcpcs.trim().is_empty() {
            errors.add("hcpcs", "HCPCS code is required");
        }
        if self.vendor.trim().is_empty() {
            errors.add("vendor", "Vendor is required");
        }
        let cost = amount_field(&mut errors, "cost", "Cost", &self.cost);
        let msrp = amount_field(&mut errors, "msrp", "MSRP", &self.msrp);

        errors.into_result(())?;

        Ok(Product {
            id,
            name: self.name.trim().to_string(),
            hcpcs: self.hcpcs.trim().to_string(),
            vendor: self.vendor.trim().to_string(),
            cost_cents: cost,
            msrp_cents: msrp,
            requires_approval: self.requires_approval,
            requires_measurement: self.requires_measurement,
        })
    }
}

/// Parse a required, non-negative amount; records an error and yields 0 on failure.
pub(crate) fn amount_field(errors: &mut FieldErrors, field: &str, label: &str, raw: &str) -> i64 {
    match parse_amount(raw) {
        Ok(cents) => cents,
        Err(AmountError::Empty) => {
            errors.add(field, format!("{} is required", label));
            0
        }
        Err(AmountError::TooLarge(_)) => {
            errors.add(field, format!("{} is too large", label));
            0
        }
        Err(_) => {
            errors.add(field, format!("{} must be a number ≥ 0", label));
            0
        }
    }
}
