use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use medsupply_catalog::{
    FeeSchedule, FeeSchedulePrefill, NewFeeSchedule, NewProduct, PricingContext, PricingOutcome, Product,
};
use medsupply_shared::{format_usd, Payer};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/products", get(list_products).post(create_product))
        .route("/v1/fee-schedules", get(list_fee_schedules).post(create_fee_schedule))
        .route("/v1/fee-schedules/form", get(fee_schedule_form))
        .route("/v1/pricing/quote", post(quote))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FeeScheduleFormQuery {
    pub payer: Option<String>,
    pub hcpcs: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeeScheduleFormResponse {
    pub prefill: Option<FeeSchedulePrefill>,
    /// An order form is parked in the session waiting for this fee schedule
    pub has_order_draft: bool,
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub payer: Option<String>,
    #[serde(default)]
    pub self_pay: bool,
    pub product_id: String,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub product_id: String,
    pub hcpcs: String,
    pub allowed_cents: i64,
    pub patient_share_cents: i64,
    pub allowed: String,
    pub patient_share: String,
    pub outcome: PricingOutcome,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/products
pub async fn list_products(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.catalog.read().await.products().to_vec())
}

/// POST /v1/products
pub async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = state.catalog.write().await.add_product(req)?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /v1/fee-schedules
pub async fn list_fee_schedules(State(state): State<AppState>) -> Json<Vec<FeeSchedule>> {
    Json(state.catalog.read().await.fee_schedules().entries().to_vec())
}

/// POST /v1/fee-schedules
pub async fn create_fee_schedule(
    State(state): State<AppState>,
    Json(req): Json<NewFeeSchedule>,
) -> Result<(StatusCode, Json<FeeSchedule>), AppError> {
    let entry = state.catalog.write().await.add_fee_schedule(req)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /v1/fee-schedules/form?payer=&hcpcs=
/// Prefill for the "add fee schedule" form when coming from a missing-fee-schedule prompt
pub async fn fee_schedule_form(
    State(state): State<AppState>,
    Query(query): Query<FeeScheduleFormQuery>,
) -> Json<FeeScheduleFormResponse> {
    let prefill = state
        .catalog
        .read()
        .await
        .fee_schedule_prefill(query.payer.as_deref(), query.hcpcs.as_deref());

    Json(FeeScheduleFormResponse {
        prefill,
        has_order_draft: state.session.order_draft().is_some(),
    })
}

/// POST /v1/pricing/quote
/// Price one product for a payer (or self-pay) without touching any order
pub async fn quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, AppError> {
    let payer = match req.payer.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => Some(
            p.parse::<Payer>()
                .map_err(|e| AppError::ValidationError(e.to_string()))?,
        ),
        None => None,
    };
    let context = PricingContext {
        payer,
        self_pay: req.self_pay,
    };

    let catalog = state.catalog.read().await;
    let product = catalog
        .product(&req.product_id)
        .ok_or_else(|| AppError::NotFoundError(format!("Product not found: {}", req.product_id)))?;
    let pricing = catalog.price(context, product);

    Ok(Json(QuoteResponse {
        product_id: product.id.clone(),
        hcpcs: product.hcpcs.clone(),
        allowed_cents: pricing.allowed_cents,
        patient_share_cents: pricing.patient_share_cents,
        allowed: format_usd(pricing.allowed_cents),
        patient_share: format_usd(pricing.patient_share_cents),
        outcome: pricing.outcome,
    }))
}
