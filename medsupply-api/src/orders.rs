use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use medsupply_order::documents::DocumentLink;
use medsupply_order::{
    ChangeHandler, DashboardMetrics, DocumentService, MissingFeeSchedule, Note, Order, OrderFilter, OrderForm,
    OrderStatus, OrderTotals, PayerFilter, Submission,
};
use medsupply_shared::Payer;
use medsupply_store::Attachment;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", get(list_orders).post(submit_order))
        .route("/v1/orders/metrics", get(metrics))
        .route("/v1/orders/drafts", post(save_draft))
        .route("/v1/orders/form", get(order_form))
        .route("/v1/orders/{id}", get(get_order).put(update_order))
        .route("/v1/orders/{id}/submit", post(resubmit_order))
        .route("/v1/orders/{id}/approve", post(approve_order))
        .route("/v1/orders/{id}/reject", post(reject_order))
        .route("/v1/orders/{id}/documents", post(generate_documents))
        .route("/v1/orders/{id}/notes", post(add_note))
        .route("/v1/orders/{id}/coverage", put(set_coverage))
        .route("/v1/orders/{id}/line-items", post(add_line_item))
        .route(
            "/v1/orders/{id}/line-items/{line_id}",
            put(set_line_item).delete(remove_line_item),
        )
        .route("/v1/orders/{id}/line-items/{line_id}/clear", post(clear_line_item))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub payer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub id: String,
    pub patient: String,
    pub payer: String,
    pub status: OrderStatus,
    pub total_allowed_cents: i64,
    pub margin_percent: f64,
    pub updated: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub payer_label: String,
    pub totals: OrderTotals,
    pub documents: Vec<DocumentLink>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub order: OrderDetail,
    pub missing_fee_schedules: Vec<MissingFeeSchedule>,
}

#[derive(Debug, Serialize)]
pub struct EditResponse {
    pub order: OrderDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_id: Option<String>,
    pub missing_fee_schedules: Vec<MissingFeeSchedule>,
}

#[derive(Debug, Deserialize)]
pub struct OrderFormQuery {
    #[serde(rename = "continue")]
    pub continue_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderFormResponse {
    pub order_id: Option<String>,
    pub form: OrderForm,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CoverageRequest {
    #[serde(default)]
    pub payer: Option<String>,
    #[serde(default)]
    pub self_pay: bool,
}

#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default = "default_qty")]
    pub qty: u32,
}

fn default_qty() -> u32 {
    1
}

// ============================================================================
// Helpers
// ============================================================================

fn detail(state: &AppState, order: &Order) -> OrderDetail {
    let order = state.view(order);
    OrderDetail {
        payer_label: order.payer_label(),
        totals: order.totals(),
        documents: DocumentService::available(&order),
        attachments: state.session.attachments(&order.id),
        order,
    }
}

fn submission_response(state: &AppState, submission: Submission) -> SubmissionResponse {
    SubmissionResponse {
        order: detail(state, &submission.order),
        missing_fee_schedules: submission.missing_fee_schedules,
    }
}

fn parse_payer(raw: Option<&str>) -> Result<Option<Payer>, AppError> {
    match raw.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => p
            .parse::<Payer>()
            .map(Some)
            .map_err(|e| AppError::ValidationError(e.to_string())),
        None => Ok(None),
    }
}

fn not_found(order_id: &str) -> AppError {
    AppError::NotFoundError(format!("Order not found: {}", order_id))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/orders?search=&status=&payer=
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderSummary>>, AppError> {
    let filter = OrderFilter {
        search: query.search,
        status: query
            .status
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<OrderStatus>())
            .transpose()
            .map_err(AppError::ValidationError)?,
        payer: query
            .payer
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<PayerFilter>())
            .transpose()
            .map_err(AppError::ValidationError)?,
    };

    let orders = state.orders.read().await;
    let views: Vec<Order> = orders.list().map(|o| state.view(o)).collect();
    let summaries = filter
        .apply(&views)
        .into_iter()
        .map(|o| OrderSummary {
            id: o.id.clone(),
            patient: o.patient.clone(),
            payer: o.payer_label(),
            status: o.status,
            total_allowed_cents: o.total_allowed_cents,
            margin_percent: o.margin_percent,
            updated: o.updated,
        })
        .collect();

    Ok(Json(summaries))
}

/// GET /v1/orders/metrics
pub async fn metrics(State(state): State<AppState>) -> Json<DashboardMetrics> {
    let orders = state.orders.read().await;
    let views: Vec<Order> = orders.list().map(|o| state.view(o)).collect();
    Json(DashboardMetrics::from_orders(&views))
}

/// POST /v1/orders
/// Validate and submit a new order
pub async fn submit_order(
    State(state): State<AppState>,
    Json(form): Json<OrderForm>,
) -> Result<(StatusCode, Json<SubmissionResponse>), AppError> {
    let catalog = state.catalog.read().await;
    let submission = state.orders.write().await.submit(&form, &catalog)?;
    state.session.clear_order_draft();

    Ok((StatusCode::CREATED, Json(submission_response(&state, submission))))
}

/// POST /v1/orders/drafts
/// Save the form as a draft order without validation
pub async fn save_draft(
    State(state): State<AppState>,
    Json(form): Json<OrderForm>,
) -> Result<(StatusCode, Json<SubmissionResponse>), AppError> {
    let catalog = state.catalog.read().await;
    let submission = state.orders.write().await.save_draft(&form, &catalog);
    state.session.clear_order_draft();

    Ok((StatusCode::CREATED, Json(submission_response(&state, submission))))
}

/// GET /v1/orders/form?continue=ORD-1004
/// Prefilled order form: from an existing order, else the parked session draft
pub async fn order_form(
    State(state): State<AppState>,
    Query(query): Query<OrderFormQuery>,
) -> Result<Json<OrderFormResponse>, AppError> {
    let Some(order_id) = query.continue_id.filter(|id| !id.trim().is_empty()) else {
        return Ok(Json(OrderFormResponse {
            order_id: None,
            form: state.session.order_draft().unwrap_or_default(),
            attachments: Vec::new(),
        }));
    };

    let catalog = state.catalog.read().await;
    let orders = state.orders.read().await;
    let order = orders.get_order(&order_id).ok_or_else(|| not_found(&order_id))?;

    Ok(Json(OrderFormResponse {
        order_id: Some(order.id.clone()),
        form: OrderForm::from_order(order, &catalog),
        attachments: state.session.attachments(&order.id),
    }))
}

/// GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetail>, AppError> {
    let orders = state.orders.read().await;
    let order = orders.get_order(&order_id).ok_or_else(|| not_found(&order_id))?;
    Ok(Json(detail(&state, order)))
}

/// PUT /v1/orders/{id}
/// Replace the form data of a draft or rejected order
pub async fn update_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(form): Json<OrderForm>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let catalog = state.catalog.read().await;
    let submission = state.orders.write().await.update_form(&order_id, &form, &catalog)?;
    Ok(Json(submission_response(&state, submission)))
}

/// POST /v1/orders/{id}/submit
/// Resubmit a draft or rejected order
pub async fn resubmit_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let catalog = state.catalog.read().await;
    let submission = state.orders.write().await.resubmit(&order_id, &catalog)?;
    state.session.clear_rejection(&submission.order.id)?;
    Ok(Json(submission_response(&state, submission)))
}

/// POST /v1/orders/{id}/approve
pub async fn approve_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetail>, AppError> {
    let mut orders = state.orders.write().await;
    let order = orders.approve(&order_id)?;
    Ok(Json(detail(&state, order)))
}

/// POST /v1/orders/{id}/reject
pub async fn reject_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<OrderDetail>, AppError> {
    let mut orders = state.orders.write().await;
    let order = orders.reject(&order_id, &req.reason)?;
    state
        .session
        .record_rejection(&order.id, order.rejection_reason.as_deref().unwrap_or_default())?;
    Ok(Json(detail(&state, order)))
}

/// POST /v1/orders/{id}/documents
/// Generate the encounter form, invoice and proof of delivery
pub async fn generate_documents(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetail>, AppError> {
    let mut orders = state.orders.write().await;
    let order = orders.generate_documents(&order_id)?;
    state.session.mark_docs_ready(&order.id)?;
    Ok(Json(detail(&state, order)))
}

/// POST /v1/orders/{id}/notes
pub async fn add_note(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<NoteRequest>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    let note = state.orders.write().await.add_note(&order_id, &req.author, &req.text)?;
    info!("Note {} added to {}", note.id, order_id);
    Ok((StatusCode::CREATED, Json(note)))
}

/// PUT /v1/orders/{id}/coverage
/// Change payer or self-pay; every line is repriced
pub async fn set_coverage(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<CoverageRequest>,
) -> Result<Json<EditResponse>, AppError> {
    let payer = parse_payer(req.payer.as_deref())?;
    let catalog = state.catalog.read().await;
    let (order, missing) = state
        .orders
        .write()
        .await
        .edit(&order_id, |order| ChangeHandler::set_coverage(order, &catalog, payer, req.self_pay))?;

    Ok(Json(EditResponse {
        order: detail(&state, &order),
        line_id: None,
        missing_fee_schedules: missing,
    }))
}

/// POST /v1/orders/{id}/line-items
pub async fn add_line_item(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<LineItemRequest>,
) -> Result<(StatusCode, Json<EditResponse>), AppError> {
    let catalog = state.catalog.read().await;
    let (order, change) = state.orders.write().await.edit(&order_id, |order| {
        ChangeHandler::add_line(order, &catalog, req.product_id.as_deref(), req.qty)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(EditResponse {
            order: detail(&state, &order),
            line_id: Some(change.line_id),
            missing_fee_schedules: change.missing_fee_schedule.into_iter().collect(),
        }),
    ))
}

/// PUT /v1/orders/{id}/line-items/{line_id}
pub async fn set_line_item(
    State(state): State<AppState>,
    Path((order_id, line_id)): Path<(String, String)>,
    Json(req): Json<LineItemRequest>,
) -> Result<Json<EditResponse>, AppError> {
    let product_id = req
        .product_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("Each line item must have a product selected".to_string()))?;

    let catalog = state.catalog.read().await;
    let (order, change) = state.orders.write().await.edit(&order_id, |order| {
        ChangeHandler::set_line(order, &catalog, &line_id, &product_id, req.qty)
    })?;

    Ok(Json(EditResponse {
        order: detail(&state, &order),
        line_id: Some(change.line_id),
        missing_fee_schedules: change.missing_fee_schedule.into_iter().collect(),
    }))
}

/// POST /v1/orders/{id}/line-items/{line_id}/clear
pub async fn clear_line_item(
    State(state): State<AppState>,
    Path((order_id, line_id)): Path<(String, String)>,
) -> Result<Json<OrderDetail>, AppError> {
    let (order, ()) = state
        .orders
        .write()
        .await
        .edit(&order_id, |order| ChangeHandler::clear_line(order, &line_id))?;
    Ok(Json(detail(&state, &order)))
}

/// DELETE /v1/orders/{id}/line-items/{line_id}
pub async fn remove_line_item(
    State(state): State<AppState>,
    Path((order_id, line_id)): Path<(String, String)>,
) -> Result<Json<OrderDetail>, AppError> {
    let (order, _removed) = state
        .orders
        .write()
        .await
        .edit(&order_id, |order| ChangeHandler::remove_line(order, &line_id))?;
    Ok(Json(detail(&state, &order)))
}
