use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use medsupply_order::OrderForm;
use medsupply_store::{Attachment, AttachmentReport, AttachmentUpload};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

/// Files one attachments upload is sized for
const FILES_PER_UPLOAD: usize = 10;

/// JSON framing allowance per file (name, type, id)
const PER_FILE_OVERHEAD: usize = 64 * 1024;

pub fn routes(max_attachment_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/v1/orders/{id}/attachments",
            get(list_attachments)
                .put(replace_attachments)
                .layer(DefaultBodyLimit::max(upload_body_limit(max_attachment_bytes))),
        )
        .route("/v1/session/order-draft", get(get_order_draft).put(save_order_draft))
        .route("/v1/session", delete(clear_session))
}

/// Request body cap for an attachments upload: room for several files just
/// over the per-file limit in base64, so oversized ones still get reported.
pub fn upload_body_limit(max_attachment_bytes: usize) -> usize {
    let encoded = max_attachment_bytes.saturating_add(1).div_ceil(3).saturating_mul(4);
    encoded
        .saturating_add(PER_FILE_OVERHEAD)
        .saturating_mul(FILES_PER_UPLOAD)
}

#[derive(Debug, Serialize)]
pub struct OrderDraftResponse {
    pub draft: Option<OrderForm>,
}

/// Canonical order id, or 404
async fn order_id(state: &AppState, raw: &str) -> Result<String, AppError> {
    state
        .orders
        .read()
        .await
        .get_order(raw)
        .map(|o| o.id.clone())
        .ok_or_else(|| AppError::NotFoundError(format!("Order not found: {}", raw)))
}

/// GET /v1/orders/{id}/attachments
pub async fn list_attachments(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<Attachment>>, AppError> {
    let id = order_id(&state, &raw_id).await?;
    Ok(Json(state.session.attachments(&id)))
}

/// PUT /v1/orders/{id}/attachments
/// Replace the order's attachments; invalid files are reported, not stored
pub async fn replace_attachments(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(uploads): Json<Vec<AttachmentUpload>>,
) -> Result<Json<AttachmentReport>, AppError> {
    let id = order_id(&state, &raw_id).await?;
    let report = state.session.set_attachments(&id, uploads)?;
    Ok(Json(report))
}

/// GET /v1/session/order-draft
pub async fn get_order_draft(State(state): State<AppState>) -> Json<OrderDraftResponse> {
    Json(OrderDraftResponse {
        draft: state.session.order_draft(),
    })
}

/// PUT /v1/session/order-draft
/// Park the order form while a missing fee schedule is created
pub async fn save_order_draft(
    State(state): State<AppState>,
    Json(form): Json<OrderForm>,
) -> Result<StatusCode, AppError> {
    state.session.save_order_draft(&form)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/session
pub async fn clear_session(State(state): State<AppState>) -> StatusCode {
    state.session.clear();
    StatusCode::NO_CONTENT
}
