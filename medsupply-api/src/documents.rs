use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use medsupply_order::{Document, DocumentKind, DocumentService};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/orders/{id}/documents/{kind}", get(get_document))
}

/// GET /v1/orders/{id}/documents/{encounter|invoice|pod}
pub async fn get_document(
    State(state): State<AppState>,
    Path((order_id, kind)): Path<(String, String)>,
) -> Result<Json<Document>, AppError> {
    let kind: DocumentKind = kind.parse()?;

    let orders = state.orders.read().await;
    let order = orders
        .get_order(&order_id)
        .ok_or_else(|| AppError::NotFoundError(format!("Order not found: {}", order_id)))?;

    let doc = DocumentService::render(&state.view(order), kind)?;
    Ok(Json(doc))
}
