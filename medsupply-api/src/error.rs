use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use medsupply_catalog::{CatalogError, FeeScheduleError};
use medsupply_order::intake::SUMMARY_LIMIT;
use medsupply_order::{ChangeError, DocumentError, OrderError};
use medsupply_shared::FieldErrors;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    FormError(String, FieldErrors),
    Anyhow(anyhow::Error),
}

impl AppError {
    /// Map domain errors carried through `anyhow` onto their HTTP meaning
    fn classify(err: anyhow::Error) -> AppError {
        if let Some(e) = err.downcast_ref::<OrderError>() {
            return match e {
                OrderError::NotFound(_) => AppError::NotFoundError(e.to_string()),
                OrderError::InvalidTransition { .. } => AppError::ConflictError(e.to_string()),
                OrderError::EmptyRejectionReason | OrderError::EmptyNote => AppError::ValidationError(e.to_string()),
                OrderError::Invalid(fields) => AppError::FormError("Please fix the form".to_string(), fields.clone()),
                OrderError::Change(change) => Self::change(change),
            };
        }
        if let Some(e) = err.downcast_ref::<ChangeError>() {
            return Self::change(e);
        }
        if let Some(e) = err.downcast_ref::<CatalogError>() {
            return match e {
                CatalogError::ProductNotFound(_) => AppError::NotFoundError(e.to_string()),
                CatalogError::FeeSchedule(FeeScheduleError::Duplicate { .. }) => AppError::ConflictError(e.to_string()),
                CatalogError::Invalid(fields) => AppError::FormError("Please fix the form".to_string(), fields.clone()),
            };
        }
        if let Some(e) = err.downcast_ref::<DocumentError>() {
            return match e {
                DocumentError::NotGenerated(_) => AppError::ConflictError(e.to_string()),
                DocumentError::UnknownKind(_) => AppError::NotFoundError(e.to_string()),
            };
        }
        AppError::Anyhow(err)
    }

    fn change(e: &ChangeError) -> AppError {
        match e {
            ChangeError::OrderNotModifiable(_) => AppError::ConflictError(e.to_string()),
            ChangeError::ItemNotFound(_) => AppError::NotFoundError(e.to_string()),
            ChangeError::ProductNotFound(_) | ChangeError::InvalidQuantity => AppError::ValidationError(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = match self {
            AppError::Anyhow(err) => Self::classify(err),
            other => other,
        };

        let (status, body) = match err {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::FormError(msg, fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": msg,
                    "summary": fields.summary(SUMMARY_LIMIT),
                    "fields": fields.fields(),
                }),
            ),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
