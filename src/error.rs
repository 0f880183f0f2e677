use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use crate::domain::AmountError;
use crate::gateway::GatewayError;
use crate::ports::RepositoryError;

/// Failure causes of the donation lifecycle. Each variant stays
/// distinguishable to callers and in audit records.
#[derive(Debug, thiserror::Error)]
pub enum DonationError {
    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("invalid payment signature")]
    SignatureInvalid,
    #[error("donation not found: {0}")]
    RecordNotFound(String),
    #[error("unsupported amount format: {0}")]
    UnsupportedAmountFormat(String),
    #[error("access denied: {0}")]
    AuthorizationDenied(String),
    #[error("storage error: {0}")]
    Store(#[from] RepositoryError),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("receipt unavailable: {0}")]
    ReceiptUnavailable(String),
    #[error("export failed: {0}")]
    Export(String),
}

impl DonationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::RecordNotFound(_) => "RECORD_NOT_FOUND",
            Self::UnsupportedAmountFormat(_) => "UNSUPPORTED_AMOUNT_FORMAT",
            Self::AuthorizationDenied(_) => "AUTHORIZATION_DENIED",
            Self::Store(_) => "STORE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ReceiptUnavailable(_) => "RECEIPT_UNAVAILABLE",
            Self::Export(_) => "EXPORT_ERROR",
        }
    }
}

impl From<AmountError> for DonationError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::Unsupported(repr) => Self::UnsupportedAmountFormat(repr),
            other => Self::Validation(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Internal server error: {0}")]
    InternalError(String),
    #[error(transparent)]
    Donation(#[from] DonationError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", msg),
            AppError::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
            AppError::Donation(err) => {
                let status = match &err {
                    DonationError::Validation(_)
                    | DonationError::SignatureInvalid
                    | DonationError::ReceiptUnavailable(_) => StatusCode::BAD_REQUEST,
                    DonationError::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
                    DonationError::RecordNotFound(_) => StatusCode::NOT_FOUND,
                    DonationError::Gateway(_) | DonationError::UnsupportedAmountFormat(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                    DonationError::Store(_) | DonationError::Export(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                // Storage details stay in the logs.
                let message = match &err {
                    DonationError::Store(inner) => {
                        tracing::error!("Donation store error: {}", inner);
                        "internal server error".to_string()
                    }
                    other => other.to_string(),
                };
                (status, err.code(), message)
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
