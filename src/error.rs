use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

/// Every failure mode of the ledger engine. Validation and authorization
/// variants are returned before any write happens; `Storage`/`Internal` mean
/// the whole unit of work was rolled back.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("amount out of bounds: must be between {min} and {max}")]
    AmountOutOfBounds { min: Decimal, max: Decimal },

    #[error("insufficient funds: required {required}, available {available}, short by {}", .required - .available)]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("wallet not found")]
    WalletNotFound,

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("contract {0} not found")]
    ContractNotFound(Uuid),

    #[error("application {0} not found")]
    ApplicationNotFound(Uuid),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("a contract already exists for this job and employee")]
    DuplicateContract,

    #[error("payment signature verification failed")]
    SignatureMismatch,

    #[error("caller is not allowed to perform this operation")]
    Unauthorized,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidAmount | Self::AmountOutOfBounds { .. } => StatusCode::BAD_REQUEST,
            Self::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::WalletNotFound
            | Self::TransactionNotFound
            | Self::ContractNotFound(_)
            | Self::ApplicationNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState(_) | Self::DuplicateContract => StatusCode::CONFLICT,
            Self::SignatureMismatch => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal failures get full context in the log and a generic body,
        // everything else surfaces its specific reason to the caller.
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("engine failure: {self}");
            "something went wrong, please try again".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": body }))).into_response()
    }
}
