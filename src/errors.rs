use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::error::DbErr;
use sea_orm::TransactionError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error body returned by the HTTP surface.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Machine-readable error kind, stable across releases
    pub kind: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid state transition: {entity} {id} is {current}, cannot {attempted}")]
    InvalidStateTransition {
        entity: &'static str,
        id: Uuid,
        current: String,
        attempted: String,
    },

    #[error("Insufficient inventory for product {product_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Return window expired for package {package_id}: delivered {delivered_at}, window {window_days} days")]
    ReturnWindowExpired {
        package_id: Uuid,
        delivered_at: DateTime<Utc>,
        window_days: i64,
    },

    #[error("Duplicate order: external order id {0} already exists")]
    DuplicateOrder(String),

    #[error("Duplicate return: package {0} already has a return")]
    DuplicateReturn(Uuid),

    #[error("Quantity exceeds allocation for product {product_id} in batch {batch_id}: requested {requested}, allocated {allocated}")]
    QuantityExceedsAllocation {
        product_id: Uuid,
        batch_id: Uuid,
        requested: i32,
        allocated: i32,
    },

    #[error("No transport assigned to package {0}")]
    TransportNotFound(Uuid),

    #[error("Package {package_id} is {status} and can no longer change transport")]
    PackageTerminal { package_id: Uuid, status: String },

    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}

impl ServiceError {
    /// True for failures that are safe and worthwhile to retry in a fresh
    /// transaction (concurrent claims over the same items or stock rows).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::TransactionConflict(_))
    }

    /// Stable machine-readable kind for API consumers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::InsufficientInventory { .. } => "insufficient_inventory",
            Self::ReturnWindowExpired { .. } => "return_window_expired",
            Self::DuplicateOrder(_) => "duplicate_order",
            Self::DuplicateReturn(_) => "duplicate_return",
            Self::QuantityExceedsAllocation { .. } => "quantity_exceeds_allocation",
            Self::TransportNotFound(_) => "transport_not_found",
            Self::PackageTerminal { .. } => "package_terminal",
            Self::TransactionConflict(_) => "transaction_conflict",
            Self::EventError(_) => "event_error",
            Self::ConfigError(_) => "config_error",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::ConfigError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) | Self::TransportNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidStateTransition { .. }
            | Self::ReturnWindowExpired { .. }
            | Self::PackageTerminal { .. }
            | Self::QuantityExceedsAllocation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InsufficientInventory { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DuplicateOrder(_) | Self::DuplicateReturn(_) | Self::TransactionConflict(_) => {
                StatusCode::CONFLICT
            }
        }
    }

    /// Message suitable for HTTP responses. Internal failures return generic
    /// text so implementation details never leak; domain failures carry their
    /// full context so callers can act on them.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) => "Internal server error".to_string(),
            Self::ConfigError(_) => "Service misconfigured".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            message: self.response_message(),
            kind: self.kind().to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_actionable_statuses() {
        let err = ServiceError::InsufficientInventory {
            product_id: Uuid::new_v4(),
            requested: 10,
            available: 2,
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.kind(), "insufficient_inventory");
        assert!(err.response_message().contains("requested 10"));

        let err = ServiceError::DuplicateOrder("EXT-1".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = ServiceError::TransportNotFound(Uuid::new_v4());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ServiceError::InternalError("connection pool exhausted".to_string());
        assert_eq!(err.response_message(), "Internal server error");
    }

    #[test]
    fn only_transaction_conflicts_are_retryable() {
        assert!(ServiceError::TransactionConflict("stock version moved".into()).is_retryable());
        assert!(!ServiceError::NotFound("order".into()).is_retryable());
        assert!(!ServiceError::InvalidInput("quantity".into()).is_retryable());
    }
}
