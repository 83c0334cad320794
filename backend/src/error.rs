//! Error handling for the Site Kardex server
//!
//! Provides consistent error responses in English and Spanish. Every ledger
//! rule violation has its own variant so callers can branch on `kind()`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{AssetState, ParseEnumError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Ledger state errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Movement {0} is already cancelled")]
    AlreadyCancelled(String),

    #[error("Cannot reverse: {0}")]
    CannotReverse(String),

    // Costing errors
    #[error("Unit cost {unit_cost} for {material} must be greater than zero")]
    InvalidCost { material: String, unit_cost: Decimal },

    // Fixed-asset errors
    #[error("{material}: {found} serials declared for quantity {expected}")]
    SerialCountMismatch {
        material: String,
        expected: Decimal,
        found: usize,
    },

    #[error("Serial {0} already exists")]
    DuplicateSerial(String),

    #[error("Asset {asset} is {state}, not available")]
    AssetUnavailable { asset: String, state: AssetState },

    // Stock errors
    #[error("Insufficient stock of {material}: available {available}, requested {requested}")]
    InsufficientStock {
        material: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error(
        "Stock of {material} is reserved by {requisitions}: free {free}, reserved {reserved}, requested {requested}"
    )]
    ReservedStockViolation {
        material: String,
        requested: Decimal,
        free: Decimal,
        reserved: Decimal,
        requisitions: String,
    },

    // Requisition errors
    #[error("{requisition} / {material}: delivering {requested} exceeds pending {pending}")]
    OverFulfillment {
        requisition: String,
        material: String,
        requested: Decimal,
        pending: Decimal,
    },

    #[error(
        "{requisition} / {material}: delivering {requested} exceeds received but undelivered {undelivered}"
    )]
    UndeliveredStock {
        requisition: String,
        material: String,
        requested: Decimal,
        undelivered: Decimal,
    },

    #[error("{requisition} / {material}: receiving {received} exceeds outstanding {outstanding}")]
    OverSupply {
        requisition: String,
        material: String,
        received: Decimal,
        outstanding: Decimal,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    // Concurrency errors
    #[error("Lock contention: {0}")]
    Contention(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// SQLSTATE codes raised when a transaction lost a lock race
const CONTENTION_SQLSTATES: [&str; 3] = ["40001", "40P01", "55P03"];

pub fn is_contention_sqlstate(code: &str) -> bool {
    CONTENTION_SQLSTATES.contains(&code)
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().is_some_and(|code| is_contention_sqlstate(&code)) {
                return AppError::Contention(db_err.message().to_string());
            }
        }
        AppError::DatabaseError(err)
    }
}

impl From<ParseEnumError> for AppError {
    fn from(err: ParseEnumError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("input".to_string(), "Invalid input".to_string()));

        AppError::Validation {
            message_es: format!("Dato inválido en {}: {}", field, message),
            field,
            message,
        }
    }
}

impl AppError {
    /// Build a validation error from a plain rule message
    pub fn validation(field: &str, message: &str, message_es: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_es: message_es.to_string(),
        }
    }

    /// Stable machine-readable error code
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::AlreadyCancelled(_) => "ALREADY_CANCELLED",
            AppError::CannotReverse(_) => "CANNOT_REVERSE",
            AppError::InvalidCost { .. } => "INVALID_COST",
            AppError::SerialCountMismatch { .. } => "SERIAL_COUNT_MISMATCH",
            AppError::DuplicateSerial(_) => "DUPLICATE_SERIAL",
            AppError::AssetUnavailable { .. } => "ASSET_UNAVAILABLE",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::ReservedStockViolation { .. } => "RESERVED_STOCK_VIOLATION",
            AppError::OverFulfillment { .. } => "OVER_FULFILLMENT",
            AppError::UndeliveredStock { .. } => "UNDELIVERED_STOCK",
            AppError::OverSupply { .. } => "OVER_SUPPLY",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Contention(_) => "CONTENTION",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Only lock races are worth retrying by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Contention(_))
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message_es, field) = match &self {
            AppError::InvalidState(msg) => (
                StatusCode::CONFLICT,
                format!("Estado inválido: {}", msg),
                None,
            ),
            AppError::AlreadyCancelled(code) => (
                StatusCode::CONFLICT,
                format!("El movimiento {} ya está anulado", code),
                None,
            ),
            AppError::CannotReverse(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("No se puede anular: {}", msg),
                None,
            ),
            AppError::InvalidCost {
                material,
                unit_cost,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "El costo unitario {} de {} debe ser mayor a cero",
                    unit_cost, material
                ),
                Some("unit_cost".to_string()),
            ),
            AppError::SerialCountMismatch {
                material,
                expected,
                found,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "{}: se declararon {} series para una cantidad de {}",
                    material, found, expected
                ),
                Some("serials".to_string()),
            ),
            AppError::DuplicateSerial(serial) => (
                StatusCode::CONFLICT,
                format!("La serie {} ya existe", serial),
                Some("serials".to_string()),
            ),
            AppError::AssetUnavailable { asset, state } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("El activo {} no está disponible (estado {})", asset, state),
                Some("asset_id".to_string()),
            ),
            AppError::InsufficientStock {
                material,
                available,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "Stock insuficiente de {}: disponible {}, solicitado {}",
                    material, available, requested
                ),
                Some("quantity".to_string()),
            ),
            AppError::ReservedStockViolation {
                material,
                requested,
                free,
                reserved,
                requisitions,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "El stock de {} está reservado por {}: libre {}, reservado {}, solicitado {}",
                    material, requisitions, free, reserved, requested
                ),
                Some("quantity".to_string()),
            ),
            AppError::OverFulfillment {
                requisition,
                material,
                requested,
                pending,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "{} / {}: se entrega {} y solo quedan {} pendientes",
                    requisition, material, requested, pending
                ),
                Some("quantity".to_string()),
            ),
            AppError::UndeliveredStock {
                requisition,
                material,
                requested,
                undelivered,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "{} / {}: se entrega {} y solo hay {} recibidos sin entregar",
                    requisition, material, requested, undelivered
                ),
                Some("quantity".to_string()),
            ),
            AppError::OverSupply {
                requisition,
                material,
                received,
                outstanding,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "{} / {}: se recibe {} y solo faltan {}",
                    requisition, material, received, outstanding
                ),
                Some("quantity".to_string()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                format!("No se encontró {}", resource),
                None,
            ),
            AppError::Validation {
                field, message_es, ..
            } => (
                StatusCode::BAD_REQUEST,
                message_es.clone(),
                Some(field.clone()),
            ),
            AppError::Contention(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Registro bloqueado por otra operación, intente nuevamente".to_string(),
                None,
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error de configuración: {}", msg),
                None,
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Ocurrió un error de base de datos".to_string(),
                None,
            ),
            AppError::Internal(_) | AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error interno del servidor".to_string(),
                None,
            ),
        };

        let message_en = match &self {
            AppError::Validation { message, .. } => message.clone(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalError(_) => "An internal server error occurred".to_string(),
            other => other.to_string(),
        };

        let error_detail = ErrorDetail {
            code: self.kind().to_string(),
            message_en,
            message_es,
            field,
            retryable: self.is_retryable().then_some(true),
        };

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
