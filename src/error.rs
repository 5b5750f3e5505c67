//! Boundary error taxonomy and classification.
//!
//! Failure shapes are decided once, at the transport boundary, into a
//! tagged variant. Downstream code matches on the variant instead of
//! inspecting loosely-typed error objects, and classification maps each
//! variant to an HTTP status and a sanitized client-facing message.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use http::StatusCode;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Result type alias for handlers behind the boundary.
pub type ApiResult<T> = Result<T, ApiError>;

/// Storage-layer failure kind recognized by the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    UniqueViolation,
    NotFound,
    ForeignKeyViolation,
    Other,
}

/// Classified storage-layer failure.
///
/// Repositories that know their schema should construct these with
/// explicit field names; the blanket `sqlx::Error` conversion can only
/// report the violated constraint name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("storage error: {kind:?}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    /// Offending columns, when known.
    pub fields: Vec<String>,
    /// Driver-level message, kept for internal logs only.
    pub detail: Option<String>,
}

impl StorageError {
    pub fn unique<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: StorageErrorKind::UniqueViolation,
            fields: fields.into_iter().map(Into::into).collect(),
            detail: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            kind: StorageErrorKind::NotFound,
            fields: Vec::new(),
            detail: None,
        }
    }

    pub fn foreign_key<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: StorageErrorKind::ForeignKeyViolation,
            fields: fields.into_iter().map(Into::into).collect(),
            detail: None,
        }
    }

    pub fn other(detail: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::Other,
            fields: Vec::new(),
            detail: Some(detail.into()),
        }
    }
}

/// Application error type normalized by the boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Framework-level HTTP error carrying an explicit status.
    #[error("{message}")]
    Http {
        status: StatusCode,
        message: String,
        errors: Option<Value>,
    },

    /// Request validation failure.
    #[error("{message}")]
    Validation { message: String, errors: Value },

    /// Storage constraint violation classified at the repository boundary.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Generic failure with a caller-supplied message.
    #[error("{0}")]
    Internal(String),

    /// Failure with no recognizable shape.
    #[error("Internal server error")]
    Unexpected,
}

impl ApiError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            errors: None,
        }
    }

    pub fn validation(errors: Value) -> Self {
        Self::Validation {
            message: "Validation failed".to_string(),
            errors,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Resolve the canonical taxonomy entry for this error.
    ///
    /// Deterministic: depends on the error value alone.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            Self::Http {
                status,
                message,
                errors,
            } => ErrorClassification {
                kind: if status.is_server_error() {
                    ErrorKind::ServerError
                } else {
                    ErrorKind::ClientError
                },
                status: *status,
                message: message.clone(),
                errors: errors.clone(),
            },
            Self::Validation { message, errors } => ErrorClassification {
                kind: ErrorKind::ValidationFailure,
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: message.clone(),
                errors: Some(errors.clone()),
            },
            Self::Storage(err) => classify_storage(err),
            Self::Internal(message) => ErrorClassification {
                kind: ErrorKind::ServerError,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: message.clone(),
                errors: None,
            },
            Self::Unexpected => ErrorClassification {
                kind: ErrorKind::ServerError,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Internal server error".to_string(),
                errors: None,
            },
        }
    }
}

fn classify_storage(err: &StorageError) -> ErrorClassification {
    match err.kind {
        StorageErrorKind::UniqueViolation => ErrorClassification {
            kind: ErrorKind::DuplicateResource,
            status: StatusCode::BAD_REQUEST,
            message: "A record with this value already exists".to_string(),
            errors: Some(json!({ "field": err.fields })),
        },
        StorageErrorKind::NotFound => ErrorClassification {
            kind: ErrorKind::ResourceNotFound,
            status: StatusCode::NOT_FOUND,
            message: "Record not found".to_string(),
            errors: None,
        },
        StorageErrorKind::ForeignKeyViolation => ErrorClassification {
            kind: ErrorKind::ForeignKeyViolation,
            status: StatusCode::BAD_REQUEST,
            message: "Foreign key constraint failed".to_string(),
            errors: if err.fields.is_empty() {
                None
            } else {
                Some(json!({ "field": err.fields }))
            },
        },
        StorageErrorKind::Other => ErrorClassification {
            kind: ErrorKind::GenericPersistenceFailure,
            status: StatusCode::BAD_REQUEST,
            message: "Database operation failed".to_string(),
            errors: None,
        },
    }
}

/// Canonical error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationFailure,
    DuplicateResource,
    ResourceNotFound,
    ForeignKeyViolation,
    GenericPersistenceFailure,
    ClientError,
    ServerError,
}

/// Resolved classification: taxonomy entry, HTTP status, sanitized
/// message, and optional structured field detail.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorClassification {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: String,
    pub errors: Option<Value>,
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StorageError::not_found().into(),
            sqlx::Error::Database(db) => {
                let fields = db
                    .constraint()
                    .map(|c| vec![c.to_string()])
                    .unwrap_or_default();
                let detail = Some(db.message().to_string());
                let kind = match db.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => StorageErrorKind::UniqueViolation,
                    sqlx::error::ErrorKind::ForeignKeyViolation => {
                        StorageErrorKind::ForeignKeyViolation
                    }
                    _ => StorageErrorKind::Other,
                };
                StorageError {
                    kind,
                    fields,
                    detail,
                }
                .into()
            }
            // Pool exhaustion, IO, decode problems: infrastructure
            // failures, not constraint violations.
            _ => Self::Internal(err.to_string()),
        }
    }
}

/// Debug rendering of an error plus its source chain.
pub(crate) fn error_chain(err: &ApiError) -> String {
    use std::error::Error as _;

    let mut out = format!("{err:?}");
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

impl IntoResponse for ApiError {
    /// Fallback rendering used when the envelope middleware is not
    /// installed; the middleware otherwise rebuilds the body with full
    /// request context.
    fn into_response(self) -> Response {
        let classification = self.classify();

        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(false));
        body.insert(
            "statusCode".to_string(),
            json!(classification.status.as_u16()),
        );
        body.insert("timestamp".to_string(), json!(Utc::now()));
        body.insert(
            "message".to_string(),
            Value::String(classification.message.clone()),
        );
        if let Some(errors) = classification.errors.clone() {
            body.insert("errors".to_string(), errors);
        }

        let mut response = (classification.status, Json(Value::Object(body))).into_response();
        response.extensions_mut().insert(Arc::new(self));
        response
    }
}
