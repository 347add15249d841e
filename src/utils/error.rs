use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use planilhas::SheetsError;
use serde_json::json;
use std::fmt;

use crate::models::ReconciliationReport;
use crate::services::export::ExportError;
use crate::services::reconciliation::ReconciliationError;
use crate::services::schema::SchemaError;

#[derive(Debug)]
pub enum AppError {
    RemoteUnavailable(String),
    SchemaMismatch(String),
    ReconciliationFailed {
        attempted: usize,
        reason: String,
        report: Box<ReconciliationReport>,
    },
    ExportError(String),
    AssetUpload(String),
    ConfigError(String),
    JsonError(serde_json::Error),
    HttpError(reqwest::Error),
    ValidationError(String),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::RemoteUnavailable(msg) => write!(f, "Remote table unavailable: {}", msg),
            AppError::SchemaMismatch(msg) => write!(f, "Schema mismatch: {}", msg),
            AppError::ReconciliationFailed { attempted, reason, .. } => write!(
                f,
                "Reconciliation failed, {} row operations aborted: {}",
                attempted, reason
            ),
            AppError::ExportError(msg) => write!(f, "Export error: {}", msg),
            AppError::AssetUpload(msg) => write!(f, "Asset upload error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::JsonError(err) => write!(f, "JSON error: {}", err),
            AppError::HttpError(err) => write!(f, "HTTP error: {}", err),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::HttpError(err)
    }
}

impl From<SheetsError> for AppError {
    fn from(err: SheetsError) -> Self {
        match err {
            SheetsError::SchemaMismatch(msg) => AppError::SchemaMismatch(msg),
            SheetsError::NotFound(msg) => AppError::SchemaMismatch(format!("sheet not found: {}", msg)),
            SheetsError::ConfigError(msg) => AppError::ConfigError(msg),
            other => AppError::RemoteUnavailable(other.to_string()),
        }
    }
}

impl From<SchemaError> for AppError {
    fn from(err: SchemaError) -> Self {
        AppError::SchemaMismatch(err.to_string())
    }
}

impl From<ReconciliationError> for AppError {
    fn from(err: ReconciliationError) -> Self {
        match err {
            ReconciliationError::RemoteUnavailable(msg) => AppError::RemoteUnavailable(msg),
            ReconciliationError::SchemaMismatch(msg) => AppError::SchemaMismatch(msg),
            ReconciliationError::ReconciliationFailed {
                attempted,
                reason,
                report,
            } => AppError::ReconciliationFailed {
                attempted,
                reason,
                report,
            },
        }
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        AppError::ExportError(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, report) = match self {
            AppError::RemoteUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
            AppError::SchemaMismatch(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
            AppError::ReconciliationFailed { report, .. } => (StatusCode::BAD_GATEWAY, Some(report)),
            AppError::ExportError(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            AppError::AssetUpload(_) => (StatusCode::BAD_GATEWAY, None),
            AppError::ConfigError(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            AppError::JsonError(_) => (StatusCode::BAD_REQUEST, None),
            AppError::HttpError(_) => (StatusCode::BAD_GATEWAY, None),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, None),
            AppError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let mut body = json!({
            "error": message,
            "status": status.as_u16()
        });
        if let Some(report) = report {
            body["report"] = json!(report);
        }

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
