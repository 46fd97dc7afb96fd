//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use event_store::EventStoreError;
use intake::{CatalogError, IntakeError};
use projections::ProjectionError;
use serde::Serialize;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed caller identity.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The request could not be read (bad JSON, bad path id).
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("Read model unavailable: {0}")]
    Projection(#[from] ProjectionError),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub retriable: bool,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Intake(err) => intake_status(err),
            ApiError::Projection(err) if err.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Projection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Intake(err) => err.kind(),
            ApiError::Projection(_) => "read_model_unavailable",
        }
    }

    pub fn is_retriable(&self) -> bool {
        match self {
            ApiError::Unauthenticated(_) | ApiError::BadRequest(_) => false,
            ApiError::Intake(err) => err.is_transient(),
            ApiError::Projection(err) => err.is_transient(),
        }
    }
}

fn intake_status(err: &IntakeError) -> StatusCode {
    match err {
        IntakeError::Validation(_)
        | IntakeError::ProductNotFound { .. }
        | IntakeError::MinimumOrderNotMet { .. }
        | IntakeError::Catalog(CatalogError::NotFound(_)) => StatusCode::BAD_REQUEST,
        IntakeError::InsufficientStock { .. } => StatusCode::CONFLICT,
        IntakeError::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        IntakeError::Catalog(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        IntakeError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
        IntakeError::Domain(e) => domain_status(e),
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Order(_) => StatusCode::BAD_REQUEST,
        DomainError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Forbidden { .. } => StatusCode::FORBIDDEN,
        DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => {
            StatusCode::CONFLICT
        }
        DomainError::EventStore(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::EventStore(_) | DomainError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::counter!(
            "http_errors_total",
            "status" => status.as_u16().to_string(),
            "code" => self.code()
        )
        .increment(1);
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
            retriable: self.is_retriable(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Intake(IntakeError::Domain(err))
    }
}
