//! Error handling.

use axum::{
    extract::rejection::JsonRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tokio::sync::AcquireError;
use tracing::{event, Level};

/// Statcube error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum StatCubeError {
    /// The cube violates a structural precondition and cannot be used
    #[error("malformed cube: {reason}")]
    MalformedCube { reason: String },

    /// A category code does not exist in a dimension's category index
    #[error("unknown category {code} in dimension {dimension}")]
    UnknownCategory { dimension: String, code: String },

    /// A dimension identifier does not exist in the cube
    #[error("unknown dimension {dimension}")]
    UnknownDimension { dimension: String },

    /// A table query refers to a column the table does not have
    #[error("unknown column {column}")]
    UnknownColumn { column: String },

    /// No coordinate was provided for a dimension of the cube
    #[error("missing coordinate for dimension {dimension}")]
    MissingCoordinate { dimension: String },

    /// The cube has more cells than the configured ceiling
    #[error("cube has too many cells ({requested} > {limit})")]
    TooManyCells { requested: usize, limit: usize },

    /// The statistical data API returned an error envelope
    #[error("data API error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Error deserialising request data
    #[error("request data is not valid")]
    RequestDataJsonRejection(#[from] JsonRejection),

    /// Error validating request data (single error)
    #[error("request data is not valid")]
    RequestDataValidationSingle(#[from] validator::ValidationError),

    /// Error validating request data (multiple errors)
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),

    /// Error acquiring a semaphore
    #[error("error acquiring resources")]
    SemaphoreAcquireError(#[from] AcquireError),

    /// Error converting between integer types
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),

    /// Error encoding metrics
    #[error("error encoding metrics")]
    Metrics(#[from] prometheus::Error),
}

impl StatCubeError {
    /// Returns a [StatCubeError::MalformedCube] with the given reason.
    pub fn malformed(reason: impl Into<String>) -> Self {
        StatCubeError::MalformedCube {
            reason: reason.into(),
        }
    }
}

impl IntoResponse for StatCubeError {
    /// Convert from a `StatCubeError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 413 payload too large ErrorResponse
    fn payload_too_large<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    /// Return a 502 bad gateway ErrorResponse
    fn bad_gateway<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_GATEWAY, error)
    }
}

impl From<StatCubeError> for ErrorResponse {
    /// Convert from a `StatCubeError` into an `ErrorResponse`.
    fn from(error: StatCubeError) -> Self {
        let response = match &error {
            // Bad request
            StatCubeError::MalformedCube { reason: _ }
            | StatCubeError::UnknownCategory {
                dimension: _,
                code: _,
            }
            | StatCubeError::UnknownDimension { dimension: _ }
            | StatCubeError::UnknownColumn { column: _ }
            | StatCubeError::MissingCoordinate { dimension: _ }
            | StatCubeError::RequestDataJsonRejection(_)
            | StatCubeError::RequestDataValidationSingle(_)
            | StatCubeError::RequestDataValidation(_) => Self::bad_request(&error),

            // Payload too large
            StatCubeError::TooManyCells {
                requested: _,
                limit: _,
            } => Self::payload_too_large(&error),

            // Bad gateway
            StatCubeError::Rpc {
                code: _,
                message: _,
            } => Self::bad_gateway(&error),

            // Internal server error
            StatCubeError::SemaphoreAcquireError(_)
            | StatCubeError::TryFromInt(_)
            | StatCubeError::Metrics(_) => Self::internal_server_error(&error),
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}
