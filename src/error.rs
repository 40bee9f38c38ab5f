//! HTTP rendering of engine errors and undecodable requests.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::config::Environment;
use crate::engine::EngineError;

/// Message shown instead of storage failures in production.
pub const GENERIC_MESSAGE: &str = "Unexpected Error";

/// What went wrong with a request.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The query string or body could not be decoded.
    #[error("malformed request: {0}")]
    Malformed(String),
}

impl Failure {
    fn is_client_error(&self) -> bool {
        match self {
            Failure::Engine(e) => e.is_domain(),
            Failure::Malformed(_) => true,
        }
    }
}

/// A [`Failure`] on its way out, together with the environment that
/// decides how much of it the client may see.
#[derive(Debug, Error)]
#[error("{failure}")]
pub struct ApiError {
    failure: Failure,
    environment: Environment,
}

impl ApiError {
    pub fn new(source: EngineError, environment: Environment) -> Self {
        Self {
            failure: source.into(),
            environment,
        }
    }

    pub fn malformed(message: impl Into<String>, environment: Environment) -> Self {
        Self {
            failure: Failure::Malformed(message.into()),
            environment,
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.failure {
            Failure::Malformed(_) => StatusCode::BAD_REQUEST,
            Failure::Engine(EngineError::Invalid(_) | EngineError::Overlap) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Failure::Engine(EngineError::NotFound(_)) => StatusCode::NOT_FOUND,
            Failure::Engine(EngineError::WalError(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Value of the `status` field in the error body.
    pub fn label(&self) -> &'static str {
        match &self.failure {
            Failure::Malformed(_) => "bad_request",
            Failure::Engine(EngineError::Invalid(_) | EngineError::Overlap) => {
                "unprocessable_entity"
            }
            Failure::Engine(EngineError::NotFound(_)) => "not_found",
            Failure::Engine(EngineError::WalError(_)) => "internal_server_error",
        }
    }

    /// Client errors always carry their message; unexpected ones only outside production.
    pub fn message(&self) -> String {
        if self.failure.is_client_error() || !self.environment.is_production() {
            self.failure.to_string()
        } else {
            GENERIC_MESSAGE.to_string()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.failure.is_client_error() {
            warn!("request failed -- {}", self.failure);
        } else {
            error!("request failed -- {}", self.failure);
        }

        let body = Json(json!({ "status": self.label(), "message": self.message() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use ulid::Ulid;

    use super::*;
    use crate::validate::ValidationError;

    #[test]
    fn domain_errors_are_unprocessable() {
        for err in [
            EngineError::Invalid(ValidationError::WeekendNotAllowed),
            EngineError::Overlap,
        ] {
            let api = ApiError::new(err, Environment::Production);
            assert_eq!(api.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn not_found_is_404() {
        let api = ApiError::new(EngineError::NotFound(Ulid::new()), Environment::Development);
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn domain_messages_survive_production() {
        let api = ApiError::new(
            EngineError::Invalid(ValidationError::OutOfHours),
            Environment::Production,
        );
        assert_eq!(api.message(), ValidationError::OutOfHours.to_string());
    }

    #[test]
    fn storage_failures_hidden_in_production_only() {
        let prod = ApiError::new(EngineError::WalError("disk full".into()), Environment::Production);
        assert_eq!(prod.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(prod.message(), GENERIC_MESSAGE);

        let dev = ApiError::new(EngineError::WalError("disk full".into()), Environment::Development);
        assert_eq!(dev.message(), "WAL error: disk full");

        let staging = ApiError::new(EngineError::WalError("disk full".into()), Environment::Staging);
        assert_eq!(staging.message(), "WAL error: disk full");
    }

    #[test]
    fn malformed_requests_are_400_even_in_production() {
        let api = ApiError::malformed("missing field `id`", Environment::Production);
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.label(), "bad_request");
        assert_eq!(api.message(), "malformed request: missing field `id`");
    }
}
