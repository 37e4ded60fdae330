use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::Provider;

#[derive(Error, Debug)]
pub enum AdsError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No data between {since} and {until}")]
    NoData { since: NaiveDate, until: NaiveDate },
    #[error("{provider} request failed ({status}): {message}")]
    ProviderRequest {
        provider: Provider,
        status: u16,
        code: Option<i64>,
        message: String,
    },
    #[error("Rate limited by {provider}")]
    RateLimited {
        provider: Provider,
        retry_after: Option<u64>,
    },
    #[error("Transport error talking to {provider}: {message}")]
    Transport { provider: Provider, message: String },
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: Provider, message: String },
    #[error("Chat service error: {0}")]
    ChatService(String),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AdsError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::NoData { .. } => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ProviderRequest { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::InvalidResponse { .. } | Self::ChatService(_) => StatusCode::BAD_GATEWAY,
            Self::MissingConfiguration(_) | Self::Transport { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::NoData { since, until } => Some(json!({ "since": since, "until": until })),
            Self::RateLimited {
                provider,
                retry_after,
            } => Some(json!({ "provider": provider, "retryAfter": retry_after })),
            Self::ProviderRequest { provider, code, .. } => {
                Some(json!({ "provider": provider, "code": code }))
            }
            Self::Transport { provider, .. } | Self::InvalidResponse { provider, .. } => {
                Some(json!({ "provider": provider }))
            }
            _ => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            details: self.details(),
        }
    }
}

impl IntoResponse for AdsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = match &self {
            Self::RateLimited {
                retry_after: Some(secs),
                ..
            } => HeaderValue::from_str(&secs.to_string()).ok(),
            _ => None,
        };

        let mut response = (status, Json(self.body())).into_response();
        if let Some(value) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}
