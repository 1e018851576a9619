// ABOUTME: Unified error handling with protocol-aware error codes and HTTP response formatting
// ABOUTME: Maps every failure in the authorization flow to a status code and a {"detail": ...} body
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

//! # Unified Error Handling System
//!
//! Central error types for the authorization code provider. Every fallible
//! operation in the engine, stores, and HTTP layer surfaces an [`AppError`]
//! carrying an [`ErrorCode`], which determines the HTTP status. The wire
//! format is a flat `{"detail": "<message>"}` object.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Request validation (400/422)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput,
    #[serde(rename = "MISSING_REQUIRED_FIELD")]
    MissingRequiredField,

    // Protocol violations (400)
    #[serde(rename = "UNSUPPORTED_RESPONSE_TYPE")]
    UnsupportedResponseType,
    #[serde(rename = "UNSUPPORTED_GRANT_TYPE")]
    UnsupportedGrantType,
    #[serde(rename = "UNKNOWN_CLIENT")]
    UnknownClient,
    #[serde(rename = "REDIRECT_MISMATCH")]
    RedirectMismatch,
    #[serde(rename = "CLIENT_MISMATCH")]
    ClientMismatch,
    #[serde(rename = "MALFORMED_FEDERATION_STATE")]
    MalformedFederationState,

    // Authorization codes (400)
    #[serde(rename = "INVALID_AUTH_CODE")]
    InvalidAuthCode,

    // Authentication (401)
    #[serde(rename = "INVALID_CREDENTIALS")]
    InvalidCredentials,
    #[serde(rename = "ACCOUNT_INACTIVE")]
    AccountInactive,
    #[serde(rename = "INVALID_TOKEN")]
    InvalidToken,
    #[serde(rename = "TOKEN_EXPIRED")]
    TokenExpired,

    // Federated exchange (400)
    #[serde(rename = "FEDERATED_EXCHANGE_FAILED")]
    FederatedExchangeFailed,

    // A bound subject that has since disappeared; the code cannot be
    // redeemed, so this sits in the 400 family with the code errors
    #[serde(rename = "USER_NOT_FOUND")]
    UserNotFound,

    // Rate limiting (429)
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimitExceeded,

    // Internal (500)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "STORE_ERROR")]
    StoreError,
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidInput
            | Self::UnsupportedResponseType
            | Self::UnsupportedGrantType
            | Self::UnknownClient
            | Self::RedirectMismatch
            | Self::ClientMismatch
            | Self::MalformedFederationState
            | Self::InvalidAuthCode
            | Self::FederatedExchangeFailed
            | Self::UserNotFound => 400,

            // 401 Unauthorized
            Self::InvalidCredentials
            | Self::AccountInactive
            | Self::InvalidToken
            | Self::TokenExpired => 401,

            // 422 Unprocessable Entity
            Self::MissingRequiredField => 422,

            // 429 Too Many Requests
            Self::RateLimitExceeded => 429,

            // 500 Internal Server Error
            Self::InternalError | Self::StoreError | Self::ConfigError => 500,
        }
    }

    /// Get a user-facing description of this error
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidInput => "The provided input is invalid",
            Self::MissingRequiredField => "A required field is missing from the request",
            Self::UnsupportedResponseType => "Only the 'code' response type is supported",
            Self::UnsupportedGrantType => "Only the 'authorization_code' grant type is supported",
            Self::UnknownClient => "The client is not registered",
            Self::RedirectMismatch => "The redirect URI does not match the registered value",
            Self::ClientMismatch => "Client or redirect URI does not match the authorization code",
            Self::MalformedFederationState => "The federation state parameter is malformed",
            Self::InvalidAuthCode => "The authorization code is invalid, expired, or already used",
            Self::InvalidCredentials => "Invalid credentials",
            Self::AccountInactive => "The account is inactive",
            Self::InvalidToken => "The access token is invalid",
            Self::TokenExpired => "The access token has expired",
            Self::FederatedExchangeFailed => "The federated code exchange failed",
            Self::UserNotFound => "The user was not found",
            Self::RateLimitExceeded => "Rate limit exceeded. Please slow down your requests",
            Self::InternalError => "An internal server error occurred",
            Self::StoreError => "Storage operation failed",
            Self::ConfigError => "Configuration error encountered",
        }
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Seconds to wait before retrying, rendered as a `Retry-After` header
    pub retry_after_secs: Option<u64>,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after_secs: None,
            source: None,
        }
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response format: `{"detail": "<message>"}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        Self {
            detail: error.message.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(code = ?self.code, "{}", self);
        } else {
            tracing::debug!(code = ?self.code, "{}", self);
        }

        let mut response = (status, Json(ErrorResponse::from(&self))).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Convenience constructors for common errors
impl AppError {
    /// Unsupported response type at the authorize endpoint
    pub fn unsupported_response_type(value: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UnsupportedResponseType,
            format!("Unsupported response_type '{}'", value.into()),
        )
    }

    /// Unsupported grant type at the token endpoint
    pub fn unsupported_grant_type(value: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UnsupportedGrantType,
            format!("Unsupported grant_type '{}'", value.into()),
        )
    }

    /// Unknown client id
    pub fn unknown_client(client_id: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UnknownClient,
            format!("Unknown client '{}'", client_id.into()),
        )
    }

    /// Redirect URI mismatch
    pub fn redirect_mismatch() -> Self {
        Self::new(
            ErrorCode::RedirectMismatch,
            "redirect_uri does not match the registered value",
        )
    }

    /// Client/redirect binding mismatch at redemption
    pub fn client_mismatch() -> Self {
        Self::new(
            ErrorCode::ClientMismatch,
            "client_id or redirect_uri does not match the authorization code",
        )
    }

    /// Invalid, expired, or consumed authorization code
    pub fn invalid_auth_code() -> Self {
        Self::new(
            ErrorCode::InvalidAuthCode,
            "Invalid or expired authorization code",
        )
    }

    /// Unified invalid-credentials error. Deliberately identical for an
    /// unknown identifier and a wrong password so the response does not
    /// reveal whether an account exists.
    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::InvalidCredentials, "Invalid credentials")
    }

    /// Inactive account
    pub fn account_inactive() -> Self {
        Self::new(ErrorCode::AccountInactive, "Account is inactive")
    }

    /// Invalid bearer token
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    /// Expired bearer token
    pub fn token_expired() -> Self {
        Self::new(ErrorCode::TokenExpired, "Access token has expired")
    }

    /// Federated exchange failure, wrapping the provider message
    pub fn federated_exchange(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::FederatedExchangeFailed,
            format!("Federated exchange failed: {}", message.into()),
        )
    }

    /// Malformed federation state
    pub fn malformed_federation_state() -> Self {
        Self::new(
            ErrorCode::MalformedFederationState,
            "Malformed federation state parameter",
        )
    }

    /// Rate limit exceeded for an endpoint. `retry_after_secs` is the time
    /// until the caller's window resets.
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        let mut error = Self::new(
            ErrorCode::RateLimitExceeded,
            "Rate limit exceeded. Please slow down your requests",
        );
        error.retry_after_secs = Some(retry_after_secs);
        error
    }

    /// Missing required request field
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("Missing required field '{}'", field.into()),
        )
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// User bound to a code has disappeared
    pub fn user_not_found(subject: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UserNotFound,
            format!("No user for subject '{}'", subject.into()),
        )
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Store/dependency failure
    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreError, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }
}

/// Conversion from anyhow::Error for store and dependency boundaries
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(ErrorCode::StoreError, error.to_string())
    }
}
