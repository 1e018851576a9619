// ABOUTME: Token endpoint route handlers for POST /token and GET /userinfo
// ABOUTME: Exchanges bound codes for token pairs and serves claims for bearer tokens
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

use crate::errors::AppError;
use crate::models::{TokenForm, TokenResponse, UserinfoResponse};
use crate::routes::client_ip;
use crate::server::ServerResources;
use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    routing::{get, post},
    Form, Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;

/// Token and userinfo routes
pub struct TokenRoutes;

impl TokenRoutes {
    /// Create token exchange and userinfo routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/token", post(Self::handle_token))
            .route("/userinfo", get(Self::handle_userinfo))
            .with_state(resources)
    }

    /// POST /token - redeem a bound authorization code
    async fn handle_token(
        State(resources): State<Arc<ServerResources>>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        Form(form): Form<TokenForm>,
    ) -> Result<Json<TokenResponse>, AppError> {
        let ip = client_ip(connect_info.as_ref());
        let status = resources.rate_limiter.check("token", ip);
        if status.is_limited {
            return Err(AppError::rate_limited(status.retry_after_seconds));
        }

        let response = resources.engine.redeem_code(&form).await?;
        Ok(Json(response))
    }

    /// GET /userinfo - resolve claims for a bearer access token
    async fn handle_userinfo(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<UserinfoResponse>, AppError> {
        let token = extract_bearer_token(&headers)?;
        let response = resources.engine.resolve_userinfo(token).await?;
        Ok(Json(response))
    }
}

/// Pull the bearer token out of the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::invalid_token("Missing authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::invalid_token("Authorization header must use the Bearer scheme"))
}
