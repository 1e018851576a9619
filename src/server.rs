// ABOUTME: HTTP server assembly: shared resources, router construction, and the serve loop
// ABOUTME: Wires stores, token issuer, federation bridge, and engine into one axum application
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

//! # Server Assembly
//!
//! [`ServerResources`] is the dependency container shared by every route
//! handler. Handlers receive it as axum state and reach the engine, the
//! token issuer, and the rate limiter through it.

use crate::config::ServerConfig;
use crate::engine::AuthorizationEngine;
use crate::federation::{FederatedLoginBridge, FederatedProvider, WeChatProvider};
use crate::rate_limiting::RateLimiter;
use crate::routes::{AuthorizeRoutes, DiscoveryRoutes, FederationRoutes, HealthRoutes, TokenRoutes};
use crate::store::{
    AuthCodeStore, ClientRegistry, MemoryAuthCodeStore, MemoryClientRegistry, MemoryUserDirectory,
    UserDirectory,
};
use crate::token::TokenIssuer;
use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared dependencies for all route handlers
pub struct ServerResources {
    pub config: ServerConfig,
    pub engine: AuthorizationEngine,
    pub token_issuer: Arc<TokenIssuer>,
    pub rate_limiter: RateLimiter,
}

impl ServerResources {
    /// Build resources with in-memory stores and the real WeChat provider
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let provider: Arc<dyn FederatedProvider> = Arc::new(WeChatProvider::new(
            config.wechat.app_id.clone(),
            config.wechat.app_secret.clone(),
            config.wechat.redirect_uri.clone(),
        ));

        let clients: Arc<dyn ClientRegistry> =
            Arc::new(MemoryClientRegistry::new(config.clients.clone()));
        let users: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());
        let codes: Arc<dyn AuthCodeStore> = Arc::new(MemoryAuthCodeStore::with_ttl(
            chrono::Duration::seconds(config.auth_code_ttl_secs),
        ));

        Self::with_stores(config, provider, clients, users, codes)
    }

    /// Build resources with injected stores and provider. Tests use this
    /// to seed directories and stub the external provider.
    #[must_use]
    pub fn with_stores(
        config: ServerConfig,
        provider: Arc<dyn FederatedProvider>,
        clients: Arc<dyn ClientRegistry>,
        users: Arc<dyn UserDirectory>,
        codes: Arc<dyn AuthCodeStore>,
    ) -> Self {
        let token_issuer = Arc::new(TokenIssuer::new(
            &config.signing_key,
            config.issuer_url.clone(),
            config.token_ttl_secs,
        ));

        let federation = Arc::new(FederatedLoginBridge::new(provider, Arc::clone(&users)));

        let engine = AuthorizationEngine::new(
            clients,
            users,
            codes,
            Arc::clone(&token_issuer),
            federation,
        );

        Self {
            config,
            engine,
            token_issuer,
            rate_limiter: RateLimiter::default(),
        }
    }
}

/// Assemble the full application router
#[must_use]
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(DiscoveryRoutes::routes(Arc::clone(&resources)))
        .merge(AuthorizeRoutes::routes(Arc::clone(&resources)))
        .merge(TokenRoutes::routes(Arc::clone(&resources)))
        .merge(FederationRoutes::routes(Arc::clone(&resources)))
        .merge(HealthRoutes::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the server until the process is terminated
///
/// # Errors
/// Returns an error if the listener fails to bind or the server loop
/// exits abnormally.
pub async fn run(config: ServerConfig) -> Result<()> {
    let port = config.http_port;
    let resources = Arc::new(ServerResources::new(config));
    let router = build_router(resources);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP server listening on {addr}");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("HTTP server exited")?;

    Ok(())
}
