// ABOUTME: OIDC discovery document and JWKS route handlers
// ABOUTME: Publishes issuer metadata and the symmetric signing key descriptor
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

//! Discovery routes
//!
//! The discovery path uses an underscore (`openid_configuration`) rather
//! than the hyphenated OIDC standard path; clients of this server expect
//! the underscore form and it is preserved as the wire contract.

use crate::server::ServerResources;
use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

/// Discovery document routes
pub struct DiscoveryRoutes;

impl DiscoveryRoutes {
    /// Create discovery and JWKS routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/.well-known/openid_configuration",
                get(Self::handle_discovery),
            )
            .route("/.well-known/jwks.json", get(Self::handle_jwks))
            .with_state(resources)
    }

    async fn handle_discovery(
        State(resources): State<Arc<ServerResources>>,
    ) -> Json<serde_json::Value> {
        let issuer = &resources.config.issuer_url;
        Json(serde_json::json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/authorize"),
            "token_endpoint": format!("{issuer}/token"),
            "userinfo_endpoint": format!("{issuer}/userinfo"),
            "jwks_uri": format!("{issuer}/.well-known/jwks.json"),
            "response_types_supported": ["code"],
            "grant_types_supported": ["authorization_code"],
            "subject_types_supported": ["public"],
            "id_token_signing_alg_values_supported": ["HS256"],
            "scopes_supported": ["openid", "profile", "email"],
        }))
    }

    async fn handle_jwks(
        State(resources): State<Arc<ServerResources>>,
    ) -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "keys": [{
                "kty": "oct",
                "use": "sig",
                "alg": "HS256",
                "k": resources.token_issuer.jwks_key(),
            }]
        }))
    }
}
