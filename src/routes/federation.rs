// ABOUTME: Federated provider callback route handler for GET /wechat/callback
// ABOUTME: Recovers the local code from the round-tripped state and redirects back to the client
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

use crate::errors::AppError;
use crate::server::ServerResources;
use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters the external provider sends to the callback
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// The provider's authorization code, spent on the token exchange
    pub code: String,
    /// The round-tripped federation state
    pub state: String,
}

/// Federated callback routes
pub struct FederationRoutes;

impl FederationRoutes {
    /// Create the external provider callback route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/wechat/callback", get(Self::handle_callback))
            .with_state(resources)
    }

    /// GET /wechat/callback - complete a federated login
    ///
    /// Responds 307 back to the client's redirect URI with the original
    /// code and state on success.
    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        Query(params): Query<CallbackParams>,
    ) -> Result<Redirect, AppError> {
        let redirect_url = resources
            .engine
            .complete_federated_login(&params.code, &params.state)
            .await?;
        Ok(Redirect::temporary(&redirect_url))
    }
}
