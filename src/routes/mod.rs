// ABOUTME: HTTP route handlers grouped by endpoint family
// ABOUTME: Each submodule owns one slice of the surface and exposes a routes() constructor
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

//! HTTP routes for the authorization server
//!
//! Route structure:
//! - `discovery` - OIDC discovery document and JWKS
//! - `authorize` - GET /authorize and POST /login
//! - `token` - POST /token and GET /userinfo
//! - `federation` - external provider callback
//! - `health` - liveness and readiness probes

pub mod authorize;
pub mod discovery;
pub mod federation;
pub mod health;
pub mod token;

pub use authorize::AuthorizeRoutes;
pub use discovery::DiscoveryRoutes;
pub use federation::FederationRoutes;
pub use health::HealthRoutes;
pub use token::TokenRoutes;

use axum::extract::ConnectInfo;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Client IP for rate limiting. Falls back to loopback when the listener
/// does not provide connection info (e.g. in-process test requests).
#[must_use]
pub fn client_ip(connect_info: Option<&ConnectInfo<SocketAddr>>) -> IpAddr {
    connect_info.map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |info| info.0.ip())
}
