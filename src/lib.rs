// ABOUTME: Main library entry point for the Lantern identity provider
// ABOUTME: Provides an OIDC-style authorization code flow with federated WeChat login
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

#![deny(unsafe_code)]

//! # Lantern IdP
//!
//! An OIDC-style authorization code provider with a federated third-party
//! login bridge. The server issues short-lived single-use authorization
//! codes, binds them to authenticated identities (by direct credentials or
//! a WeChat-style federated exchange), and redeems bound codes for signed
//! access and ID token pairs.
//!
//! ## Architecture
//!
//! - **models**: value types shared by stores, engine, and routes
//! - **store**: injected persistence traits with in-memory backends
//! - **crypto**: code generation and credential verification
//! - **token**: HS256 token issuance and verification
//! - **federation**: the external-provider bridge and its state format
//! - **engine**: the authorize/login/token state machine
//! - **routes** / **server**: the HTTP surface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lantern_idp::config::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     lantern_idp::server::run(config).await
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod engine;
pub mod errors;
pub mod federation;
pub mod logging;
pub mod models;
pub mod rate_limiting;
pub mod routes;
pub mod server;
pub mod store;
pub mod token;
