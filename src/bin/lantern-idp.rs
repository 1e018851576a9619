// ABOUTME: Server binary for the Lantern identity provider
// ABOUTME: Loads environment configuration, initializes logging, and runs the HTTP server
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

//! # Lantern IdP Server Binary

use anyhow::Result;
use clap::Parser;
use lantern_idp::{config::ServerConfig, logging, server};
use tracing::info;

#[derive(Parser)]
#[command(name = "lantern-idp")]
#[command(about = "Lantern IdP - OIDC-style authorization code server with federated login")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting Lantern IdP");
    info!("{}", config.summary());
    info!("Available endpoints:");
    info!("  GET  /.well-known/openid_configuration - Discovery document");
    info!("  GET  /.well-known/jwks.json - Signing key set");
    info!("  GET  /authorize - Start an authorization flow");
    info!("  POST /login - Submit credentials for a pending code");
    info!("  POST /token - Redeem a code for tokens");
    info!("  GET  /userinfo - Claims for a bearer token");
    info!("  GET  /wechat/callback - Federated login callback");
    info!("  GET  /health, /ready - Service probes");

    server::run(config).await
}
