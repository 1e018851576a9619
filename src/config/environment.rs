// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, deployment modes, and runtime configuration parsing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

//! Environment-based configuration management for production deployment

use crate::models::RegisteredClient;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

/// Default HTTP port when `LANTERN_HTTP_PORT` is unset
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Environment type for security and other configurations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// External WeChat provider credentials
#[derive(Debug, Clone)]
pub struct WeChatConfig {
    pub app_id: String,
    pub app_secret: String,
    /// This server's callback URL as registered with the provider
    pub redirect_uri: String,
}

/// Server configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port to bind
    pub http_port: u16,
    /// Issuer base URL published in the discovery document and `iss` claims
    pub issuer_url: String,
    /// Symmetric signing key for HS256 tokens
    pub signing_key: Vec<u8>,
    /// Authorization code lifetime in seconds
    pub auth_code_ttl_secs: i64,
    /// Access/ID token lifetime in seconds
    pub token_ttl_secs: i64,
    /// Deployment environment
    pub environment: Environment,
    /// WeChat provider credentials
    pub wechat: WeChatConfig,
    /// Provisioned OAuth clients
    pub clients: Vec<RegisteredClient>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error when a required variable is missing or a value
    /// fails to parse.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        let http_port = env_var_or("LANTERN_HTTP_PORT", &DEFAULT_HTTP_PORT.to_string())?
            .parse()
            .context("Invalid LANTERN_HTTP_PORT value")?;

        let issuer_url = env_var_or("LANTERN_ISSUER_URL", &format!("http://localhost:{http_port}"))?;

        let signing_key = env::var("LANTERN_SIGNING_KEY")
            .context("LANTERN_SIGNING_KEY must be set")?
            .into_bytes();
        anyhow::ensure!(
            signing_key.len() >= 32,
            "LANTERN_SIGNING_KEY must be at least 32 bytes"
        );

        let auth_code_ttl_secs = env_var_or(
            "LANTERN_AUTH_CODE_TTL_SECS",
            &crate::store::memory::DEFAULT_AUTH_CODE_TTL_SECS.to_string(),
        )?
        .parse()
        .context("Invalid LANTERN_AUTH_CODE_TTL_SECS value")?;

        let token_ttl_secs = env_var_or(
            "LANTERN_TOKEN_TTL_SECS",
            &crate::token::DEFAULT_TOKEN_TTL_SECS.to_string(),
        )?
        .parse()
        .context("Invalid LANTERN_TOKEN_TTL_SECS value")?;

        let environment = Environment::from_str_or_default(
            &env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        );

        let wechat = WeChatConfig {
            app_id: env::var("WECHAT_APP_ID").unwrap_or_default(),
            app_secret: env::var("WECHAT_APP_SECRET").unwrap_or_default(),
            redirect_uri: env_var_or(
                "WECHAT_REDIRECT_URI",
                &format!("http://localhost:{http_port}/wechat/callback"),
            )?,
        };
        if wechat.app_id.is_empty() {
            warn!("WECHAT_APP_ID not set - federated login will fail at the provider");
        }

        let clients = match env::var("LANTERN_CLIENTS") {
            Ok(raw) => serde_json::from_str(&raw)
                .context("LANTERN_CLIENTS must be a JSON array of client objects")?,
            Err(_) => {
                warn!("LANTERN_CLIENTS not set - no OAuth clients provisioned");
                Vec::new()
            }
        };

        Ok(Self {
            http_port,
            issuer_url,
            signing_key,
            auth_code_ttl_secs,
            token_ttl_secs,
            environment,
            wechat,
            clients,
        })
    }

    /// Human-readable startup summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Lantern IdP Configuration:\n\
             - HTTP Port: {}\n\
             - Issuer: {}\n\
             - Environment: {}\n\
             - Auth Code TTL: {}s\n\
             - Token TTL: {}s\n\
             - WeChat Login: {}\n\
             - Registered Clients: {}",
            self.http_port,
            self.issuer_url,
            self.environment,
            self.auth_code_ttl_secs,
            self.token_ttl_secs,
            if self.wechat.app_id.is_empty() {
                "Disabled"
            } else {
                "Enabled"
            },
            self.clients.len()
        )
    }
}

fn env_var_or(key: &str, default: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Ok(default.to_owned()),
    }
}
