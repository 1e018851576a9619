// ABOUTME: Core data models for clients, identities, authorization codes, and protocol DTOs
// ABOUTME: One explicit value type per concept, shared uniformly by stores, engine, and routes
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered OAuth client. Immutable once loaded; created by
/// administrative provisioning and read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredClient {
    /// OAuth client identifier
    pub client_id: String,
    /// Client secret as provisioned
    pub client_secret: String,
    /// Registered redirect URI, compared byte-for-byte at authorize-time
    /// and redeem-time
    pub redirect_uri: String,
    /// Human-readable client name
    pub name: String,
}

/// Account type for an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Developer,
    Merchant,
    Admin,
    Regular,
}

impl UserType {
    /// Wire name used in token claims
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Developer => "developer",
            Self::Merchant => "merchant",
            Self::Admin => "admin",
            Self::Regular => "regular",
        }
    }
}

impl Default for UserType {
    fn default() -> Self {
        Self::Regular
    }
}

/// A local account identity
#[derive(Debug, Clone)]
pub struct Identity {
    /// Stable opaque identifier, independent of email/phone
    pub subject: String,
    /// Email address, if registered with one
    pub email: Option<String>,
    /// Phone number, if registered with one
    pub phone: Option<String>,
    /// Display name shown to clients
    pub display_name: String,
    /// Avatar URL, populated from federated profiles
    pub avatar_url: Option<String>,
    /// Account type
    pub user_type: UserType,
    /// bcrypt hash of the login credential; absent for federated-only
    /// accounts whose placeholder credential is never surfaced
    pub credential_hash: Option<String>,
    /// Whether the account can log in
    pub is_active: bool,
    /// Remote subject id for federated accounts
    pub federated_id: Option<String>,
    /// When the identity was created
    pub created_at: DateTime<Utc>,
    /// Last successful login, if any
    pub last_login_at: Option<DateTime<Utc>>,
}

/// An authorization code record. Created unbound (`subject == None`),
/// bound exactly once on successful login, removed on redemption.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    /// The opaque code value (>= 128 bits of entropy, URL-safe base64)
    pub code: String,
    /// Client that requested this code
    pub client_id: String,
    /// Subject bound by a completed login; `None` while unbound
    pub subject: Option<String>,
    /// Redirect URI that must match at redemption
    pub redirect_uri: String,
    /// Requested scopes
    pub scope: Vec<String>,
    /// Client-supplied state, echoed back on redirect
    pub state: Option<String>,
    /// Fixed expiry, 600 seconds from creation regardless of binding time
    pub expires_at: DateTime<Utc>,
    /// When this code was created
    pub created_at: DateTime<Utc>,
}

impl AuthorizationCode {
    /// Whether a login has bound this code to a subject
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.subject.is_some()
    }

    /// Whether the code is past its expiry at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Profile data returned by a federated provider, used when materializing
/// a local identity on first federated login
#[derive(Debug, Clone, Default)]
pub struct FederatedProfile {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Query parameters for GET /authorize
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// "federated" routes the login through the external provider
    #[serde(default)]
    pub login_type: Option<String>,
}

/// Form body for POST /login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub auth_code: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub state: Option<String>,
    /// "email" or "phone"; selects which identifier field is required
    pub login_type: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
}

/// Form body for POST /token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenForm {
    pub grant_type: String,
    pub code: String,
    pub redirect_uri: String,
    pub client_id: String,
}

/// Response body for POST /token
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Signed access token (JWT)
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Seconds until the access token expires
    pub expires_in: i64,
    /// Signed ID token carrying profile claims
    pub id_token: String,
}

/// Response body for GET /userinfo
#[derive(Debug, Serialize, Deserialize)]
pub struct UserinfoResponse {
    pub sub: String,
    pub email: Option<String>,
    pub name: String,
}

/// Outcome of `AuthorizationEngine::begin_authorization`
#[derive(Debug, Clone)]
pub enum AuthorizationStart {
    /// Present the credential form carrying the unbound code
    CredentialForm {
        code: String,
        client_name: String,
        scope: Vec<String>,
    },
    /// Redirect the browser to the external provider
    FederatedRedirect { url: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_authorization_code_expiry_boundary() {
        let created = Utc::now();
        let code = AuthorizationCode {
            code: "abc".into(),
            client_id: "c1".into(),
            subject: None,
            redirect_uri: "https://cb".into(),
            scope: vec!["openid".into()],
            state: None,
            expires_at: created + Duration::seconds(600),
            created_at: created,
        };

        assert!(!code.is_expired(created + Duration::seconds(599)));
        assert!(code.is_expired(created + Duration::seconds(600)));
        assert!(code.is_expired(created + Duration::seconds(601)));
    }

    #[test]
    fn test_user_type_wire_names() {
        assert_eq!(UserType::Developer.as_str(), "developer");
        assert_eq!(UserType::default().as_str(), "regular");
    }
}
