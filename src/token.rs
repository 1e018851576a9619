// ABOUTME: JWT issuance and verification with a single HS256 symmetric key
// ABOUTME: Mints paired access and ID tokens and decodes bearer tokens with detailed errors
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

//! # Token Issuer
//!
//! Both the access token and the ID token derive from an [`Identity`] plus
//! the granted scope. The access token carries authorization claims (scope,
//! user type) for resource servers; the ID token additionally embeds profile
//! claims (email, display name) for the client application. One symmetric
//! key, loaded at process start, signs everything; there is no rotation.

use crate::models::{Identity, TokenResponse};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Default access/ID token lifetime in seconds
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// JWT validation error with detailed information
#[derive(Debug, Clone)]
pub enum JwtValidationError {
    /// Token has expired
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
        /// Current time for reference
        current_time: DateTime<Utc>,
    },
    /// Token signature is invalid
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Token is malformed (not proper JWT format)
    TokenMalformed {
        /// Details about malformation
        details: String,
    },
}

impl std::fmt::Display for JwtValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenExpired {
                expired_at,
                current_time,
            } => {
                let since = current_time.signed_duration_since(*expired_at);
                write!(
                    f,
                    "JWT token expired {} seconds ago at {}",
                    since.num_seconds(),
                    expired_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
            }
            Self::TokenInvalid { reason } => {
                write!(f, "JWT token signature is invalid: {reason}")
            }
            Self::TokenMalformed { details } => {
                write!(f, "JWT token is malformed: {details}")
            }
        }
    }
}

impl std::error::Error for JwtValidationError {}

/// JWT claims shared by access and ID tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (stable opaque user id)
    pub sub: String,
    /// Audience: the client id the token was issued to
    pub aud: String,
    /// Issuer base URL
    pub iss: String,
    /// Issued at (epoch seconds)
    pub iat: i64,
    /// Expiration (epoch seconds)
    pub exp: i64,
    /// Granted scopes
    #[serde(default)]
    pub scope: Vec<String>,
    /// Account type, for resource-server authorization decisions
    pub user_type: String,
    /// Profile email, ID token only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Profile display name, ID token only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A freshly minted access/ID token pair
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub id_token: String,
    pub expires_in: i64,
}

impl IssuedTokens {
    /// Convert to the wire response for POST /token
    #[must_use]
    pub fn into_response(self) -> TokenResponse {
        TokenResponse {
            access_token: self.access_token,
            token_type: "Bearer".to_owned(),
            expires_in: self.expires_in,
            id_token: self.id_token,
        }
    }
}

/// Token issuer holding the process-wide symmetric signing key
pub struct TokenIssuer {
    signing_key: Vec<u8>,
    issuer: String,
    token_ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(signing_key: &[u8], issuer: impl Into<String>, token_ttl_secs: i64) -> Self {
        Self {
            signing_key: signing_key.to_vec(),
            issuer: issuer.into(),
            token_ttl: Duration::seconds(token_ttl_secs),
        }
    }

    /// Seconds a freshly issued token lives
    #[must_use]
    pub fn token_ttl_secs(&self) -> i64 {
        self.token_ttl.num_seconds()
    }

    /// Base64url-encoded signing key for the JWKS document
    #[must_use]
    pub fn jwks_key(&self) -> String {
        use base64::{engine::general_purpose, Engine as _};
        general_purpose::URL_SAFE_NO_PAD.encode(&self.signing_key)
    }

    /// Issue an access/ID token pair for a resolved identity
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails.
    pub fn issue(
        &self,
        identity: &Identity,
        audience: &str,
        scope: &[String],
    ) -> Result<IssuedTokens, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let expiry = now + self.token_ttl;

        let access_claims = Claims {
            sub: identity.subject.clone(),
            aud: audience.to_owned(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            scope: scope.to_vec(),
            user_type: identity.user_type.as_str().to_owned(),
            email: None,
            name: None,
        };

        let id_claims = Claims {
            email: identity.email.clone(),
            name: Some(identity.display_name.clone()),
            ..access_claims.clone()
        };

        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(&self.signing_key);

        let access_token = encode(&header, &access_claims, &key)?;
        let id_token = encode(&header, &id_claims, &key)?;

        Ok(IssuedTokens {
            access_token,
            id_token,
            expires_in: self.token_ttl.num_seconds(),
        })
    }

    /// Verify signature and expiry, returning the decoded claims
    ///
    /// # Errors
    /// Returns a [`JwtValidationError`] if the token is expired, the
    /// signature does not verify, or the token is not valid JWT format.
    pub fn verify_and_decode(&self, token: &str) -> Result<Claims, JwtValidationError> {
        // Decode without expiry validation first so an expired-but-genuine
        // token is distinguishable from a forged one.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;

        let key = DecodingKey::from_secret(&self.signing_key);
        let claims = decode::<Claims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| Self::convert_jwt_error(&e))?;

        let current_time = Utc::now();
        if current_time.timestamp() >= claims.exp {
            let expired_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
            tracing::debug!(
                sub = %claims.sub,
                expired_at = %expired_at.to_rfc3339(),
                "Rejecting expired access token"
            );
            return Err(JwtValidationError::TokenExpired {
                expired_at,
                current_time,
            });
        }

        Ok(claims)
    }

    /// Convert JWT library errors to detailed validation errors
    fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> JwtValidationError {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::InvalidSignature => JwtValidationError::TokenInvalid {
                reason: "Token signature verification failed".into(),
            },
            ErrorKind::InvalidToken => JwtValidationError::TokenMalformed {
                details: "Token format is invalid".into(),
            },
            ErrorKind::Base64(base64_err) => JwtValidationError::TokenMalformed {
                details: format!("Token contains invalid base64: {base64_err}"),
            },
            ErrorKind::Json(json_err) => JwtValidationError::TokenMalformed {
                details: format!("Token contains invalid JSON: {json_err}"),
            },
            ErrorKind::Utf8(utf8_err) => JwtValidationError::TokenMalformed {
                details: format!("Token contains invalid UTF-8: {utf8_err}"),
            },
            _ => JwtValidationError::TokenInvalid {
                reason: format!("Token validation failed: {e}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserType;

    fn test_identity() -> Identity {
        Identity {
            subject: "sub-42".into(),
            email: Some("a@b.com".into()),
            phone: None,
            display_name: "Ada".into(),
            avatar_url: None,
            user_type: UserType::Developer,
            credential_hash: None,
            is_active: true,
            federated_id: None,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"unit-test-signing-key", "https://idp.test", 3600)
    }

    #[test]
    fn test_round_trip_claims() {
        let issuer = issuer();
        let scope = vec!["openid".to_owned(), "profile".to_owned()];
        let tokens = issuer.issue(&test_identity(), "client-1", &scope).unwrap();

        let access = issuer.verify_and_decode(&tokens.access_token).unwrap();
        assert_eq!(access.sub, "sub-42");
        assert_eq!(access.aud, "client-1");
        assert_eq!(access.scope, scope);
        assert_eq!(access.user_type, "developer");
        assert!(access.email.is_none());

        let id = issuer.verify_and_decode(&tokens.id_token).unwrap();
        assert_eq!(id.email.as_deref(), Some("a@b.com"));
        assert_eq!(id.name.as_deref(), Some("Ada"));
        assert_eq!(id.exp - id.iat, 3600);
    }

    #[test]
    fn test_expired_token_is_distinguished() {
        let issuer = TokenIssuer::new(b"unit-test-signing-key", "https://idp.test", -10);
        let tokens = issuer.issue(&test_identity(), "client-1", &[]).unwrap();

        match issuer.verify_and_decode(&tokens.access_token) {
            Err(JwtValidationError::TokenExpired { .. }) => {}
            other => panic!("expected TokenExpired, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_key_is_invalid_not_expired() {
        let issuer = issuer();
        let tokens = issuer.issue(&test_identity(), "client-1", &[]).unwrap();

        let other = TokenIssuer::new(b"different-key", "https://idp.test", 3600);
        match other.verify_and_decode(&tokens.access_token) {
            Err(JwtValidationError::TokenInvalid { .. }) => {}
            other => panic!("expected TokenInvalid, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        match issuer().verify_and_decode("not-a-jwt") {
            Err(JwtValidationError::TokenMalformed { .. }) => {}
            other => panic!("expected TokenMalformed, got {other:?}"),
        }
    }
}
