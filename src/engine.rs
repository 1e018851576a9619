// ABOUTME: Authorization engine orchestrating the authorize, login, and token lifecycle
// ABOUTME: Owns the code state machine: created unbound, bound on login, destroyed on redemption
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

//! # Authorization Engine
//!
//! The engine is stateless between calls; everything durable lives behind
//! the store traits, so many engine instances can share one store. Each
//! public method maps to one HTTP operation.
//!
//! Code lifecycle: `CREATED (unbound) -> BOUND -> REDEEMED`, or expiry from
//! either live state. Redemption is destructive and at-most-once; the
//! store's `consume` enforces that under concurrency.

use crate::crypto::verify_password;
use crate::errors::{AppError, AppResult};
use crate::federation::{FederatedLoginBridge, FederationState};
use crate::models::{
    AuthorizationStart, AuthorizeParams, Identity, LoginForm, TokenForm, TokenResponse,
    UserinfoResponse,
};
use crate::store::{AuthCodeStore, ClientRegistry, UserDirectory};
use crate::token::{JwtValidationError, TokenIssuer};
use chrono::Utc;
use std::sync::Arc;

/// Scope granted when the client omits the `scope` parameter
const DEFAULT_SCOPE: &str = "openid";

pub struct AuthorizationEngine {
    clients: Arc<dyn ClientRegistry>,
    users: Arc<dyn UserDirectory>,
    codes: Arc<dyn AuthCodeStore>,
    tokens: Arc<TokenIssuer>,
    federation: Arc<FederatedLoginBridge>,
}

impl AuthorizationEngine {
    #[must_use]
    pub fn new(
        clients: Arc<dyn ClientRegistry>,
        users: Arc<dyn UserDirectory>,
        codes: Arc<dyn AuthCodeStore>,
        tokens: Arc<TokenIssuer>,
        federation: Arc<FederatedLoginBridge>,
    ) -> Self {
        Self {
            clients,
            users,
            codes,
            tokens,
            federation,
        }
    }

    /// Validate an authorize request, mint an unbound code, and decide
    /// whether to present the credential form or bounce to the external
    /// provider.
    ///
    /// # Errors
    /// `UnsupportedResponseType`, `UnknownClient`, or `RedirectMismatch`
    /// for protocol violations; store errors pass through.
    pub async fn begin_authorization(
        &self,
        params: &AuthorizeParams,
    ) -> AppResult<AuthorizationStart> {
        if params.response_type != "code" {
            return Err(AppError::unsupported_response_type(&params.response_type));
        }

        let client = self
            .clients
            .get_client(&params.client_id)
            .await?
            .ok_or_else(|| AppError::unknown_client(&params.client_id))?;

        if client.redirect_uri != params.redirect_uri {
            return Err(AppError::redirect_mismatch());
        }

        let scope = parse_scope(params.scope.as_deref());
        let code = self
            .codes
            .create(
                &params.client_id,
                &params.redirect_uri,
                scope.clone(),
                params.state.clone(),
                Utc::now(),
            )
            .await?;

        tracing::info!(
            client_id = %params.client_id,
            login_type = params.login_type.as_deref().unwrap_or("direct"),
            "Authorization started"
        );

        if params.login_type.as_deref() == Some("federated") {
            let url = self
                .federation
                .build_redirect_url(&code, params.state.as_deref());
            return Ok(AuthorizationStart::FederatedRedirect { url });
        }

        Ok(AuthorizationStart::CredentialForm {
            code,
            client_name: client.name,
            scope,
        })
    }

    /// Verify submitted credentials and bind the pending code to the
    /// authenticated subject. Returns the redirect URL back to the client.
    ///
    /// The code is bound only after credential verification succeeds, so a
    /// failed attempt leaves it unbound and still usable by a retry.
    ///
    /// # Errors
    /// `InvalidAuthCode` for an absent or expired code, `RedirectMismatch`
    /// when the form's redirect differs from the stored one,
    /// `InvalidCredentials` for an unknown identifier or wrong password
    /// (deliberately the same error), `AccountInactive` for disabled
    /// accounts, `MissingRequiredField` / `InvalidInput` for bad forms.
    pub async fn complete_direct_login(&self, form: &LoginForm) -> AppResult<String> {
        let now = Utc::now();

        let record = self
            .codes
            .get(&form.auth_code, now)
            .await?
            .ok_or_else(AppError::invalid_auth_code)?;

        if record.redirect_uri != form.redirect_uri {
            return Err(AppError::redirect_mismatch());
        }

        let identity = self.resolve_credentials(form).await?;

        if !identity.is_active {
            return Err(AppError::account_inactive());
        }

        let bound = self.codes.bind(&form.auth_code, &identity.subject, now).await?;
        if !bound {
            // Expired between lookup and bind
            return Err(AppError::invalid_auth_code());
        }

        self.users.record_login(&identity.subject, now).await?;

        tracing::info!(
            subject = %identity.subject,
            client_id = %record.client_id,
            "Direct login bound authorization code"
        );

        Ok(redirect_with_code(
            &record.redirect_uri,
            &form.auth_code,
            form.state.as_deref().or(record.state.as_deref()),
        ))
    }

    /// Handle the external provider's callback: recover the local code from
    /// the federation state, exchange the remote code for an identity, and
    /// bind. Returns the redirect URL back to the client.
    ///
    /// # Errors
    /// `MalformedFederationState` for an unparseable state,
    /// `InvalidAuthCode` for an absent or expired local code,
    /// `FederatedExchangeFailed` when the remote exchange fails.
    pub async fn complete_federated_login(
        &self,
        remote_code: &str,
        raw_state: &str,
    ) -> AppResult<String> {
        let federation_state = FederationState::parse(raw_state)?;
        let now = Utc::now();

        // Validate the local code before spending the remote one; a dead
        // local code would waste the single-use remote exchange.
        let record = self
            .codes
            .get(&federation_state.auth_code, now)
            .await?
            .ok_or_else(AppError::invalid_auth_code)?;

        let identity = self.federation.resolve_identity(remote_code).await?;

        if !identity.is_active {
            return Err(AppError::account_inactive());
        }

        let bound = self
            .codes
            .bind(&federation_state.auth_code, &identity.subject, now)
            .await?;
        if !bound {
            return Err(AppError::invalid_auth_code());
        }

        self.users.record_login(&identity.subject, now).await?;

        tracing::info!(
            subject = %identity.subject,
            client_id = %record.client_id,
            "Federated login bound authorization code"
        );

        let state = if federation_state.original_state.is_empty() {
            None
        } else {
            Some(federation_state.original_state.as_str())
        };
        Ok(redirect_with_code(
            &record.redirect_uri,
            &federation_state.auth_code,
            state,
        ))
    }

    /// Redeem a bound code for an access/ID token pair. At most one
    /// redemption ever succeeds per code.
    ///
    /// # Errors
    /// `UnsupportedGrantType`, `InvalidAuthCode` for absent/expired/unbound
    /// or already-consumed codes, `ClientMismatch` when the caller's
    /// client_id or redirect_uri differ from the stored ones,
    /// `UserNotFound` if the bound subject has since disappeared.
    pub async fn redeem_code(&self, form: &TokenForm) -> AppResult<TokenResponse> {
        if form.grant_type != "authorization_code" {
            return Err(AppError::unsupported_grant_type(&form.grant_type));
        }

        let now = Utc::now();

        // Read first for distinct error reporting; a mismatch must not
        // destroy the code.
        let record = self
            .codes
            .get(&form.code, now)
            .await?
            .ok_or_else(AppError::invalid_auth_code)?;

        if !record.is_bound() {
            return Err(AppError::invalid_auth_code());
        }

        if record.client_id != form.client_id || record.redirect_uri != form.redirect_uri {
            return Err(AppError::client_mismatch());
        }

        // Atomic check-and-delete; a concurrent redeemer that lost the race
        // sees None here even though the read above succeeded.
        let record = self
            .codes
            .consume(&form.code, now)
            .await?
            .ok_or_else(AppError::invalid_auth_code)?;

        let subject = record
            .subject
            .as_deref()
            .ok_or_else(AppError::invalid_auth_code)?;

        let identity = self
            .users
            .find_by_subject(subject)
            .await?
            .ok_or_else(|| AppError::user_not_found(subject))?;

        let issued = self
            .tokens
            .issue(&identity, &form.client_id, &record.scope)
            .map_err(|e| AppError::internal(format!("Token signing failed: {e}")))?;

        tracing::info!(
            subject = %identity.subject,
            client_id = %form.client_id,
            "Authorization code redeemed"
        );

        Ok(issued.into_response())
    }

    /// Resolve the public claims for a bearer access token
    ///
    /// # Errors
    /// `InvalidToken` or `TokenExpired` for bad tokens, `UserNotFound` if
    /// the subject no longer exists.
    pub async fn resolve_userinfo(&self, access_token: &str) -> AppResult<UserinfoResponse> {
        let claims = self
            .tokens
            .verify_and_decode(access_token)
            .map_err(|e| match e {
                JwtValidationError::TokenExpired { .. } => AppError::token_expired(),
                other => AppError::invalid_token(other.to_string()),
            })?;

        let identity = self
            .users
            .find_by_subject(&claims.sub)
            .await?
            .ok_or_else(|| AppError::user_not_found(&claims.sub))?;

        Ok(UserinfoResponse {
            sub: identity.subject,
            email: identity.email,
            name: identity.display_name,
        })
    }

    /// Resolve and verify direct-login credentials. Unknown identifier and
    /// wrong password both map to the same `InvalidCredentials`.
    async fn resolve_credentials(&self, form: &LoginForm) -> AppResult<Identity> {
        let identity = match form.login_type.as_str() {
            "email" => {
                let email = form
                    .email
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| AppError::missing_field("email"))?;
                self.users.find_by_email(email).await?
            }
            "phone" => {
                let phone = form
                    .phone
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| AppError::missing_field("phone"))?;
                self.users.find_by_phone(phone).await?
            }
            other => {
                return Err(AppError::invalid_input(format!(
                    "login_type must be 'email' or 'phone', got '{other}'"
                )));
            }
        };

        let identity = identity.ok_or_else(AppError::invalid_credentials)?;

        // Federated-only accounts carry a placeholder hash that never
        // verifies; accounts without any hash cannot log in directly.
        let verified = identity
            .credential_hash
            .as_deref()
            .is_some_and(|hash| verify_password(&form.password, hash));
        if !verified {
            return Err(AppError::invalid_credentials());
        }

        Ok(identity)
    }
}

/// Build the client redirect carrying the code and echoed state
fn redirect_with_code(redirect_uri: &str, code: &str, state: Option<&str>) -> String {
    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    match state {
        Some(state) if !state.is_empty() => format!(
            "{redirect_uri}{separator}code={}&state={}",
            urlencoding::encode(code),
            urlencoding::encode(state)
        ),
        _ => format!("{redirect_uri}{separator}code={}", urlencoding::encode(code)),
    }
}

/// Split a space-delimited scope parameter, defaulting to `openid`
fn parse_scope(raw: Option<&str>) -> Vec<String> {
    let scopes: Vec<String> = raw
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_owned)
        .collect();

    if scopes.is_empty() {
        vec![DEFAULT_SCOPE.to_owned()]
    } else {
        scopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scope_defaults_to_openid() {
        assert_eq!(parse_scope(None), vec!["openid"]);
        assert_eq!(parse_scope(Some("")), vec!["openid"]);
        assert_eq!(parse_scope(Some("   ")), vec!["openid"]);
    }

    #[test]
    fn test_parse_scope_splits_on_whitespace() {
        assert_eq!(
            parse_scope(Some("openid profile email")),
            vec!["openid", "profile", "email"]
        );
    }

    #[test]
    fn test_redirect_with_code_appends_query() {
        assert_eq!(
            redirect_with_code("https://cb", "abc", Some("s1")),
            "https://cb?code=abc&state=s1"
        );
        assert_eq!(
            redirect_with_code("https://cb?tenant=t1", "abc", None),
            "https://cb?tenant=t1&code=abc"
        );
    }

    #[test]
    fn test_redirect_state_is_url_encoded() {
        let url = redirect_with_code("https://cb", "abc", Some("a b&c"));
        assert_eq!(url, "https://cb?code=abc&state=a%20b%26c");
    }
}
