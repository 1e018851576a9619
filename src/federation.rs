// ABOUTME: Federated login bridge threading an external provider through the code state machine
// ABOUTME: Encodes/parses the pipe-delimited federation state and exchanges remote codes for identity
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

//! # Federated Login Bridge
//!
//! Federated login reuses the local authorization-code state machine: the
//! server mints an unbound local code first, round-trips it through the
//! external provider inside the `state` parameter, and binds it when the
//! callback's remote code exchanges successfully. The external provider
//! never sees local credentials; the client never sees remote tokens.

use crate::errors::{AppError, AppResult};
use crate::models::{FederatedProfile, Identity, UserType};
use crate::store::UserDirectory;
use serde::Deserialize;
use std::sync::Arc;

const WECHAT_AUTHORIZE_URL: &str = "https://open.weixin.qq.com/connect/qrconnect";
const WECHAT_TOKEN_URL: &str = "https://api.weixin.qq.com/sns/oauth2/access_token";
const WECHAT_USERINFO_URL: &str = "https://api.weixin.qq.com/sns/userinfo";

/// The round-tripped state carried through the external provider.
///
/// Wire format is `<authcode>|<original_state>`, split on the first `|`
/// only. Authorization codes are URL-safe base64 and can never contain the
/// separator, so the split is unambiguous. All parsing lives here; nothing
/// else in the crate touches the raw string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationState {
    /// The local (still unbound) authorization code
    pub auth_code: String,
    /// The client's original `state` parameter, possibly empty
    pub original_state: String,
}

impl FederationState {
    #[must_use]
    pub fn new(auth_code: impl Into<String>, original_state: impl Into<String>) -> Self {
        Self {
            auth_code: auth_code.into(),
            original_state: original_state.into(),
        }
    }

    /// Encode for the external provider's `state` parameter
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}|{}", self.auth_code, self.original_state)
    }

    /// Parse a callback `state` value
    ///
    /// # Errors
    /// Returns `MalformedFederationState` if the separator is missing or
    /// the code half is empty.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let (auth_code, original_state) = raw
            .split_once('|')
            .ok_or_else(AppError::malformed_federation_state)?;

        if auth_code.is_empty() {
            return Err(AppError::malformed_federation_state());
        }

        Ok(Self {
            auth_code: auth_code.to_owned(),
            original_state: original_state.to_owned(),
        })
    }
}

/// Result of exchanging a remote authorization code
#[derive(Debug, Clone)]
pub struct RemoteExchange {
    /// Access token issued by the external provider, used only to fetch
    /// the profile and never surfaced to clients
    pub remote_access_token: String,
    /// The provider's stable subject identifier
    pub remote_subject_id: String,
}

/// An external identity provider this server can bridge logins through
#[async_trait::async_trait]
pub trait FederatedProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Build the browser redirect URL, embedding the encoded federation
    /// state so the callback can recover the local code
    fn authorization_url(&self, state: &FederationState) -> String;

    /// Exchange the callback's remote code for a remote token and subject
    async fn exchange_code(&self, remote_code: &str) -> AppResult<RemoteExchange>;

    /// Fetch the remote profile for identity materialization
    async fn fetch_profile(
        &self,
        remote_access_token: &str,
        remote_subject_id: &str,
    ) -> AppResult<FederatedProfile>;
}

/// WeChat QR-login provider
pub struct WeChatProvider {
    app_id: String,
    app_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
}

/// WeChat token endpoint response. Errors arrive as HTTP 200 with an
/// `errcode` body, so every field is optional and checked explicitly.
#[derive(Debug, Deserialize)]
struct WeChatTokenResponse {
    access_token: Option<String>,
    openid: Option<String>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeChatUserinfoResponse {
    nickname: Option<String>,
    headimgurl: Option<String>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

impl WeChatProvider {
    #[must_use]
    pub fn new(
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            redirect_uri: redirect_uri.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl FederatedProvider for WeChatProvider {
    fn name(&self) -> &str {
        "wechat"
    }

    fn authorization_url(&self, state: &FederationState) -> String {
        format!(
            "{}?appid={}&redirect_uri={}&response_type=code&scope=snsapi_login&state={}#wechat_redirect",
            WECHAT_AUTHORIZE_URL,
            urlencoding::encode(&self.app_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&state.encode())
        )
    }

    async fn exchange_code(&self, remote_code: &str) -> AppResult<RemoteExchange> {
        let response = self
            .http
            .get(WECHAT_TOKEN_URL)
            .query(&[
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.as_str()),
                ("code", remote_code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::federated_exchange(format!("Token request failed: {e}")))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AppError::federated_exchange(format!("Token response unreadable: {e}")))?;

        if !status.is_success() {
            return Err(AppError::federated_exchange(format!(
                "Token endpoint returned {status}: {response_text}"
            )));
        }

        let token: WeChatTokenResponse = serde_json::from_str(&response_text)
            .map_err(|e| AppError::federated_exchange(format!("Token response parse error: {e}")))?;

        if let Some(errcode) = token.errcode {
            let errmsg = token.errmsg.unwrap_or_default();
            return Err(AppError::federated_exchange(format!(
                "Provider rejected code exchange: errcode={errcode} errmsg={errmsg}"
            )));
        }

        match (token.access_token, token.openid) {
            (Some(remote_access_token), Some(remote_subject_id)) => Ok(RemoteExchange {
                remote_access_token,
                remote_subject_id,
            }),
            _ => Err(AppError::federated_exchange(
                "Token response missing access_token or openid",
            )),
        }
    }

    async fn fetch_profile(
        &self,
        remote_access_token: &str,
        remote_subject_id: &str,
    ) -> AppResult<FederatedProfile> {
        let response = self
            .http
            .get(WECHAT_USERINFO_URL)
            .query(&[
                ("access_token", remote_access_token),
                ("openid", remote_subject_id),
                ("lang", "en"),
            ])
            .send()
            .await
            .map_err(|e| AppError::federated_exchange(format!("Profile request failed: {e}")))?;

        let response_text = response.text().await.map_err(|e| {
            AppError::federated_exchange(format!("Profile response unreadable: {e}"))
        })?;

        let profile: WeChatUserinfoResponse = serde_json::from_str(&response_text).map_err(|e| {
            AppError::federated_exchange(format!("Profile response parse error: {e}"))
        })?;

        if let Some(errcode) = profile.errcode {
            let errmsg = profile.errmsg.unwrap_or_default();
            return Err(AppError::federated_exchange(format!(
                "Provider rejected profile fetch: errcode={errcode} errmsg={errmsg}"
            )));
        }

        Ok(FederatedProfile {
            display_name: profile
                .nickname
                .unwrap_or_else(|| "WeChat User".to_owned()),
            avatar_url: profile.headimgurl,
        })
    }
}

/// Bridges the external provider into the local identity model
pub struct FederatedLoginBridge {
    provider: Arc<dyn FederatedProvider>,
    users: Arc<dyn UserDirectory>,
}

impl FederatedLoginBridge {
    #[must_use]
    pub fn new(provider: Arc<dyn FederatedProvider>, users: Arc<dyn UserDirectory>) -> Self {
        Self { provider, users }
    }

    /// Build the external-provider redirect URL for an unbound local code
    #[must_use]
    pub fn build_redirect_url(&self, auth_code: &str, state: Option<&str>) -> String {
        let federation_state = FederationState::new(auth_code, state.unwrap_or(""));
        self.provider.authorization_url(&federation_state)
    }

    /// Exchange the remote code and materialize or reuse the local identity.
    /// Idempotent per remote subject id; duplicate concurrent callbacks
    /// resolve to the same local subject.
    ///
    /// # Errors
    /// Returns `FederatedExchangeFailed` when the provider rejects the code
    /// or returns an unusable payload, or a store error from the directory.
    pub async fn resolve_identity(&self, remote_code: &str) -> AppResult<Identity> {
        let exchange = self.provider.exchange_code(remote_code).await?;

        // Profile fetch failure is not fatal to login; the identity can be
        // created with a default profile and enriched on a later visit.
        let profile = match self
            .provider
            .fetch_profile(&exchange.remote_access_token, &exchange.remote_subject_id)
            .await
        {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    "Profile fetch failed, using default profile: {e}"
                );
                FederatedProfile::default()
            }
        };

        let identity = self
            .users
            .resolve_or_create_federated(&exchange.remote_subject_id, &profile, UserType::Regular)
            .await?;

        tracing::info!(
            provider = self.provider.name(),
            subject = %identity.subject,
            "Federated login resolved to local identity"
        );

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_state_round_trip() {
        let state = FederationState::new("abc123", "client-state");
        let parsed = FederationState::parse(&state.encode()).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_state_empty_original_state() {
        let parsed = FederationState::parse("abc123|").unwrap();
        assert_eq!(parsed.auth_code, "abc123");
        assert_eq!(parsed.original_state, "");
    }

    #[test]
    fn test_state_splits_on_first_separator_only() {
        // A client state containing '|' survives because codes never do
        let parsed = FederationState::parse("abc123|s1|s2").unwrap();
        assert_eq!(parsed.auth_code, "abc123");
        assert_eq!(parsed.original_state, "s1|s2");
    }

    #[test]
    fn test_state_without_separator_is_rejected() {
        let err = FederationState::parse("noseparator").unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedFederationState);
    }

    #[test]
    fn test_state_with_empty_code_is_rejected() {
        let err = FederationState::parse("|onlystate").unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedFederationState);
    }

    #[test]
    fn test_wechat_authorization_url_embeds_state() {
        let provider = WeChatProvider::new("wx-app", "secret", "https://idp.test/wechat/callback");
        let url = provider.authorization_url(&FederationState::new("code-x", "s1"));

        assert!(url.starts_with("https://open.weixin.qq.com/connect/qrconnect?appid=wx-app"));
        assert!(url.contains("state=code-x%7Cs1"));
        assert!(url.contains("scope=snsapi_login"));
        assert!(url.ends_with("#wechat_redirect"));
    }
}
