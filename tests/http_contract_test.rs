// ABOUTME: HTTP contract tests exercising the full router without a network listener
// ABOUTME: Verifies status codes, redirect targets, and body shapes for every endpoint
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use lantern_idp::config::{Environment, ServerConfig, WeChatConfig};
use lantern_idp::crypto;
use lantern_idp::errors::{AppError, AppResult};
use lantern_idp::federation::{FederatedProvider, FederationState, RemoteExchange};
use lantern_idp::models::{FederatedProfile, Identity, RegisteredClient, UserType};
use lantern_idp::server::{build_router, ServerResources};
use lantern_idp::store::{
    AuthCodeStore, ClientRegistry, MemoryAuthCodeStore, MemoryClientRegistry, MemoryUserDirectory,
    UserDirectory,
};
use std::sync::Arc;
use tower::ServiceExt;

const REMOTE_GOOD: &str = "remote-good";

struct FakeProvider;

#[async_trait::async_trait]
impl FederatedProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn authorization_url(&self, state: &FederationState) -> String {
        format!(
            "https://provider.test/auth?state={}",
            urlencoding::encode(&state.encode())
        )
    }

    async fn exchange_code(&self, remote_code: &str) -> AppResult<RemoteExchange> {
        if remote_code == REMOTE_GOOD {
            Ok(RemoteExchange {
                remote_access_token: "remote-token".into(),
                remote_subject_id: "wechat-openid-1".into(),
            })
        } else {
            Err(AppError::federated_exchange("provider rejected the code"))
        }
    }

    async fn fetch_profile(
        &self,
        _remote_access_token: &str,
        _remote_subject_id: &str,
    ) -> AppResult<FederatedProfile> {
        Ok(FederatedProfile {
            display_name: "Wei".into(),
            avatar_url: None,
        })
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        issuer_url: "https://idp.test".into(),
        signing_key: b"http-contract-test-signing-key-32".to_vec(),
        auth_code_ttl_secs: 600,
        token_ttl_secs: 3600,
        environment: Environment::Testing,
        wechat: WeChatConfig {
            app_id: "wx-test".into(),
            app_secret: "wx-secret".into(),
            redirect_uri: "https://idp.test/wechat/callback".into(),
        },
        clients: vec![RegisteredClient {
            client_id: "c1".into(),
            client_secret: "secret".into(),
            redirect_uri: "https://cb".into(),
            name: "Demo App".into(),
        }],
    }
}

fn app() -> Router {
    let config = test_config();
    let users = Arc::new(MemoryUserDirectory::new());
    users.insert(Identity {
        subject: "sub-1".into(),
        email: Some("a@b.com".into()),
        phone: None,
        display_name: "Ada".into(),
        avatar_url: None,
        user_type: UserType::Regular,
        credential_hash: Some(crypto::hash_password("pw").unwrap()),
        is_active: true,
        federated_id: None,
        created_at: Utc::now(),
        last_login_at: None,
    });

    let clients: Arc<dyn ClientRegistry> =
        Arc::new(MemoryClientRegistry::new(config.clients.clone()));
    let codes: Arc<dyn AuthCodeStore> = Arc::new(MemoryAuthCodeStore::new());

    let resources = Arc::new(ServerResources::with_stores(
        config,
        Arc::new(FakeProvider),
        clients,
        users as Arc<dyn UserDirectory>,
        codes,
    ));
    build_router(resources)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let body = serde_urlencoded::to_string(fields).unwrap();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned()
}

/// Pull the embedded code out of the login form HTML
fn extract_code(html: &str) -> String {
    let marker = r#"name="auth_code" value=""#;
    let start = html.find(marker).unwrap() + marker.len();
    let end = html[start..].find('"').unwrap();
    html[start..start + end].to_owned()
}

const AUTHORIZE_URI: &str =
    "/authorize?response_type=code&client_id=c1&redirect_uri=https%3A%2F%2Fcb&scope=openid&state=s1";

#[tokio::test]
async fn test_discovery_document() {
    let response = app()
        .oneshot(get("/.well-known/openid_configuration"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    assert_eq!(doc["issuer"], "https://idp.test");
    assert_eq!(doc["authorization_endpoint"], "https://idp.test/authorize");
    assert_eq!(doc["token_endpoint"], "https://idp.test/token");
    assert_eq!(doc["userinfo_endpoint"], "https://idp.test/userinfo");
    assert_eq!(doc["jwks_uri"], "https://idp.test/.well-known/jwks.json");
    assert_eq!(doc["response_types_supported"][0], "code");
    assert!(doc["scopes_supported"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("openid")));
}

#[tokio::test]
async fn test_jwks_document() {
    let response = app().oneshot(get("/.well-known/jwks.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    let key = &doc["keys"][0];
    assert_eq!(key["kty"], "oct");
    assert_eq!(key["use"], "sig");
    assert_eq!(key["alg"], "HS256");
    assert!(!key["k"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_endpoints() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");

    let response = app().oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_authorize_renders_login_form() {
    let response = app().oneshot(get(AUTHORIZE_URI)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(html.contains("Demo App"));
    assert!(!extract_code(&html).is_empty());
}

#[tokio::test]
async fn test_authorize_unknown_client_is_400_with_detail() {
    let uri = "/authorize?response_type=code&client_id=nope&redirect_uri=https%3A%2F%2Fcb";
    let response = app().oneshot(get(uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_authorize_missing_parameters_is_400() {
    let response = app().oneshot(get("/authorize?client_id=c1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_authorize_federated_redirects_to_provider() {
    let response = app()
        .oneshot(get(&format!("{AUTHORIZE_URI}&login_type=federated")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).starts_with("https://provider.test/auth?state="));
}

#[tokio::test]
async fn test_full_direct_login_flow() {
    let app = app();

    // Authorize: extract the unbound code from the form
    let response = app.clone().oneshot(get(AUTHORIZE_URI)).await.unwrap();
    let code = extract_code(&body_string(response).await);

    // Login: bind the code
    let response = app
        .clone()
        .oneshot(post_form(
            "/login",
            &[
                ("auth_code", code.as_str()),
                ("redirect_uri", "https://cb"),
                ("state", "s1"),
                ("login_type", "email"),
                ("email", "a@b.com"),
                ("password", "pw"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        format!("https://cb?code={code}&state=s1")
    );

    // Token: redeem the bound code
    let response = app
        .clone()
        .oneshot(post_form(
            "/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", "https://cb"),
                ("client_id", "c1"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = body_json(response).await;
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 3600);
    let access_token = tokens["access_token"].as_str().unwrap().to_owned();
    assert!(!tokens["id_token"].as_str().unwrap().is_empty());

    // Userinfo with the fresh access token
    let request = Request::builder()
        .uri("/userinfo")
        .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let userinfo = body_json(response).await;
    assert_eq!(userinfo["sub"], "sub-1");
    assert_eq!(userinfo["email"], "a@b.com");
    assert_eq!(userinfo["name"], "Ada");

    // Replay: the code is spent
    let response = app
        .oneshot(post_form(
            "/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", "https://cb"),
                ("client_id", "c1"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_wrong_password_is_401() {
    let app = app();
    let response = app.clone().oneshot(get(AUTHORIZE_URI)).await.unwrap();
    let code = extract_code(&body_string(response).await);

    let response = app
        .oneshot(post_form(
            "/login",
            &[
                ("auth_code", code.as_str()),
                ("redirect_uri", "https://cb"),
                ("login_type", "email"),
                ("email", "a@b.com"),
                ("password", "wrong"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["detail"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_missing_fields_is_422() {
    let response = app()
        .oneshot(post_form("/login", &[("auth_code", "x")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_token_unsupported_grant_type_is_400() {
    let response = app()
        .oneshot(post_form(
            "/token",
            &[
                ("grant_type", "client_credentials"),
                ("code", "x"),
                ("redirect_uri", "https://cb"),
                ("client_id", "c1"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_userinfo_without_token_is_401() {
    let response = app().oneshot(get("/userinfo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_full_federated_flow() {
    let app = app();

    let response = app
        .clone()
        .oneshot(get(&format!("{AUTHORIZE_URI}&login_type=federated")))
        .await
        .unwrap();
    let provider_url = location(&response);
    let encoded = provider_url.split("state=").nth(1).unwrap();
    let raw_state = urlencoding::decode(encoded).unwrap().into_owned();
    let state = FederationState::parse(&raw_state).unwrap();

    let callback_uri = format!(
        "/wechat/callback?code={REMOTE_GOOD}&state={}",
        urlencoding::encode(&raw_state)
    );
    let response = app.clone().oneshot(get(&callback_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        format!("https://cb?code={}&state=s1", state.auth_code)
    );

    let response = app
        .oneshot(post_form(
            "/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", state.auth_code.as_str()),
                ("redirect_uri", "https://cb"),
                ("client_id", "c1"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_authorize_over_limit_is_429_with_retry_after() {
    let app = app();

    // Default authorize limit is 60 requests per window per IP
    for _ in 0..60 {
        let response = app.clone().oneshot(get(AUTHORIZE_URI)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get(AUTHORIZE_URI)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .expect("429 must carry a Retry-After header")
        .to_str()
        .unwrap()
        .parse::<u64>()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("Rate limit"));
}

#[tokio::test]
async fn test_callback_with_malformed_state_is_400() {
    let response = app()
        .oneshot(get("/wechat/callback?code=remote-good&state=noseparator"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("federation state"));
}

#[tokio::test]
async fn test_callback_missing_parameters_is_400() {
    let response = app().oneshot(get("/wechat/callback")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_failed_exchange_is_400() {
    let app = app();

    let response = app
        .clone()
        .oneshot(get(&format!("{AUTHORIZE_URI}&login_type=federated")))
        .await
        .unwrap();
    let provider_url = location(&response);
    let encoded = provider_url.split("state=").nth(1).unwrap();
    let raw_state = urlencoding::decode(encoded).unwrap().into_owned();

    let callback_uri = format!(
        "/wechat/callback?code=remote-bad&state={}",
        urlencoding::encode(&raw_state)
    );
    let response = app.oneshot(get(&callback_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
