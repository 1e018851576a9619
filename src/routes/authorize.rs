// ABOUTME: Authorization endpoint route handlers for GET /authorize and POST /login
// ABOUTME: Renders the credential form for direct login and redirects for federated login
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

use crate::errors::AppError;
use crate::models::{AuthorizationStart, AuthorizeParams, LoginForm};
use crate::routes::client_ip;
use crate::server::ServerResources;
use axum::{
    extract::{ConnectInfo, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;

/// Authorization flow routes
pub struct AuthorizeRoutes;

impl AuthorizeRoutes {
    /// Create authorize and login routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/authorize", get(Self::handle_authorize))
            .route("/login", post(Self::handle_login))
            .with_state(resources)
    }

    /// GET /authorize - start the authorization flow
    ///
    /// Responds 200 with the credential form for direct login, or 307 to
    /// the external provider for `login_type=federated`.
    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        Query(params): Query<AuthorizeParams>,
    ) -> Result<Response, AppError> {
        let ip = client_ip(connect_info.as_ref());
        let status = resources.rate_limiter.check("authorize", ip);
        if status.is_limited {
            return Err(AppError::rate_limited(status.retry_after_seconds));
        }

        match resources.engine.begin_authorization(&params).await? {
            AuthorizationStart::CredentialForm {
                code,
                client_name,
                scope,
            } => Ok(Html(render_login_form(
                &code,
                &params.redirect_uri,
                params.state.as_deref(),
                &client_name,
                &scope,
            ))
            .into_response()),
            AuthorizationStart::FederatedRedirect { url } => {
                Ok(Redirect::temporary(&url).into_response())
            }
        }
    }

    /// POST /login - verify credentials and bind the pending code
    ///
    /// Responds 307 back to the client's redirect URI with `code` and
    /// `state` on success.
    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        Form(form): Form<LoginForm>,
    ) -> Result<Response, AppError> {
        let ip = client_ip(connect_info.as_ref());
        let status = resources.rate_limiter.check("login", ip);
        if status.is_limited {
            return Err(AppError::rate_limited(status.retry_after_seconds));
        }

        let redirect_url = resources.engine.complete_direct_login(&form).await?;
        Ok(Redirect::temporary(&redirect_url).into_response())
    }
}

/// Minimal HTML escaping for values interpolated into the form
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the credential form carrying the unbound code as a hidden field
fn render_login_form(
    code: &str,
    redirect_uri: &str,
    state: Option<&str>,
    client_name: &str,
    scope: &[String],
) -> String {
    let state_input = state.map_or_else(String::new, |s| {
        format!(
            r#"<input type="hidden" name="state" value="{}">"#,
            escape_html(s)
        )
    });

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign in</title></head>
<body>
<h1>Sign in to {client}</h1>
<p>Requested access: {scope}</p>
<form method="post" action="/login">
<input type="hidden" name="auth_code" value="{code}">
<input type="hidden" name="redirect_uri" value="{redirect}">
{state_input}
<label>Login with:
<select name="login_type">
<option value="email">Email</option>
<option value="phone">Phone</option>
</select></label>
<input type="text" name="email" placeholder="Email">
<input type="text" name="phone" placeholder="Phone">
<input type="password" name="password" placeholder="Password" required>
<button type="submit">Sign in</button>
</form>
</body>
</html>"#,
        client = escape_html(client_name),
        scope = escape_html(&scope.join(" ")),
        code = escape_html(code),
        redirect = escape_html(redirect_uri),
    )
}
