use askama::Template;
use axum::{
    extract::{Form, Query, State},
    http::HeaderMap,
    response::{Html, Redirect},
};
use serde::Deserialize;
use tower_cookies::cookie::time::OffsetDateTime;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use zeroize::Zeroize;

use crate::{
    error::Result,
    middleware_layer::auth::{extract_session_token, SESSION_COOKIE},
    services::auth as auth_service,
    state::AppState,
};

/// Query flag set when a login attempt failed.
pub const LOGIN_ERROR_FLAG: &str = "invalid_credentials";

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: bool,
}

#[derive(Deserialize, Debug, Default)]
pub struct LoginQuery {
    #[serde(default)]
    pub error: Option<String>,
}

/// The login form fields.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Whether the request reached us over TLS terminated by a proxy.
fn is_secure_request(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// Builds the session cookie, expiring with the session itself.
fn session_cookie(token: String, expires_at: Option<chrono::DateTime<chrono::Utc>>, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");

    if let Some(expiry) = expires_at.and_then(|at| OffsetDateTime::from_unix_timestamp(at.timestamp()).ok()) {
        cookie.set_expires(expiry);
    }

    cookie
}

/// Renders the login form.
pub async fn login_page(Query(query): Query<LoginQuery>) -> Result<Html<String>> {
    let page = LoginTemplate {
        error: query.error.is_some(),
    };
    Ok(Html(page.render()?))
}

/// Handles user login.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
    Form(form): Form<LoginRequest>,
) -> Result<Redirect> {
    tracing::info!("🔐 Login attempt for: {}", form.username);

    let mut password = form.password;
    let user = auth_service::authenticate_user(state.store.as_ref(), &form.username, &password).await;
    password.zeroize();

    let Some(user) = user? else {
        return Ok(Redirect::to(&format!("/login?error={}", LOGIN_ERROR_FLAG)));
    };

    let session = auth_service::start_session(
        state.store.as_ref(),
        &user,
        state.config.session_duration_hours,
    )
    .await?;

    cookies.add(session_cookie(
        session.token,
        session.expires_at,
        is_secure_request(&headers),
    ));

    tracing::info!("✅ User logged in: {}", user.username);
    Ok(Redirect::to("/"))
}

/// Handles user logout. Succeeds whether or not a valid session was presented.
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Redirect {
    let token = extract_session_token(&cookies);
    auth_service::end_session(state.store.as_ref(), token.as_deref()).await;

    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookies.remove(cookie);

    tracing::info!("👋 Logged out");
    Redirect::to("/login")
}
