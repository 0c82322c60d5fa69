use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tower_cookies::Cookies;

use crate::state::AppState;

/// Name of the dashboard session cookie.
pub const SESSION_COOKIE: &str = "zapbot-session";

/// Extracts the session token from the request cookies.
pub fn extract_session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// A middleware that requires a valid session to be present.
///
/// Every failure ends in the same redirect to the login page.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking authentication...");

    let Some(token) = extract_session_token(&cookies) else {
        tracing::debug!("No session cookie found");
        return to_login();
    };

    let session = match state.store.find_session_by_token(&token).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            tracing::warn!("❌ Unknown session token");
            return to_login();
        }
        Err(e) => {
            tracing::error!("❌ Session lookup failed: {}", e);
            return to_login();
        }
    };

    if !session.is_valid_at(Utc::now()) {
        tracing::warn!("❌ Session expired for user: {}", session.user_id);

        if let Err(e) = state.store.delete_session_by_token(&token).await {
            tracing::error!("❌ Failed to delete expired session: {}", e);
        }
        return to_login();
    }

    tracing::debug!("✅ User authenticated: {}", session.user_id);

    next.run(request).await
}

fn to_login() -> Response {
    Redirect::to("/login").into_response()
}
