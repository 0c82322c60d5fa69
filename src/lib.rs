use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod hub;
pub mod state;
pub mod store;

pub mod crypto {
    pub mod token;
}

pub mod models {
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod session;
    pub mod user;
}

pub mod services {
    pub mod auth;
    pub mod maintenance;
}

pub mod handlers {
    pub mod auth;
    pub mod dashboard;
    pub mod ws;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod auth;
}

use state::AppState;

/// Builds the HTTP router: public login and pairing-code routes, and the
/// session-gated dashboard.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route(
            "/login",
            get(handlers::auth::login_page).post(handlers::auth::login),
        )
        .route(
            "/logout",
            get(handlers::auth::logout).post(handlers::auth::logout),
        )
        .route("/api/qrcode", get(handlers::dashboard::qr_code))
        .route("/api/qrcode.svg", get(handlers::dashboard::qr_code_svg))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/", get(handlers::dashboard::dashboard))
        .route("/disconnect", post(handlers::dashboard::disconnect))
        .route("/ws", get(handlers::ws::ws_upgrade))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
}
