use askama::Template;
use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;

use crate::{
    bot::qr,
    error::{AppError, Result},
    state::AppState,
};

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    connected: bool,
    version: &'static str,
}

/// The pairing code as polled by the dashboard.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeResponse {
    pub qr_code: String,
    /// Unix seconds; 0 when no code was ever emitted.
    pub timestamp: i64,
}

/// Renders the dashboard.
pub async fn dashboard(State(state): State<AppState>) -> Result<Html<String>> {
    let page = DashboardTemplate {
        connected: state.bot.is_connected(),
        version: env!("CARGO_PKG_VERSION"),
    };
    Ok(Html(page.render()?))
}

/// Disconnects the bot from the chat network.
pub async fn disconnect(State(state): State<AppState>) -> Redirect {
    tracing::info!("🔌 Disconnect requested from dashboard");
    state.bot.disconnect().await;
    Redirect::to("/")
}

/// Returns the latest pairing code and when it was emitted.
pub async fn qr_code(State(state): State<AppState>) -> Result<Response> {
    let (qr_code, at) = state.bot.latest_qr_code();
    let body = sonic_rs::to_string(&QrCodeResponse {
        qr_code,
        timestamp: at.timestamp(),
    })
    .map_err(|e| AppError::Internal(format!("QR code serialization failed: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response())
}

/// Returns the latest pairing code as an SVG image.
pub async fn qr_code_svg(State(state): State<AppState>) -> Result<Response> {
    let (code, _) = state.bot.latest_qr_code();
    if code.is_empty() {
        return Err(AppError::NotFound);
    }

    let svg = qr::render_svg(&code).map_err(|e| AppError::Internal(format!("QR rendering failed: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        svg,
    )
        .into_response())
}
