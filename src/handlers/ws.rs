use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::StreamExt;

use crate::state::AppState;

/// Upgrades a dashboard connection to a status feed.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_viewer(state, socket))
}

/// Registers the viewer, then reads only to notice when it goes away.
async fn serve_viewer(state: AppState, socket: WebSocket) {
    let (sender, mut receiver) = socket.split();
    let id = state.hub.register(Box::new(sender), state.bot.as_ref()).await;

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Viewer {} read error: {}", id, e);
                break;
            }
        }
    }

    state.hub.unregister(id).await;
}
