use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;

use super::{ViewerError, ViewerSink};

#[async_trait]
impl ViewerSink for SplitSink<WebSocket, Message> {
    async fn send_text(&mut self, text: String) -> Result<(), ViewerError> {
        SinkExt::send(self, Message::Text(text.into()))
            .await
            .map_err(|e| ViewerError::Closed(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = SinkExt::close(self).await;
    }
}
