use crate::config::TrackerConfig;
use crate::domain::ports::{ChannelEvent, PushChannel, PushStream};
use crate::error::Result;
use async_trait::async_trait;
use futures_util::{StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

/// Push channel over a plain WebSocket, one connection per tracking key.
#[derive(Debug, Clone)]
pub struct WebSocketPushChannel {
    base_url: String,
}

impl WebSocketPushChannel {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            base_url: config.ws_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn channel_url(&self, tracking_key: &str) -> String {
        format!("{}/payments/{}", self.base_url, tracking_key)
    }
}

/// Maps a frame to a channel event. Control frames carry nothing for us.
fn to_event(frame: std::result::Result<Message, WsError>) -> Option<ChannelEvent> {
    match frame {
        Ok(Message::Text(text)) => Some(ChannelEvent::Message(text)),
        Ok(Message::Binary(bytes)) => Some(ChannelEvent::Message(
            String::from_utf8_lossy(&bytes).into_owned(),
        )),
        Ok(_) => None,
        Err(e) => Some(ChannelEvent::Error(e.to_string())),
    }
}

#[async_trait]
impl PushChannel for WebSocketPushChannel {
    async fn subscribe(&self, tracking_key: &str) -> Result<PushStream> {
        let url = self.channel_url(tracking_key);
        let (ws, response) = connect_async(url.as_str()).await?;
        debug!(%url, status = %response.status(), "websocket connected");

        let stream = ws
            .take_while(|frame| future::ready(!matches!(frame, Ok(Message::Close(_)))))
            .filter_map(|frame| future::ready(to_event(frame)));
        Ok(Box::pin(stream))
    }
}
