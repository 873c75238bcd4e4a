//! WebSocket transport for the PushChat sync runtime
//!
//! Carries the wire protocol's JSON frames (`{"event": ..., "data": ...}`)
//! over a single WebSocket connection. The auth token travels as a query
//! parameter on the connect URL, never inside a frame. The sync task is the
//! only caller; this type never spawns anything of its own.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};
use url::Url;

use pushchat_core::{
    wire::Frame, AuthToken, OutboundEvent, PushChatError, PushTransport, Result,
    TransportError, TransportSignal,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ----------------------------------------------------------------------------
// WebSocket Transport
// ----------------------------------------------------------------------------

/// [`PushTransport`] over a single WebSocket connection
pub struct WsTransport {
    endpoint: Url,
    socket: Option<Socket>,
}

impl WsTransport {
    /// Create a transport for the given `ws://` or `wss://` endpoint
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| PushChatError::config_error(format!("invalid endpoint: {e}")))?;
        match endpoint.scheme() {
            "ws" | "wss" => Ok(Self {
                endpoint,
                socket: None,
            }),
            other => Err(PushChatError::config_error(format!(
                "endpoint scheme must be ws or wss, got {other}"
            ))),
        }
    }

    /// Connect URL with the credential attached as a query parameter
    fn authed_url(&self, token: &AuthToken) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("token", token.as_str());
        url
    }

    /// Map one WebSocket message to a transport signal, if it carries one
    fn map_message(message: WsMessage) -> Option<TransportSignal> {
        match message {
            WsMessage::Text(text) => match serde_json::from_str::<Frame>(&text) {
                Ok(frame) => Some(TransportSignal::Event {
                    name: frame.event,
                    payload: frame.data,
                }),
                Err(e) => {
                    // Envelope didn't even parse; named-event schema errors
                    // are the sync task's job
                    warn!(error = %e, "dropping non-frame text message");
                    None
                }
            },
            WsMessage::Close(frame) => Some(TransportSignal::Closed {
                reason: frame
                    .map(|f| f.reason.to_string())
                    .unwrap_or_else(|| "server closed the connection".to_string()),
            }),
            // Pings are answered by tungstenite during reads; binary frames
            // are not part of this protocol
            WsMessage::Ping(_) | WsMessage::Pong(_) => None,
            other => {
                debug!(?other, "ignoring unexpected websocket message");
                None
            }
        }
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn open(&mut self, token: &AuthToken) -> Result<()> {
        // One live connection at a time
        if let Some(mut old) = self.socket.take() {
            let _ = old.close(None).await;
        }

        let url = self.authed_url(token);
        let (socket, response) = connect_async(url.as_str()).await.map_err(|e| {
            PushChatError::connect_failed(e.to_string())
        })?;
        debug!(status = %response.status(), "websocket connected");
        self.socket = Some(socket);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).await {
                // A peer that already went away is not a close failure
                if !matches!(e, tungstenite::Error::ConnectionClosed) {
                    debug!(error = %e, "websocket close reported an error");
                }
            }
        }
        Ok(())
    }

    async fn emit(&mut self, event: OutboundEvent) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or(TransportError::NotConnected)?;

        let text = serde_json::to_string(&event.to_frame()).map_err(|e| {
            PushChatError::channel_error(format!("frame serialization failed: {e}"))
        })?;
        socket.send(WsMessage::Text(text)).await.map_err(|e| {
            TransportError::EmitFailed {
                event: event.name().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn next_signal(&mut self) -> Option<TransportSignal> {
        loop {
            let socket = match self.socket.as_mut() {
                Some(socket) => socket,
                // Nothing to read until the runtime opens the connection
                None => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
            };

            match socket.next().await {
                Some(Ok(message)) => {
                    if let Some(signal) = Self::map_message(message) {
                        if matches!(signal, TransportSignal::Closed { .. }) {
                            self.socket = None;
                        }
                        return Some(signal);
                    }
                    // Ping/pong or noise; keep reading
                }
                Some(Err(e)) => {
                    self.socket = None;
                    return Some(TransportSignal::Closed {
                        reason: e.to_string(),
                    });
                }
                None => {
                    self.socket = None;
                    return Some(TransportSignal::Closed {
                        reason: "websocket stream ended".to_string(),
                    });
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pushchat_core::ChatId;

    #[test]
    fn test_rejects_non_websocket_schemes() {
        assert!(WsTransport::new("https://chat.example.com").is_err());
        assert!(WsTransport::new("not a url").is_err());
        assert!(WsTransport::new("wss://chat.example.com/push").is_ok());
    }

    #[test]
    fn test_token_travels_as_query_parameter() {
        let transport = WsTransport::new("wss://chat.example.com/push").unwrap();
        let url = transport.authed_url(&AuthToken::new("jwt-abc"));
        assert_eq!(url.as_str(), "wss://chat.example.com/push?token=jwt-abc");
    }

    #[test]
    fn test_map_text_frame_to_event_signal() {
        let text = r#"{"event":"user_typing","data":{"chatId":"c1","userId":"u2"}}"#;
        match WsTransport::map_message(WsMessage::Text(text.to_string())) {
            Some(TransportSignal::Event { name, payload }) => {
                assert_eq!(name, "user_typing");
                assert_eq!(payload["chatId"], "c1");
            }
            other => panic!("unexpected signal: {:?}", other),
        }
    }

    #[test]
    fn test_map_non_frame_text_is_dropped() {
        assert!(WsTransport::map_message(WsMessage::Text("hello".to_string())).is_none());
        assert!(WsTransport::map_message(WsMessage::Ping(vec![])).is_none());
    }

    #[test]
    fn test_map_close_frame() {
        match WsTransport::map_message(WsMessage::Close(None)) {
            Some(TransportSignal::Closed { reason }) => {
                assert_eq!(reason, "server closed the connection");
            }
            other => panic!("unexpected signal: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emit_without_connection_fails() {
        let mut transport = WsTransport::new("wss://chat.example.com/push").unwrap();
        let result = transport
            .emit(OutboundEvent::Typing {
                chat_id: ChatId::new("c1"),
            })
            .await;
        assert!(result.is_err());
    }
}
