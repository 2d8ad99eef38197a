//! Websocket connector.
//!
//! Opens `ws://` streams with `tokio-tungstenite`. Text frames carry one
//! envelope each; binary frames are decoded as UTF-8 (lossily, so a bad frame
//! surfaces as a malformed message instead of killing the stream). Control
//! frames never reach the session.

use futures::future::{self, BoxFuture};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::core::{Connector, TransportError, WireSink, WireStream};

/// Connects to relay nodes over websocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }

    /// URL for a relay endpoint given as `host:port` or as a full URL.
    pub fn url(endpoint: &str) -> String {
        if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            endpoint.to_owned()
        } else {
            format!("ws://{endpoint}")
        }
    }
}

impl Connector for WebSocketConnector {
    fn open<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> BoxFuture<'a, Result<(WireSink, WireStream), TransportError>> {
        Box::pin(async move {
            let url = Self::url(endpoint);
            let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    endpoint: endpoint.to_owned(),
                    reason: e.to_string(),
                })?;
            tracing::debug!(%url, "websocket opened");

            let (write, read) = ws.split();
            let sink: WireSink = Box::pin(
                write
                    .with(|text: String| future::ready(Ok::<_, tungstenite::Error>(Message::text(text))))
                    .sink_map_err(|e| TransportError::Send(e.to_string())),
            );
            let stream: WireStream = read
                .filter_map(|frame| future::ready(decode_frame(frame)))
                .boxed();
            Ok((sink, stream))
        })
    }
}

fn decode_frame(
    frame: Result<Message, tungstenite::Error>,
) -> Option<Result<String, TransportError>> {
    match frame {
        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
        Ok(Message::Binary(data)) => Some(Ok(String::from_utf8_lossy(&data).into_owned())),
        Ok(Message::Close(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(e) => Some(Err(TransportError::Stream(e.to_string()))),
    }
}
