//! `WsConnector`, the production [`Connector`] over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

use chainfeed_core::{Connector, FeedError, Transport};

/// Opens `ws://` / `wss://` connections.
///
/// Text frames pass through as-is, binary frames are read as (lossy) UTF-8,
/// control frames are handled by tungstenite. A receive error is yielded
/// once, after which the stream ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, endpoint: &str) -> Result<Transport, FeedError> {
        let (ws_stream, _) = connect_async(endpoint)
            .await
            .map_err(|e| FeedError::TransportOpen {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        let (write, read) = ws_stream.split();

        let sink = write
            .with(|text: String| async move { Ok::<_, tungstenite::Error>(Message::Text(text.into())) })
            .sink_map_err(|e| FeedError::Transport(e.to_string()));

        let stream = futures::stream::unfold((read, false), |(mut read, failed)| async move {
            if failed {
                return None;
            }
            loop {
                match read.next().await {
                    None => return None,
                    Some(Ok(Message::Text(text))) => {
                        return Some((Ok(text.to_string()), (read, false)));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        return Some((Ok(text), (read, false)));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "close frame received");
                        return None;
                    }
                    // ping / pong / raw frames
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        return Some((Err(FeedError::Transport(e.to_string())), (read, true)));
                    }
                }
            }
        });

        Ok(Transport::new(sink, stream))
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_failure_is_transport_open() {
        // Port 1 on loopback is never listening in test environments.
        let err = WsConnector::new().open("ws://127.0.0.1:1").await.unwrap_err();
        match err {
            FeedError::TransportOpen { endpoint, .. } => assert_eq!(endpoint, "ws://127.0.0.1:1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_url_is_transport_open() {
        let err = WsConnector::new().open("not a url").await.unwrap_err();
        assert!(matches!(err, FeedError::TransportOpen { .. }));
    }
}
