//! The `Connector` trait: the seam between the feed client and a socket.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};

use crate::error::FeedError;

/// Inbound text frames. An `Err` item is a transport error event and does
/// not by itself end the connection; the end of the stream is the close.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, FeedError>> + Send>>;

/// Outbound text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = FeedError> + Send>>;

/// One open bidirectional connection.
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Transport {
    pub fn new(
        sink: impl Sink<String, Error = FeedError> + Send + 'static,
        stream: impl Stream<Item = Result<String, FeedError>> + Send + 'static,
    ) -> Self {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Opens transports to an endpoint.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn Connector>`.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Establish a connection. Failure is a `TransportOpen` error.
    async fn open(&self, endpoint: &str) -> Result<Transport, FeedError>;

    /// Short backend name for logs.
    fn name(&self) -> &str {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::{SinkExt, StreamExt};

    struct Loopback;

    #[async_trait]
    impl Connector for Loopback {
        async fn open(&self, _endpoint: &str) -> Result<Transport, FeedError> {
            let (tx, rx) = mpsc::unbounded::<String>();
            let sink = tx.sink_map_err(|e| FeedError::Transport(e.to_string()));
            Ok(Transport::new(sink, rx.map(Ok)))
        }

        fn name(&self) -> &str {
            "loopback"
        }
    }

    #[tokio::test]
    async fn loopback_echoes_frames() {
        let connector: Box<dyn Connector> = Box::new(Loopback);
        assert_eq!(connector.name(), "loopback");

        let mut transport = connector.open("mem://").await.unwrap();
        transport.sink.send("hello".to_string()).await.unwrap();
        let frame = transport.stream.next().await.unwrap().unwrap();
        assert_eq!(frame, "hello");
    }
}
