//! Feed client: connection state machine, reconnection policy and outbound
//! sender.
//!
//! Each client owns one background task per connection campaign. The task
//! holds the transport and the reconnection timer; every state transition
//! happens under the client's single mutex, tagged with the campaign's
//! generation so that a task outliving `disconnect()` (or the client) can
//! never act on the new state.
//!
//! Subscribers are only ever invoked from the campaign task, so dispatches
//! within one client never overlap. A campaign started after `disconnect()`
//! waits for the previous one to finish closing before it opens.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use chainfeed_core::{
    ConnectionState, Connector, Envelope, ErrorEvent, ErrorKind, EventName, FeedConfig, FeedError,
    FeedEvent, RetryPolicy, Transport,
};

use crate::connector::WsConnector;
use crate::router;
use crate::subscriptions::{Handler, SubscriberRegistry};

/// Reconnecting publish/subscribe client for one endpoint.
///
/// All operations return immediately; opening the transport and the
/// reconnection timer run on a spawned Tokio task, so [`connect`] must be
/// called from within a Tokio runtime.
///
/// Handlers run on that task, one at a time and in arrival order, and must
/// not block.
///
/// [`connect`]: FeedClient::connect
/// [`disconnect`]: FeedClient::disconnect
pub struct FeedClient {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: String,
    policy: RetryPolicy,
    connect_timeout: Option<Duration>,
    connector: Arc<dyn Connector>,
    machine: Mutex<Machine>,
    subscribers: SubscriberRegistry,
}

struct Machine {
    state: ConnectionState,
    /// Consecutive failed attempts since the last successful open.
    retry_count: u32,
    /// Bumped on every `connect()` / `disconnect()`; a campaign only acts
    /// while its generation is current.
    generation: u64,
    /// Running campaign: owns the transport and the retry timer.
    campaign: Option<JoinHandle<()>>,
    /// Write side of the open transport. `Some` only while `Connected`.
    outbound: Option<mpsc::UnboundedSender<String>>,
    /// Campaign closing a connection the caller dropped; the next campaign
    /// waits for it.
    draining: Option<JoinHandle<()>>,
}

/// What the campaign does after a failed attempt or a close.
enum Next {
    Retry { delay: Duration, attempt: u32 },
    GiveUp,
    Stale,
}

/// Why the frame pump stopped.
enum PumpExit {
    /// Transport closed or failed; apply the reconnection rule.
    Closed,
    /// Live connection closed by `disconnect()` or drop.
    Cancelled,
}

impl FeedClient {
    /// Build a client for a WebSocket endpoint.
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        Self::with_connector(config, Arc::new(WsConnector::new()))
    }

    /// Build a client over a custom transport.
    pub fn with_connector(
        config: FeedConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, FeedError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                policy: config.retry_policy(),
                connect_timeout: config.connect_timeout(),
                endpoint: config.endpoint,
                connector,
                machine: Mutex::new(Machine {
                    state: ConnectionState::Disconnected,
                    retry_count: 0,
                    generation: 0,
                    campaign: None,
                    outbound: None,
                    draining: None,
                }),
                subscribers: SubscriberRegistry::new(),
            }),
        })
    }

    /// Start a connection campaign.
    ///
    /// No-op while a campaign is already running (`Connecting`, `Connected`,
    /// `Reconnecting`). From `Failed` the retry counter starts over.
    ///
    /// Outside a Tokio runtime nothing is started; the failure is logged and
    /// reported as an `error` event.
    pub fn connect(&self) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                let err = FeedError::Runtime(e.to_string());
                error!(
                    endpoint = %self.inner.endpoint,
                    kind = %err.kind(),
                    error = %err,
                    "connect needs a Tokio runtime"
                );
                self.inner.emit(FeedEvent::Error(ErrorEvent::from(&err)));
                return;
            }
        };
        let mut m = self.inner.lock();
        match m.state {
            ConnectionState::Connecting
            | ConnectionState::Connected
            | ConnectionState::Reconnecting => {
                debug!(endpoint = %self.inner.endpoint, state = %m.state, "connect ignored");
                return;
            }
            ConnectionState::Failed => m.retry_count = 0,
            ConnectionState::Disconnected => {}
        }
        m.generation += 1;
        m.state = ConnectionState::Connecting;
        let generation = m.generation;
        info!(
            endpoint = %self.inner.endpoint,
            connector = self.inner.connector.name(),
            "connecting"
        );
        let inner = Arc::clone(&self.inner);
        let previous = m.draining.take();
        m.campaign = Some(runtime.spawn(run_campaign(inner, generation, previous)));
    }

    /// Close the transport and stop reconnecting. Idempotent.
    ///
    /// The state is `Disconnected` on return. When a live connection was
    /// closed, `disconnected` follows from the campaign task once frames
    /// already received have been delivered.
    pub fn disconnect(&self) {
        let mut m = self.inner.lock();
        if m.state == ConnectionState::Disconnected {
            return;
        }
        m.teardown();
        info!(endpoint = %self.inner.endpoint, "disconnected by caller");
    }

    /// Send one `{type, payload}` envelope.
    ///
    /// Only succeeds while `Connected`; otherwise the message is dropped
    /// and [`FeedError::NotConnected`] is returned. Nothing is queued.
    pub fn send(&self, kind: &str, payload: Option<Value>) -> Result<(), FeedError> {
        let text = Envelope::new(kind, payload).encode()?;
        let m = self.inner.lock();
        if m.state == ConnectionState::Connected {
            if let Some(tx) = &m.outbound {
                if tx.send(text).is_ok() {
                    return Ok(());
                }
            }
        }
        warn!(wire_type = kind, state = %m.state, "send dropped; feed not connected");
        Err(FeedError::NotConnected {
            state: m.state.to_string(),
        })
    }

    /// Register `handler` for `name`.
    pub fn subscribe(&self, name: EventName, handler: Handler) {
        self.inner.subscribers.subscribe(name, handler);
    }

    /// Remove this exact `handler` from `name`. Returns `true` if it was
    /// registered.
    pub fn unsubscribe(&self, name: EventName, handler: &Handler) -> bool {
        self.inner.subscribers.unsubscribe(name, handler)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Consecutive failed attempts since the last successful connection.
    pub fn retry_count(&self) -> u32 {
        self.inner.lock().retry_count
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn subscriber_count(&self, name: EventName) -> usize {
        self.inner.subscribers.len(name)
    }
}

/// Same as [`FeedClient::disconnect`], including the trailing `disconnected`
/// for a live connection.
impl Drop for FeedClient {
    fn drop(&mut self) {
        self.inner.lock().teardown();
    }
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = self.inner.lock();
        f.debug_struct("FeedClient")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &m.state)
            .field("retry_count", &m.retry_count)
            .finish_non_exhaustive()
    }
}

impl Machine {
    /// Invalidate the running campaign and clear the transport handle.
    fn teardown(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Disconnected;
        let live = self.outbound.take().is_some();
        if let Some(task) = self.campaign.take() {
            // A live campaign sees its outbound channel close, sends a close
            // frame and emits `disconnected`; anything else is stopped where
            // it stands.
            if live {
                self.draining = Some(task);
            } else {
                task.abort();
            }
        }
    }

    /// Apply the reconnection rule after a failed attempt or a close.
    fn record_failure(&mut self, generation: u64, policy: &RetryPolicy) -> Next {
        if self.generation != generation {
            return Next::Stale;
        }
        self.outbound = None;
        self.retry_count += 1;
        match policy.next_delay(self.retry_count) {
            Some(delay) => {
                self.state = ConnectionState::Reconnecting;
                Next::Retry {
                    delay,
                    attempt: self.retry_count,
                }
            }
            None => {
                self.state = ConnectionState::Failed;
                self.campaign = None;
                Next::GiveUp
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Machine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn emit(&self, event: FeedEvent) {
        debug!(event = %event.name(), "emit");
        self.subscribers.dispatch(&event);
    }

    async fn open_transport(&self) -> Result<Transport, FeedError> {
        let open = self.connector.open(&self.endpoint);
        match self.connect_timeout {
            None => open.await,
            Some(limit) => tokio::time::timeout(limit, open).await.map_err(|_| {
                FeedError::TransportOpen {
                    endpoint: self.endpoint.clone(),
                    reason: format!("timed out after {}ms", limit.as_millis()),
                }
            })?,
        }
    }

    /// Move frames in both directions until the transport closes or the
    /// campaign is cancelled.
    async fn pump(
        &self,
        transport: Transport,
        mut outbound: mpsc::UnboundedReceiver<String>,
        generation: u64,
    ) -> PumpExit {
        let Transport {
            mut sink,
            mut stream,
        } = transport;

        loop {
            tokio::select! {
                frame = outbound.recv() => match frame {
                    Some(text) => {
                        if let Err(e) = sink.send(text).await {
                            if !self.is_current(generation) {
                                return PumpExit::Cancelled;
                            }
                            warn!(endpoint = %self.endpoint, error = %e, "write failed");
                            self.emit(FeedEvent::Error(ErrorEvent::from(&e)));
                            return PumpExit::Closed;
                        }
                    }
                    None => {
                        if let Err(e) = sink.close().await {
                            debug!(error = %e, "close after disconnect failed");
                        }
                        return PumpExit::Cancelled;
                    }
                },
                inbound = stream.next() => match inbound {
                    Some(Ok(text)) => {
                        if !self.is_current(generation) {
                            return PumpExit::Cancelled;
                        }
                        router::dispatch_frame(&text, &self.subscribers);
                    }
                    Some(Err(e)) => {
                        if !self.is_current(generation) {
                            return PumpExit::Cancelled;
                        }
                        warn!(endpoint = %self.endpoint, error = %e, "transport error");
                        self.emit(FeedEvent::Error(ErrorEvent::from(&e)));
                    }
                    None => return PumpExit::Closed,
                },
            }
        }
    }
}

/// One connection campaign: open, pump, and on failure wait out the retry
/// interval and open again, until the policy gives up or the generation
/// moves on.
async fn run_campaign(inner: Arc<Inner>, generation: u64, previous: Option<JoinHandle<()>>) {
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            debug!(error = %e, "previous campaign ended abnormally");
        }
    }

    loop {
        let was_connected = match inner.open_transport().await {
            Ok(transport) => {
                let (tx, rx) = mpsc::unbounded_channel();
                {
                    let mut m = inner.lock();
                    if m.generation != generation {
                        // superseded while opening; dropping the transport closes it
                        return;
                    }
                    m.state = ConnectionState::Connected;
                    m.retry_count = 0;
                    m.outbound = Some(tx);
                }
                info!(endpoint = %inner.endpoint, "connected");
                inner.emit(FeedEvent::Connected);

                match inner.pump(transport, rx, generation).await {
                    PumpExit::Cancelled => {
                        inner.emit(FeedEvent::Disconnected);
                        return;
                    }
                    PumpExit::Closed => true,
                }
            }
            Err(e) => {
                if !inner.is_current(generation) {
                    return;
                }
                warn!(endpoint = %inner.endpoint, kind = %e.kind(), error = %e, "open failed");
                inner.emit(FeedEvent::Error(ErrorEvent::from(&e)));
                false
            }
        };

        let next = inner.lock().record_failure(generation, &inner.policy);
        if was_connected {
            // Stale here means the caller closed it as the peer did
            if !matches!(next, Next::Stale) {
                warn!(endpoint = %inner.endpoint, "connection closed");
            }
            inner.emit(FeedEvent::Disconnected);
        }

        // a `disconnected` handler may have called `disconnect()`
        if !matches!(next, Next::Stale) && !inner.is_current(generation) {
            debug!(endpoint = %inner.endpoint, "campaign superseded during dispatch");
            return;
        }

        match next {
            Next::Stale => return,
            Next::GiveUp => {
                error!(
                    kind = %ErrorKind::RetryExhausted,
                    endpoint = %inner.endpoint,
                    max_attempts = inner.policy.max_attempts(),
                    "max reconnect attempts reached"
                );
                inner.emit(FeedEvent::MaxReconnectAttemptsReached);
                return;
            }
            Next::Retry { delay, attempt } => {
                info!(
                    endpoint = %inner.endpoint,
                    attempt,
                    max_attempts = inner.policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "reconnecting"
                );
                tokio::time::sleep(delay).await;
            }
        }

        let mut m = inner.lock();
        if m.generation != generation {
            return;
        }
        m.state = ConnectionState::Connecting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::handler;

    #[test]
    fn invalid_config_rejected() {
        let config = FeedConfig::new("ws://localhost:8080/ws").with_max_attempts(0);
        let err = FeedClient::new(config).unwrap_err();
        assert!(matches!(err, FeedError::InvalidConfig(_)));
    }

    #[test]
    fn starts_disconnected() {
        let client = FeedClient::new(FeedConfig::new("ws://localhost:8080/ws")).unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
        assert_eq!(client.retry_count(), 0);
        assert_eq!(client.endpoint(), "ws://localhost:8080/ws");
    }

    #[test]
    fn send_while_disconnected_fails() {
        let client = FeedClient::new(FeedConfig::new("ws://localhost:8080/ws")).unwrap();
        let err = client.send("ping", None).unwrap_err();
        assert!(matches!(err, FeedError::NotConnected { ref state } if state == "disconnected"));
    }

    #[test]
    fn connect_outside_runtime_reports_error() {
        let client = FeedClient::new(FeedConfig::new("ws://localhost:8080/ws")).unwrap();
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&kinds);
        client.subscribe(
            EventName::Error,
            handler(move |ev| {
                if let FeedEvent::Error(detail) = ev {
                    sink.lock().unwrap().push(detail.kind);
                }
                Ok(())
            }),
        );

        client.connect();

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(*kinds.lock().unwrap(), vec![ErrorKind::Other]);
    }

    #[test]
    fn disconnect_when_idle_is_a_no_op() {
        let client = FeedClient::new(FeedConfig::new("ws://localhost:8080/ws")).unwrap();
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
