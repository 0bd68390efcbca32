//! Event vocabulary, typed event values and the connection state enum.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ErrorKind, FeedError};

/// Identifier a subscriber registers against.
///
/// Domain events are mapped from inbound wire `type`s; lifecycle events are
/// emitted by the client itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    NewBlock,
    NewTransaction,
    PeerUpdate,
    Connected,
    Disconnected,
    Error,
    MaxReconnectAttemptsReached,
}

impl EventName {
    /// Every event name, domain events first.
    pub const ALL: [EventName; 7] = [
        Self::NewBlock,
        Self::NewTransaction,
        Self::PeerUpdate,
        Self::Connected,
        Self::Disconnected,
        Self::Error,
        Self::MaxReconnectAttemptsReached,
    ];

    /// Map an inbound wire `type` (case-sensitive) to its event name.
    /// Returns `None` for anything outside the known vocabulary.
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "new_block" => Some(Self::NewBlock),
            "new_transaction" => Some(Self::NewTransaction),
            "peer_update" => Some(Self::PeerUpdate),
            _ => None,
        }
    }

    /// The camelCase name used in logs and on the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewBlock => "newBlock",
            Self::NewTransaction => "newTransaction",
            Self::PeerUpdate => "peerUpdate",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::MaxReconnectAttemptsReached => "maxReconnectAttemptsReached",
        }
    }

    /// `true` for events the client emits itself rather than receives.
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, Self::NewBlock | Self::NewTransaction | Self::PeerUpdate)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| FeedError::Decode(format!("unknown event name: {s}")))
    }
}

/// Detail carried by an `error` event. Never the raw transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&FeedError> for ErrorEvent {
    fn from(err: &FeedError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// A dispatched event. Lifecycle events carry no payload; domain events
/// carry the inbound payload (`Value::Null` when absent).
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    NewBlock(Value),
    NewTransaction(Value),
    PeerUpdate(Value),
    Connected,
    Disconnected,
    Error(ErrorEvent),
    MaxReconnectAttemptsReached,
}

impl FeedEvent {
    /// Build the domain event for `name`. Returns `None` for lifecycle names.
    pub fn domain(name: EventName, payload: Value) -> Option<Self> {
        match name {
            EventName::NewBlock => Some(Self::NewBlock(payload)),
            EventName::NewTransaction => Some(Self::NewTransaction(payload)),
            EventName::PeerUpdate => Some(Self::PeerUpdate(payload)),
            _ => None,
        }
    }

    /// The name subscribers registered against.
    pub fn name(&self) -> EventName {
        match self {
            Self::NewBlock(_) => EventName::NewBlock,
            Self::NewTransaction(_) => EventName::NewTransaction,
            Self::PeerUpdate(_) => EventName::PeerUpdate,
            Self::Connected => EventName::Connected,
            Self::Disconnected => EventName::Disconnected,
            Self::Error(_) => EventName::Error,
            Self::MaxReconnectAttemptsReached => EventName::MaxReconnectAttemptsReached,
        }
    }

    /// Domain payload, if this is a domain event.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::NewBlock(v) | Self::NewTransaction(v) | Self::PeerUpdate(v) => Some(v),
            _ => None,
        }
    }

    /// Deserialize the domain payload into a typed struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, FeedError> {
        let payload = self.payload().ok_or_else(|| {
            FeedError::Decode(format!("{} event carries no payload", self.name()))
        })?;
        T::deserialize(payload).map_err(|e| FeedError::Decode(e.to_string()))
    }
}

/// Connection Manager state. Exactly one is active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; initial state and the result of `disconnect()`.
    Disconnected,
    /// Transport open in flight.
    Connecting,
    /// Transport open; frames flow.
    Connected,
    /// Waiting out the retry interval before the next open.
    Reconnecting,
    /// Retries exhausted. Terminal until `connect()` is called again.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
