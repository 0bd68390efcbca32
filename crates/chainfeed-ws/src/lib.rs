//! chainfeed-ws: reconnecting WebSocket event feed.
//!
//! # Features
//! - Connection state machine with fixed-delay, bounded auto-reconnect
//! - `{type, payload}` frame routing to a closed event vocabulary
//! - Ordered subscriber lists with per-handler fault isolation
//! - Non-blocking sends that fail fast while disconnected
//! - Pluggable transport via [`chainfeed_core::Connector`]

pub mod client;
pub mod connector;
pub mod router;
pub mod subscriptions;

pub use client::FeedClient;
pub use connector::WsConnector;
pub use router::{dispatch_frame, route, FrameOutcome, Routed};
pub use subscriptions::{handler, DispatchReport, Handler, HandlerError, SubscriberRegistry};
