//! chainfeed-core: foundation traits and types for ChainFeed.
//!
//! # Overview
//!
//! ChainFeed is a reconnecting publish/subscribe client that pushes new-block,
//! new-transaction and peer-update notifications from a ledger node to local
//! subscribers. The core crate defines:
//!
//! - [`Envelope`]: the `{type, payload}` wire unit
//! - [`EventName`] / [`FeedEvent`]: the closed event vocabulary
//! - [`FeedError`] / [`ErrorKind`]: structured error type and taxonomy
//! - [`FeedConfig`]: construction-time client configuration
//! - [`Connector`]: the transport seam every socket backend implements
//! - [`policy`] module: fixed-delay, bounded reconnection policy
//! - [`types`] module: ledger domain payloads (blocks, transactions, peers)

pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod policy;
pub mod transport;
pub mod types;

pub use config::FeedConfig;
pub use envelope::Envelope;
pub use error::{ErrorKind, FeedError};
pub use event::{ConnectionState, ErrorEvent, EventName, FeedEvent};
pub use policy::RetryPolicy;
pub use transport::{Connector, FrameSink, FrameStream, Transport};
