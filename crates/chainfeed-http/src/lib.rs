//! chainfeed-http: request/response client for the ledger node's REST API.
//!
//! Plain requests with no retry: failures propagate to the caller as
//! [`chainfeed_core::FeedError`].

pub mod client;

pub use client::{HttpClientConfig, LedgerApiClient};
