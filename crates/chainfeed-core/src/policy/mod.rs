//! Reconnection policy.
//!
//! The client retries a lost or failed connection on a fixed delay until a
//! bounded number of consecutive failures, then gives up:
//! ```text
//! failure → [RetryPolicy::next_delay] → Some(interval) → reopen
//!                                     → None           → Failed
//! ```

pub mod retry;

pub use retry::RetryPolicy;
