//! Leaf utilities shared across FluxGate console crates.
//!
//! - [`vault`]: durable key/value persistence for tokens and small settings,
//!   with optional reversible obfuscation.
//! - [`resilience`]: retry with exponential backoff and a race-against-a-timer
//!   helper.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;
pub mod vault;

pub use resilience::retry::{retry, RetryConfig, RetryDecision, RetryExecutor, RetryPolicy};
pub use resilience::timeout::{race_timeout, Elapsed, DEFAULT_RACE_TIMEOUT};
pub use vault::Vault;
