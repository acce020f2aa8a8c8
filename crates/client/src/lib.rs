//! FluxGate console client: the authenticated access layer between the
//! admin UI and the traffic-management backend.
//!
//! The crate is organized around four pieces:
//!
//! - [`auth`]: the session's token pair ([`SessionStore`]) and the
//!   single-flight refresh coordinator behind 401 handling.
//! - [`api`]: the request pipeline ([`ApiClient`]) plus one typed method per
//!   backend route. Every request carries a bearer token and a correlation
//!   id; a 401 triggers one refresh-and-replay cycle shared across all
//!   concurrent requests.
//! - [`events`]: a reconnecting WebSocket ([`EventChannel`]) buffering
//!   server-pushed frames.
//! - [`notify`]: the seam through which terminal failures reach the
//!   operator.
//!
//! Retry with backoff is opt-in per call: compose
//! [`fluxgate_common::retry`] with [`errors::http_retry_policy`], or use
//! [`ApiClient::get_with_retry`].

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod api;
pub mod auth;
pub mod errors;
pub mod events;
pub mod notify;

pub use api::{ApiClient, ApiClientBuilder, ApiClientConfig};
pub use auth::{RefreshCoordinator, SessionStore};
pub use errors::{http_retry_policy, ApiError};
pub use events::{EventChannel, EventChannelConfig};
pub use notify::{Notifier, Signal, TracingNotifier};
