//! Authenticated HTTP pipeline and the typed endpoint surface.

pub mod client;
pub mod surface;

pub use client::{ApiClient, ApiClientBuilder, ApiClientConfig};
