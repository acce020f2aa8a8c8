//! Shared wire and domain types for the FluxGate console client.
//!
//! Everything here mirrors the JSON the backend speaks: auth payloads,
//! resource models (apps, clusters, connections, emergency, metrics) and
//! the push-channel message envelope. No I/O lives in this crate.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod types;

pub use types::{
    Ack, AppConfig, AppList, AppMetrics, ClusterConfig, ClusterList, ConnectionLimitUpdate,
    ConnectionList, ConnectionStats, DegradationLevel, EmergencyActivation, EmergencyStatus,
    LoginRequest, MessageKind, PushMessage, RefreshRequest, SystemMetrics, TargetKind, TokenPair,
    TokenResponse,
};
