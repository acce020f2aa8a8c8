//! Wire types for the FluxGate admin API and push channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Authentication
// ============================================================================

/// Credentials submitted to `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body for `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token response from `/auth/login` and `/auth/refresh`.
///
/// The refresh endpoint may rotate only the access token, so the refresh
/// token is optional here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// The operator session's token pair.
///
/// Updated atomically as a pair: login and refresh-success replace it,
/// logout and refresh-failure clear it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token }
    }

    /// Merge a refresh response into the current pair.
    ///
    /// A refresh that does not rotate the refresh token keeps the existing
    /// one, so the pair always stays usable for the next refresh.
    #[must_use]
    pub fn merged_with(&self, response: &TokenResponse) -> Self {
        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone().or_else(|| self.refresh_token.clone()),
        }
    }
}

impl From<TokenResponse> for TokenPair {
    fn from(response: TokenResponse) -> Self {
        Self { access_token: response.access_token, refresh_token: response.refresh_token }
    }
}

// ============================================================================
// Apps
// ============================================================================

/// Per-application quota configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub app_id: String,
    pub guaranteed_quota: u64,
    pub burst_quota: u64,
    pub priority: u8,
    pub max_borrow: u64,
    pub max_connections: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response envelope for `GET /apps`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppList {
    pub apps: Vec<AppConfig>,
}

// ============================================================================
// Clusters
// ============================================================================

/// Per-cluster capacity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub cluster_id: String,
    pub max_capacity: u64,
    pub reserved_ratio: f64,
    pub emergency_threshold: f64,
    pub max_connections: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response envelope for `GET /clusters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterList {
    pub clusters: Vec<ClusterConfig>,
}

// ============================================================================
// Connections
// ============================================================================

/// What a connection limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    App,
    Cluster,
}

/// Live connection counters for one app or cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStats {
    #[serde(rename = "type")]
    pub target_type: TargetKind,
    pub id: String,
    pub current: u64,
    pub limit: u64,
    pub peak: u64,
    pub rejected: u64,
}

/// Response envelope for `GET /connections`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionList {
    pub connections: Vec<ConnectionStats>,
}

/// Body for `PUT /connections`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionLimitUpdate {
    pub target_type: TargetKind,
    pub target_id: String,
    pub limit: u64,
}

// ============================================================================
// Emergency mode
// ============================================================================

/// Current emergency-mode state as reported by `GET /emergency`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyStatus {
    pub active: bool,
    pub reason: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Requested duration in seconds.
    #[serde(default)]
    pub duration: i64,
}

/// Body for `POST /emergency/activate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyActivation {
    pub reason: String,
    /// Duration in seconds.
    pub duration: i64,
}

// ============================================================================
// Mutation acknowledgements
// ============================================================================

/// Generic `{"success": true}` envelope returned by mutation endpoints.
///
/// Create responses additionally echo the created resource's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

// ============================================================================
// Metrics
// ============================================================================

/// Backend degradation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    Normal,
    Degraded,
    Emergency,
}

/// System-wide counters from `GET /metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub requests_total: u64,
    pub rejected_total: u64,
    pub l3_hits: u64,
    pub cache_hit_ratio: f64,
    pub emergency_active: bool,
    pub degradation_level: DegradationLevel,
    pub reconcile_corrections: u64,
}

/// Per-application counters from `GET /metrics/apps/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetrics {
    pub app_id: String,
    pub requests_total: u64,
    pub rejected_total: u64,
    pub tokens_available: u64,
    pub pending_cost: u64,
}

// ============================================================================
// Push channel
// ============================================================================

/// Kind tag carried on every push-channel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Metrics,
    Emergency,
    Connection,
    Error,
}

/// One server-pushed message. Immutable after parse; the payload stays
/// opaque JSON so each consumer decodes only the kinds it cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
