//! Typed endpoint methods, one per backend route.
//!
//! Thin wrappers over the pipeline in [`client`](super::client): each method
//! names the route, the request type, and the response type, and nothing
//! else. List endpoints unwrap the backend's `{"apps": [...]}`-style
//! envelopes.

use reqwest::Method;
use tracing::info;

use fluxgate_domain::{
    Ack, AppConfig, AppList, AppMetrics, ClusterConfig, ClusterList, ConnectionLimitUpdate,
    ConnectionList, ConnectionStats, EmergencyActivation, EmergencyStatus, LoginRequest,
    SystemMetrics, TokenPair, TokenResponse,
};

use crate::api::ApiClient;
use crate::errors::ApiError;

impl ApiClient {
    // ------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------

    /// `POST /auth/login`. On success the returned pair is stored in the
    /// session, so subsequent calls authenticate automatically.
    ///
    /// A 401 here means bad credentials and is never routed through the
    /// refresh cycle.
    ///
    /// # Errors
    /// [`ApiError::Unauthorized`] for rejected credentials, or any other
    /// pipeline error.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|err| ApiError::Decode(format!("failed to serialize credentials: {err}")))?;

        let response: TokenResponse =
            self.execute_unguarded(Method::POST, "/auth/login", Some(body)).await?;

        let pair = TokenPair::from(response);
        self.session().store(pair.clone());
        info!(username, "signed in");
        Ok(pair)
    }

    /// Drop the session's credentials. Local only; the backend holds no
    /// session state to tear down.
    pub fn logout(&self) {
        self.session().clear();
        info!("signed out");
    }

    // ------------------------------------------------------------------
    // Apps
    // ------------------------------------------------------------------

    /// `GET /apps`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn list_apps(&self) -> Result<Vec<AppConfig>, ApiError> {
        self.get::<AppList>("/apps").await.map(|list| list.apps)
    }

    /// `POST /apps`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn create_app(&self, config: &AppConfig) -> Result<Ack, ApiError> {
        self.post("/apps", config).await
    }

    /// `GET /apps/{id}`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn get_app(&self, app_id: &str) -> Result<AppConfig, ApiError> {
        self.get(&format!("/apps/{app_id}")).await
    }

    /// `PUT /apps/{id}`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn update_app(&self, config: &AppConfig) -> Result<Ack, ApiError> {
        self.put(&format!("/apps/{}", config.app_id), config).await
    }

    /// `DELETE /apps/{id}`. The backend answers 204.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn delete_app(&self, app_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/apps/{app_id}")).await
    }

    // ------------------------------------------------------------------
    // Clusters
    // ------------------------------------------------------------------

    /// `GET /clusters`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn list_clusters(&self) -> Result<Vec<ClusterConfig>, ApiError> {
        self.get::<ClusterList>("/clusters").await.map(|list| list.clusters)
    }

    /// `GET /clusters/{id}`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterConfig, ApiError> {
        self.get(&format!("/clusters/{cluster_id}")).await
    }

    /// `PUT /clusters/{id}`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn update_cluster(&self, config: &ClusterConfig) -> Result<Ack, ApiError> {
        self.put(&format!("/clusters/{}", config.cluster_id), config).await
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// `GET /connections`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn connection_stats(&self) -> Result<Vec<ConnectionStats>, ApiError> {
        self.get::<ConnectionList>("/connections").await.map(|list| list.connections)
    }

    /// `PUT /connections`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn update_connection_limit(
        &self,
        update: &ConnectionLimitUpdate,
    ) -> Result<Ack, ApiError> {
        self.put("/connections", update).await
    }

    // ------------------------------------------------------------------
    // Emergency mode
    // ------------------------------------------------------------------

    /// `GET /emergency`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn emergency_status(&self) -> Result<EmergencyStatus, ApiError> {
        self.get("/emergency").await
    }

    /// `POST /emergency/activate`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn activate_emergency(
        &self,
        activation: &EmergencyActivation,
    ) -> Result<Ack, ApiError> {
        self.post("/emergency/activate", activation).await
    }

    /// `POST /emergency/deactivate`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn deactivate_emergency(&self) -> Result<Ack, ApiError> {
        self.post_empty("/emergency/deactivate").await
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    /// `GET /metrics`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn system_metrics(&self) -> Result<SystemMetrics, ApiError> {
        self.get("/metrics").await
    }

    /// `GET /metrics/apps/{id}`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn app_metrics(&self, app_id: &str) -> Result<AppMetrics, ApiError> {
        self.get(&format!("/metrics/apps/{app_id}")).await
    }

    /// `GET /metrics/connections`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn connection_metrics(&self) -> Result<Vec<ConnectionStats>, ApiError> {
        self.get::<ConnectionList>("/metrics/connections").await.map(|list| list.connections)
    }
}
