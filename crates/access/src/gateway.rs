use crate::error::{AccessError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// What we ask the upstream control plane to do with a key card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayAction {
    Grant,
    Revoke,
}

impl GatewayAction {
    /// Value of the `action` query parameter the upstream expects.
    fn as_query_value(self) -> &'static str {
        match self {
            GatewayAction::Grant => "assign",
            GatewayAction::Revoke => "revoke",
        }
    }
}

/// Upstream connection settings, injected rather than read from the
/// environment at call time.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl GatewayConfig {
    pub fn from_env() -> std::result::Result<Self, std::env::VarError> {
        Ok(Self {
            base_url: std::env::var("ACCESS_CONTROL_SERVER_URL")?,
            username: std::env::var("ACCESS_CONTROL_SERVER_USERNAME")?,
            password: std::env::var("ACCESS_CONTROL_SERVER_PASSWORD")?,
        })
    }
}

/// What the upstream answered; handed back to the caller verbatim.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

/// Seam to the external access-control server. The real implementation is
/// [`UpstreamGateway`]; tests substitute a scripted fake.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn call(
        &self,
        action: GatewayAction,
        key_card: &str,
        access_points: &[String],
    ) -> Result<GatewayResponse>;
}

/// HTTP client for the access-control server. Locally side-effect free; all
/// state change happens on the remote system.
pub struct UpstreamGateway {
    client: Client,
    config: GatewayConfig,
}

impl UpstreamGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AccessError::Processing(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// The upstream speaks a semicolon-delimited query:
    /// `<base>action=<assign|revoke>;device=<p1,p2,...>;id=<key_card>`.
    /// The base URL is taken as configured, trailing `?` and all.
    fn build_url(&self, action: GatewayAction, key_card: &str, access_points: &[String]) -> String {
        format!(
            "{}action={};device={};id={}",
            self.config.base_url,
            action.as_query_value(),
            access_points.join(","),
            key_card
        )
    }
}

/// 200 and 201 are the only statuses the upstream uses for acknowledgment.
fn is_success(status: u16) -> bool {
    status == 200 || status == 201
}

#[async_trait]
impl ControlPlane for UpstreamGateway {
    async fn call(
        &self,
        action: GatewayAction,
        key_card: &str,
        access_points: &[String],
    ) -> Result<GatewayResponse> {
        let url = self.build_url(action, key_card, access_points);
        tracing::debug!(%url, ?action, "calling upstream access control");

        // Single synchronous GET; no retry.
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| AccessError::UpstreamUnavailable {
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if !is_success(status) {
            return Err(AccessError::UpstreamUnavailable {
                status: Some(status),
                detail: body,
            });
        }

        Ok(GatewayResponse { status, body })
    }
}
