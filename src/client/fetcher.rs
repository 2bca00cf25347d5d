use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::authz::PermissionsResponse;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("permission request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("permission endpoint returned status {0}")]
    Status(u16),
    #[error("invalid permission payload: {0}")]
    Decode(String),
}

/// Where the cache loads the caller's snapshot from.
#[derive(Debug, Clone)]
pub struct PermissionClientConfig {
    pub base_url: String,
    pub endpoint: String,
    pub bearer_token: Option<String>,
    pub timeout: Duration,
}

impl Default for PermissionClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            endpoint: "/permissions/me".to_string(),
            bearer_token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl PermissionClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.endpoint)
    }
}

/// One round trip for the current user's permission document.
#[async_trait]
pub trait PermissionFetcher: Send + Sync {
    async fn fetch(&self) -> Result<PermissionsResponse, ClientError>;
}

pub struct HttpPermissionFetcher {
    client: Client,
    config: PermissionClientConfig,
}

impl HttpPermissionFetcher {
    pub fn new(config: PermissionClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PermissionFetcher for HttpPermissionFetcher {
    async fn fetch(&self) -> Result<PermissionsResponse, ClientError> {
        let mut request = self.client.get(self.config.url());
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        response
            .json::<PermissionsResponse>()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_endpoint() {
        let config = PermissionClientConfig::new("http://api.local/").with_token("t");
        assert_eq!(config.url(), "http://api.local/permissions/me");
        assert_eq!(config.timeout, Duration::from_secs(10));

        let custom = config.with_endpoint("/v2/permissions/me");
        assert_eq!(custom.url(), "http://api.local/v2/permissions/me");
    }
}
