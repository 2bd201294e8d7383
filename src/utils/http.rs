//! HTTP client utilities.

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GrobidConfig;

/// User agent sent with every outbound request
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with bounded timeouts
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client with a total request timeout and a connect timeout
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            timeout,
        })
    }

    /// Create a client using the timeouts of the `[grobid]` settings
    pub fn from_config(config: &GrobidConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.timeout(), config.connect_timeout())
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Total timeout applied to each request
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
