//! HTTP Connector for the Weather Endpoint
//!
//! ## Overview
//!
//! Submits one [`WeatherUpdate`] per cycle as a GET with query parameters,
//! using the blocking `ureq` client on tokio's blocking pool.
//!
//! ## Request Policy
//!
//! - One request per cycle, never retried: a missed update is simply
//!   superseded by the next cycle's
//! - The agent timeout bounds the whole request
//! - Any 2xx status is success; everything else is an error
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use edgestation_connectors::{HttpConfig, PwsWeatherClient, WeatherEndpoint, WeatherUpdate};
//! use edgestation_core::Reading;
//!
//! # async fn run() -> Result<(), edgestation_connectors::ConnectorError> {
//! let client = PwsWeatherClient::new(HttpConfig::default().timeout_secs(30))?;
//! let update = WeatherUpdate::from_reading(&Reading::evaluate(22.5, 45.0, 1013.25), "KSTATION1", "key");
//! let status = client.submit(&update).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::{ConnectionStats, ConnectorError, WeatherEndpoint, WeatherUpdate};

/// Default PWS update endpoint
pub const DEFAULT_ENDPOINT: &str = "https://pwsupdate.pwsweather.com/api/v1/submitwx";

/// HTTP-specific errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(String),

    /// Server returned error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// HTTP configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Full URL of the update endpoint
    pub endpoint: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl HttpConfig {
    /// Create new configuration for an endpoint URL
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(30),
            user_agent: format!("EdgeStation/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Check the endpoint URL
    pub fn validate(&self) -> Result<(), HttpError> {
        let rest = self
            .endpoint
            .strip_prefix("https://")
            .or_else(|| self.endpoint.strip_prefix("http://"))
            .ok_or_else(|| HttpError::Config("Endpoint must start with http:// or https://".into()))?;
        if rest.is_empty() || rest.starts_with('/') {
            return Err(HttpError::Config(format!("Endpoint {} has no host", self.endpoint)));
        }
        Ok(())
    }
}

/// Client for a PWS-style `updateraw` endpoint
pub struct PwsWeatherClient {
    config: HttpConfig,
    agent: ureq::Agent,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl PwsWeatherClient {
    /// Create new client
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        config.validate()?;

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self {
            config,
            agent,
            stats: Arc::new(Mutex::new(ConnectionStats::default())),
        })
    }

    /// Get connection statistics
    pub fn stats(&self) -> ConnectionStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, result: &Result<u16, HttpError>) {
        let Ok(mut stats) = self.stats.lock() else { return };
        match result {
            Ok(_) => stats.messages_sent += 1,
            Err(e) => {
                stats.messages_failed += 1;
                stats.last_error = Some(e.to_string());
            }
        }
    }
}

fn execute(agent: ureq::Agent, endpoint: String, pairs: Vec<(&'static str, String)>) -> Result<u16, HttpError> {
    let mut request = agent.get(&endpoint);
    for (name, value) in &pairs {
        request = request.query(name, value);
    }

    match request.call() {
        Ok(resp) if (200..300).contains(&resp.status()) => Ok(resp.status()),
        Ok(resp) => Err(HttpError::ServerError {
            status: resp.status(),
            message: resp.status_text().to_string(),
        }),
        Err(ureq::Error::Status(code, resp)) => Err(HttpError::ServerError {
            status: code,
            message: resp.into_string().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(e)) => Err(HttpError::Request(e.to_string())),
    }
}

#[async_trait::async_trait]
impl WeatherEndpoint for PwsWeatherClient {
    async fn submit(&self, update: &WeatherUpdate) -> Result<u16, ConnectorError> {
        log::debug!("submitting {:?} to {}", update, self.config.endpoint);

        let agent = self.agent.clone();
        let endpoint = self.config.endpoint.clone();
        let pairs = update.query_pairs();
        let result = tokio::task::spawn_blocking(move || execute(agent, endpoint, pairs))
            .await
            .unwrap_or_else(|e| Err(HttpError::Request(e.to_string())));

        self.record(&result);
        Ok(result?)
    }
}
