use std::time::Duration;

use crate::config::RunConfig;

/// Settings for the pooled HTTP client shared by every worker.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Ceiling for one request, connect through last body byte
    pub request_timeout: Duration,

    /// Maximum idle connections to keep per host
    pub max_idle_per_host: usize,

    /// How long idle connections stay in the pool before cleanup
    pub idle_timeout: Duration,

    /// TCP keepalive duration
    pub tcp_keepalive: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_idle_per_host: 100,
            idle_timeout: Duration::from_secs(90),
            tcp_keepalive: Some(Duration::from_secs(60)),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }

    /// Apply this configuration to a reqwest ClientBuilder.
    pub fn apply_to_builder(&self, builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        let mut builder = builder
            .timeout(self.request_timeout)
            .pool_max_idle_per_host(self.max_idle_per_host)
            .pool_idle_timeout(self.idle_timeout);

        if let Some(keepalive) = self.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        builder
    }
}

/// Sized so every worker can keep an idle connection between requests.
impl From<&RunConfig> for ClientConfig {
    fn from(config: &RunConfig) -> Self {
        let defaults = Self::default();
        let max_idle = defaults.max_idle_per_host.max(config.workers);
        defaults
            .with_request_timeout(config.request_timeout)
            .with_max_idle_per_host(max_idle)
    }
}

/// Builds the connection-pooled client that all workers clone.
pub fn build_client(config: &ClientConfig) -> Result<reqwest::Client, reqwest::Error> {
    config.apply_to_builder(reqwest::Client::builder()).build()
}
