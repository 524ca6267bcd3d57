//! Liveness precheck run before any worker is spawned.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::errors::ConfigError;

/// Upper bound for the whole health request.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Path of the liveness endpoint on the target host.
pub const HEALTH_PATH: &str = "/health";

/// Derives the `/health` URL on the same scheme, host and port as `target_url`.
pub fn health_url_for(target_url: &str) -> Result<String, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidUrl {
        url: target_url.to_string(),
        message,
    };

    let parsed = reqwest::Url::parse(target_url).map_err(|e| invalid(e.to_string()))?;
    let health = parsed
        .join(HEALTH_PATH)
        .map_err(|e| invalid(e.to_string()))?;
    Ok(health.to_string())
}

/// Returns true only if a GET to `health_url` answers 200 within
/// [`HEALTH_CHECK_TIMEOUT`].
pub async fn check_health(health_url: &str) -> bool {
    let client = match reqwest::Client::builder()
        .timeout(HEALTH_CHECK_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Failed to build health check client");
            return false;
        }
    };

    match client.get(health_url).send().await {
        Ok(response) if response.status() == StatusCode::OK => {
            info!(url = health_url, "Health check passed");
            true
        }
        Ok(response) => {
            warn!(
                url = health_url,
                status_code = response.status().as_u16(),
                "Health check returned unexpected status"
            );
            false
        }
        Err(e) => {
            warn!(url = health_url, error = %e, "Health check request failed");
            false
        }
    }
}
