use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::errors::ConfigError;
use crate::health::health_url_for;
use crate::payload::PayloadSequence;
use crate::utils::parse_duration_string;

pub const DEFAULT_TARGET_URL: &str = "http://localhost:8000/predict";

/// Longest accepted run. Keeps `start + duration` representable as an instant.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Flags that may also be spelled with a single dash (`-url`, `-workers=4`).
const SINGLE_DASH_FLAGS: &[&str] = &["url", "workers", "duration"];

/// Command-line interface. Every flag can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "predict-loadtest",
    version,
    about = "Load test a JSON prediction endpoint with a pool of concurrent workers"
)]
pub struct Cli {
    /// Prediction endpoint that receives the POST requests
    #[arg(long, env = "LOADTEST_URL", default_value = DEFAULT_TARGET_URL)]
    pub url: String,

    /// Number of concurrent workers (at least 1)
    #[arg(long, env = "LOADTEST_WORKERS", default_value_t = 10)]
    pub workers: usize,

    /// Test duration: whole seconds (60) or a suffixed value (30s, 10m, 2h, 1d)
    #[arg(
        long,
        env = "LOADTEST_DURATION",
        default_value = "60",
        value_parser = parse_duration_string
    )]
    pub duration: Duration,

    /// Liveness endpoint checked before the run [default: <url host>/health]
    #[arg(long, env = "LOADTEST_HEALTH_URL")]
    pub health_url: Option<String>,

    /// JSON file holding an array of request bodies to rotate through
    #[arg(long, env = "LOADTEST_PAYLOAD_FILE")]
    pub payload_file: Option<PathBuf>,

    /// Per-request timeout in seconds; also bounds how long a run can overrun
    #[arg(long, env = "LOADTEST_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,

    /// Serve Prometheus metrics on this port during the run
    #[arg(long, env = "LOADTEST_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Log output format
    #[arg(long, env = "LOADTEST_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Validated, immutable run configuration shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target_url: String,
    pub health_url: String,
    pub workers: usize,
    pub duration: Duration,
    pub request_timeout: Duration,
    pub payloads: PayloadSequence,
    pub metrics_port: Option<u16>,
}

impl RunConfig {
    /// Configuration with defaults for everything but the target and shape of the run.
    pub fn new(target_url: &str, workers: usize, duration: Duration) -> Result<Self, ConfigError> {
        validate_workers(workers)?;
        validate_duration(duration)?;
        Ok(Self {
            target_url: validate_url(target_url)?,
            health_url: health_url_for(target_url)?,
            workers,
            duration,
            request_timeout: Duration::from_secs(30),
            payloads: PayloadSequence::samples(),
            metrics_port: None,
        })
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "API URL: {}", self.target_url)?;
        writeln!(f, "Health URL: {}", self.health_url)?;
        writeln!(f, "Test duration: {} seconds", self.duration.as_secs())?;
        writeln!(f, "Number of concurrent workers: {}", self.workers)?;
        writeln!(f, "Payload rotation: {} bodies", self.payloads.len())?;
        write!(f, "Request timeout: {}s", self.request_timeout.as_secs())
    }
}

impl Cli {
    /// Validates the parsed flags and loads the payload rotation.
    pub fn into_run_config(self) -> Result<RunConfig, ConfigError> {
        validate_workers(self.workers)?;
        validate_duration(self.duration)?;

        if self.request_timeout == 0 {
            return Err(ConfigError::OutOfRange {
                field: "request-timeout",
                value: self.request_timeout.to_string(),
                min: "1".to_string(),
            });
        }

        let target_url = validate_url(&self.url)?;
        let health_url = match self.health_url {
            Some(url) => validate_url(&url)?,
            None => health_url_for(&target_url)?,
        };

        let payloads = match self.payload_file {
            Some(path) => PayloadSequence::from_file(&path)?,
            None => PayloadSequence::samples(),
        };

        Ok(RunConfig {
            target_url,
            health_url,
            workers: self.workers,
            duration: self.duration,
            request_timeout: Duration::from_secs(self.request_timeout),
            payloads,
            metrics_port: self.metrics_port,
        })
    }
}

/// Rewrites Go-style single-dash long flags (`-url x`, `-workers=4`) into the
/// double-dash form clap expects. Other arguments pass through unchanged.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(|arg| {
            let arg: OsString = arg.into();
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(rest) = text.strip_prefix('-') else {
                return arg;
            };
            if rest.starts_with('-') {
                return arg;
            }
            let name = rest.split('=').next().unwrap_or(rest);
            if SINGLE_DASH_FLAGS.contains(&name) {
                OsString::from(format!("-{}", text))
            } else {
                arg
            }
        })
        .collect()
}

fn validate_workers(workers: usize) -> Result<(), ConfigError> {
    if workers == 0 {
        return Err(ConfigError::OutOfRange {
            field: "workers",
            value: workers.to_string(),
            min: "1".to_string(),
        });
    }
    Ok(())
}

fn validate_duration(duration: Duration) -> Result<(), ConfigError> {
    if duration > MAX_DURATION {
        return Err(ConfigError::TooLarge {
            field: "duration",
            value: format!("{}s", duration.as_secs()),
            max: format!("{}s", MAX_DURATION.as_secs()),
        });
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<String, ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            message: format!("unsupported scheme '{}', expected http or https", other),
        }),
    }
}
