//! Shared run statistics.
//!
//! [`RunStatistics`] is the only structure written by more than one worker.
//! Each record method takes one short lock, so concurrent records never lose
//! updates, and memory stays bounded for failures: at most
//! [`MAX_ERROR_SAMPLES`] distinct detail strings are kept.
//!
//! [`RunStatistics::snapshot`] is a pure read. The scheduler only calls it
//! after every worker has exited, so the numbers it sees are final.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::executor::RequestOutcome;

/// Maximum number of distinct error details retained.
pub const MAX_ERROR_SAMPLES: usize = 10;

/// A retained error detail and how many failures reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSample {
    pub detail: String,
    pub count: u64,
}

#[derive(Debug, Default)]
struct SuccessLog {
    // One entry per successful request; its length is the success count.
    latencies: Vec<Duration>,
}

#[derive(Debug, Default)]
struct FailureLog {
    count: u64,
    samples: Vec<ErrorSample>,
}

/// Concurrency-safe accumulator for request outcomes.
///
/// Share it between workers with an `Arc`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct RunStatistics {
    successes: Mutex<SuccessLog>,
    failures: Mutex<FailureLog>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one success and keeps its latency.
    pub fn record_success(&self, latency: Duration) {
        lock(&self.successes).latencies.push(latency);
    }

    /// Counts one failure.
    ///
    /// `detail` is kept only if it is already known (its count goes up) or
    /// fewer than [`MAX_ERROR_SAMPLES`] distinct details are stored; otherwise
    /// it is dropped.
    pub fn record_failure(&self, detail: &str) {
        let mut failures = lock(&self.failures);
        failures.count += 1;

        if let Some(sample) = failures.samples.iter_mut().find(|s| s.detail == detail) {
            sample.count += 1;
        } else if failures.samples.len() < MAX_ERROR_SAMPLES {
            failures.samples.push(ErrorSample {
                detail: detail.to_string(),
                count: 1,
            });
        }
    }

    /// Folds one executor outcome into the statistics.
    pub fn record(&self, outcome: &RequestOutcome) {
        if outcome.success {
            self.record_success(outcome.latency);
        } else {
            self.record_failure(outcome.error_detail.as_deref().unwrap_or("unknown error"));
        }
    }

    pub fn success_count(&self) -> u64 {
        lock(&self.successes).latencies.len() as u64
    }

    pub fn failure_count(&self) -> u64 {
        lock(&self.failures).count
    }

    pub fn total_count(&self) -> u64 {
        self.success_count() + self.failure_count()
    }

    /// Retained error details in first-seen order.
    pub fn error_samples(&self) -> Vec<ErrorSample> {
        lock(&self.failures).samples.clone()
    }

    /// Computes the report for a run that went from `start` to `end`.
    ///
    /// Does not modify the accumulated data; calling it twice on stopped
    /// statistics yields identical reports.
    pub fn snapshot(&self, start: Instant, end: Instant) -> StatsReport {
        let duration = end.saturating_duration_since(start);

        let mut latencies = lock(&self.successes).latencies.clone();
        let (failed_requests, errors) = {
            let failures = lock(&self.failures);
            (failures.count, failures.samples.clone())
        };

        let successful_requests = latencies.len() as u64;
        let total_requests = successful_requests + failed_requests;

        let success_rate = ratio(successful_requests as f64, total_requests as f64);
        let requests_per_second = ratio(total_requests as f64, duration.as_secs_f64());
        let successful_rps = ratio(successful_requests as f64, duration.as_secs_f64());

        StatsReport {
            total_requests,
            successful_requests,
            failed_requests,
            duration,
            success_rate,
            requests_per_second,
            successful_rps,
            latency: LatencyStats::from_samples(&mut latencies),
            errors,
        }
    }
}

/// Latency summary over successful requests.
///
/// `median` is the element at index `len / 2` of the sorted samples, the upper
/// median when the count is even. It is an approximation, not an
/// interpolated percentile. All fields are zero when there were no successes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyStats {
    pub average: Duration,
    pub median: Duration,
    pub min: Duration,
    pub max: Duration,
    /// Sample standard deviation; zero with fewer than two samples.
    pub std_dev: Duration,
}

impl LatencyStats {
    /// Sorts `samples` in place and summarizes them.
    fn from_samples(samples: &mut [Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        samples.sort_unstable();

        let count = samples.len();
        let total_nanos: u128 = samples.iter().map(Duration::as_nanos).sum();
        let mean_nanos = total_nanos / count as u128;
        let average = Duration::from_nanos(u64::try_from(mean_nanos).unwrap_or(u64::MAX));

        let std_dev = if count > 1 {
            let mean = average.as_secs_f64();
            let variance = samples
                .iter()
                .map(|d| {
                    let delta = d.as_secs_f64() - mean;
                    delta * delta
                })
                .sum::<f64>()
                / (count - 1) as f64;
            Duration::from_secs_f64(variance.sqrt())
        } else {
            Duration::ZERO
        };

        Self {
            average,
            median: samples[count / 2],
            min: samples[0],
            max: samples[count - 1],
            std_dev,
        }
    }
}

/// Derived metrics for one finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub duration: Duration,
    /// Fraction of requests that succeeded, in `0.0..=1.0`.
    pub success_rate: f64,
    pub requests_per_second: f64,
    pub successful_rps: f64,
    pub latency: LatencyStats,
    pub errors: Vec<ErrorSample>,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
