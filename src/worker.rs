use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::executor::execute;
use crate::metrics::{observe_outcome, CONCURRENT_REQUESTS, REQUEST_TOTAL};
use crate::payload::PayloadSequence;
use crate::stats::RunStatistics;

/// One-shot stop latch shared by the coordinator and every worker.
///
/// Once triggered it stays triggered. Checking it never blocks.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tells every worker to exit after its current request.
    pub fn trigger(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Configuration for a worker task.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub task_id: usize,
    pub url: Arc<str>,
    pub payloads: PayloadSequence,
}

/// Runs a single worker task: sends requests back to back until `stop` is
/// triggered, recording every outcome into `stats`.
///
/// A request already in flight when the signal fires is finished and
/// recorded before the worker exits. Returns the number of requests sent.
pub async fn run_worker(
    client: reqwest::Client,
    config: WorkerConfig,
    stats: Arc<RunStatistics>,
    stop: StopSignal,
) -> u64 {
    debug!(
        task_id = config.task_id,
        url = %config.url,
        payloads = config.payloads.len(),
        "Worker starting"
    );

    let mut payload_index: usize = 0;
    let mut sent: u64 = 0;

    while !stop.is_triggered() {
        let payload = config.payloads.get(payload_index);

        CONCURRENT_REQUESTS.inc();
        REQUEST_TOTAL.inc();

        let outcome = execute(&client, &config.url, payload).await;

        CONCURRENT_REQUESTS.dec();
        observe_outcome(&outcome);

        if let Some(detail) = outcome.error_detail.as_deref() {
            debug!(
                task_id = config.task_id,
                error = detail,
                latency_ms = u64::try_from(outcome.latency.as_millis()).unwrap_or(u64::MAX),
                "Request failed"
            );
        }

        stats.record(&outcome);

        payload_index = payload_index.wrapping_add(1);
        sent += 1;
    }

    info!(
        task_id = config.task_id,
        requests = sent,
        "Worker stopping after stop signal"
    );

    sent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_signal_starts_clear() {
        assert!(!StopSignal::new().is_triggered());
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let observer = signal.clone();
        signal.trigger();
        assert!(observer.is_triggered());
    }

    #[test]
    fn stop_signal_stays_triggered() {
        let signal = StopSignal::new();
        signal.trigger();
        signal.trigger();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn pre_triggered_worker_sends_nothing() {
        let stop = StopSignal::new();
        stop.trigger();
        let stats = Arc::new(RunStatistics::new());

        let config = WorkerConfig {
            task_id: 0,
            url: Arc::from("http://127.0.0.1:9/predict"),
            payloads: PayloadSequence::samples(),
        };

        let sent = run_worker(reqwest::Client::new(), config, stats.clone(), stop).await;
        assert_eq!(sent, 0);
        assert_eq!(stats.total_count(), 0);
    }
}
