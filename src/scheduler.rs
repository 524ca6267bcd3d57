//! Worker pool lifecycle.
//!
//! A [`LoadTestRun`] moves through `Idle -> Running -> Draining -> Stopped`:
//!
//! - **Running**: `workers` tasks are spawned on the multi-threaded runtime,
//!   each looping over [`run_worker`] until told to stop.
//! - **Draining**: once `duration` has elapsed since the spawn, the shared
//!   [`StopSignal`] is triggered and every join handle is awaited. A worker
//!   busy with a slow request finishes it first, so a run can overrun by up
//!   to one client request timeout.
//! - **Stopped**: all workers have returned and dropped their handle on the
//!   statistics. The run takes sole ownership of them, so nothing can write
//!   after this point and the report can be computed without coordination.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::{RunConfig, MAX_DURATION};
use crate::errors::{ConfigError, LoadTestError};
use crate::stats::{RunStatistics, StatsReport};
use crate::worker::{run_worker, StopSignal, WorkerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Idle,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolState::Idle => "idle",
            PoolState::Running => "running",
            PoolState::Draining => "draining",
            PoolState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A finished run: final statistics plus the window they were collected in.
#[derive(Debug)]
pub struct RunOutcome {
    /// Owned exclusively by the outcome; no worker can still reach it.
    pub statistics: RunStatistics,

    /// Stamped immediately before the first worker was spawned.
    pub started_at: Instant,

    /// Stamped once, after every worker had exited.
    pub finished_at: Instant,

    /// Sum of the per-worker request counts.
    pub requests_sent: u64,

    /// Workers whose task panicked instead of returning.
    pub panicked_workers: usize,
}

impl RunOutcome {
    pub fn report(&self) -> StatsReport {
        self.statistics.snapshot(self.started_at, self.finished_at)
    }
}

/// Owns the worker pool for one load test.
pub struct LoadTestRun {
    config: RunConfig,
    client: reqwest::Client,
    state: PoolState,
}

impl LoadTestRun {
    pub fn new(config: RunConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            state: PoolState::Idle,
        }
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs the pool for the configured duration and returns once every
    /// worker has stopped.
    ///
    /// Can only be called once; a second call returns
    /// [`LoadTestError::AlreadyStarted`].
    pub async fn run(&mut self) -> Result<RunOutcome, LoadTestError> {
        if self.state != PoolState::Idle {
            return Err(LoadTestError::AlreadyStarted);
        }

        let started_at = Instant::now();
        let deadline = tokio::time::Instant::from_std(started_at)
            .checked_add(self.config.duration)
            .ok_or_else(|| ConfigError::TooLarge {
                field: "duration",
                value: format!("{}s", self.config.duration.as_secs()),
                max: format!("{}s", MAX_DURATION.as_secs()),
            })?;

        let stats = Arc::new(RunStatistics::new());
        let stop = StopSignal::new();
        let url: Arc<str> = Arc::from(self.config.target_url.as_str());

        let handles: Vec<JoinHandle<u64>> = (0..self.config.workers)
            .map(|task_id| {
                let worker_config = WorkerConfig {
                    task_id,
                    url: url.clone(),
                    payloads: self.config.payloads.clone(),
                };
                tokio::spawn(run_worker(
                    self.client.clone(),
                    worker_config,
                    stats.clone(),
                    stop.clone(),
                ))
            })
            .collect();
        self.transition(PoolState::Running);

        tokio::time::sleep_until(deadline).await;

        self.transition(PoolState::Draining);
        stop.trigger();

        let mut requests_sent = 0;
        let mut panicked_workers = 0;
        for (task_id, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(sent) => requests_sent += sent,
                Err(e) => {
                    error!(task_id = task_id, error = %e, "Worker task did not complete cleanly");
                    panicked_workers += 1;
                }
            }
        }

        let finished_at = Instant::now();

        let statistics = Arc::try_unwrap(stats).map_err(|shared| {
            LoadTestError::WorkersStillRunning {
                holders: Arc::strong_count(&shared) - 1,
            }
        })?;

        self.transition(PoolState::Stopped);
        info!(
            requests = requests_sent,
            elapsed_secs = finished_at.duration_since(started_at).as_secs_f64(),
            "All workers drained"
        );

        Ok(RunOutcome {
            statistics,
            started_at,
            finished_at,
            requests_sent,
            panicked_workers,
        })
    }

    fn transition(&mut self, next: PoolState) {
        info!(from = %self.state, to = %next, workers = self.config.workers, "Worker pool state change");
        self.state = next;
    }
}
