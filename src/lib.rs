//! Concurrent load tester for a JSON prediction endpoint.
//!
//! A fixed pool of workers POSTs sample payloads back to back for a set
//! duration. Each response is validated (HTTP 200 with `prediction` equal to
//! 0 or 1) and folded into shared [`stats::RunStatistics`], which are
//! summarized once every worker has drained.

pub mod client;
pub mod config;
pub mod errors;
pub mod executor;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod payload;
pub mod report;
pub mod scheduler;
pub mod stats;
pub mod utils;
pub mod worker;
