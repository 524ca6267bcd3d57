//! Human-readable run summary.

use std::fmt::Write;
use std::time::Duration;

use crate::config::RunConfig;
use crate::stats::{ErrorSample, StatsReport};
use crate::utils::truncate_chars;

/// Error details are grouped by this many leading characters.
pub const ERROR_SUMMARY_WIDTH: usize = 50;

const RULE_WIDTH: usize = 60;

/// Echo of the run configuration printed before the health check.
pub fn render_header(config: &RunConfig) -> String {
    let mut out = String::new();
    out.push_str("Starting load test...\n");
    let _ = writeln!(out, "{}", config);
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
    out
}

/// Health check result line, with remediation when it failed.
pub fn render_health(passed: bool, health_url: &str) -> String {
    if passed {
        "✓ API health check passed\n".to_string()
    } else {
        format!(
            "❌ Error connecting to API: health check at {} did not return HTTP 200\n\
             Make sure the API is running: uvicorn api.app:app --host 0.0.0.0 --port 8000\n",
            health_url
        )
    }
}

/// Final statistics block.
pub fn render_results(report: &StatsReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);

    let _ = writeln!(out, "\n{}", rule);
    out.push_str("LOAD TEST RESULTS\n");
    let _ = writeln!(out, "{}", rule);

    out.push_str("\n📊 Overall Statistics:\n");
    let _ = writeln!(out, "  Total Requests:        {}", report.total_requests);
    let _ = writeln!(out, "  Successful Requests:   {}", report.successful_requests);
    let _ = writeln!(out, "  Failed Requests:       {}", report.failed_requests);
    let _ = writeln!(
        out,
        "  Success Rate:          {:.2}%",
        report.success_rate * 100.0
    );
    let _ = writeln!(
        out,
        "  Test Duration:         {:.2} seconds",
        report.duration.as_secs_f64()
    );

    out.push_str("\n⚡ Performance Metrics:\n");
    let _ = writeln!(
        out,
        "  Requests Per Second (RPS):     {:.2}",
        report.requests_per_second
    );
    let _ = writeln!(
        out,
        "  Successful RPS:                {:.2}",
        report.successful_rps
    );

    if report.successful_requests > 0 {
        let latency = &report.latency;
        out.push_str("\n⏱️  Response Time Statistics:\n");
        let _ = writeln!(out, "  Average Response Time:      {:.2} ms", millis(latency.average));
        // Middle element of the sorted samples, not an interpolated percentile.
        let _ = writeln!(out, "  Median Response Time:       {:.2} ms", millis(latency.median));
        let _ = writeln!(out, "  Min Response Time:          {:.2} ms", millis(latency.min));
        let _ = writeln!(out, "  Max Response Time:          {:.2} ms", millis(latency.max));
        if report.successful_requests > 1 {
            let _ = writeln!(out, "  Std Dev Response Time:      {:.2} ms", millis(latency.std_dev));
        }
    }

    let summary = summarize_errors(&report.errors);
    if !summary.is_empty() {
        let _ = writeln!(
            out,
            "\n❌ Error Summary (first {} distinct):",
            crate::stats::MAX_ERROR_SAMPLES
        );
        for (detail, count) in &summary {
            let _ = writeln!(out, "  {}: {}", detail, count);
        }
    }

    let _ = writeln!(out, "\n{}", rule);
    let _ = writeln!(
        out,
        "✅ The API can handle approximately {:.2} requests per second",
        report.successful_rps
    );
    let _ = writeln!(out, "{}", rule);
    out
}

/// Groups error samples by their first [`ERROR_SUMMARY_WIDTH`] characters,
/// summing counts and keeping first-seen order.
pub fn summarize_errors(samples: &[ErrorSample]) -> Vec<(String, u64)> {
    let mut grouped: Vec<(String, u64)> = Vec::new();
    for sample in samples {
        let key = truncate_chars(&sample.detail, ERROR_SUMMARY_WIDTH);
        match grouped.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, count)) => *count += sample.count,
            None => grouped.push((key.to_string(), sample.count)),
        }
    }
    grouped
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::LatencyStats;

    fn sample(detail: &str, count: u64) -> ErrorSample {
        ErrorSample {
            detail: detail.to_string(),
            count,
        }
    }

    fn report_with(successes: u64, failures: u64, errors: Vec<ErrorSample>) -> StatsReport {
        let total = successes + failures;
        StatsReport {
            total_requests: total,
            successful_requests: successes,
            failed_requests: failures,
            duration: Duration::from_secs(10),
            success_rate: if total > 0 {
                successes as f64 / total as f64
            } else {
                0.0
            },
            requests_per_second: total as f64 / 10.0,
            successful_rps: successes as f64 / 10.0,
            latency: LatencyStats {
                average: Duration::from_micros(12_500),
                median: Duration::from_millis(12),
                min: Duration::from_millis(3),
                max: Duration::from_millis(40),
                std_dev: Duration::from_millis(2),
            },
            errors,
        }
    }

    #[test]
    fn groups_details_sharing_a_prefix() {
        let prefix = "x".repeat(ERROR_SUMMARY_WIDTH);
        let samples = vec![
            sample(&format!("{}-first", prefix), 2),
            sample("HTTP 500: internal error", 1),
            sample(&format!("{}-second", prefix), 3),
        ];

        let summary = summarize_errors(&samples);
        assert_eq!(
            summary,
            vec![(prefix, 5), ("HTTP 500: internal error".to_string(), 1)]
        );
    }

    #[test]
    fn renders_counts_rates_and_latency() {
        let text = render_results(&report_with(750, 250, Vec::new()));

        assert!(text.contains("Total Requests:        1000"));
        assert!(text.contains("Success Rate:          75.00%"));
        assert!(text.contains("Requests Per Second (RPS):     100.00"));
        assert!(text.contains("Successful RPS:                75.00"));
        assert!(text.contains("Average Response Time:      12.50 ms"));
        assert!(text.contains("Median Response Time:       12.00 ms"));
        assert!(text.contains("approximately 75.00 requests per second"));
        assert!(!text.contains("Error Summary"));
    }

    #[test]
    fn omits_latency_block_without_successes() {
        let text = render_results(&report_with(
            0,
            4,
            vec![sample("HTTP 500: internal error", 4)],
        ));

        assert!(!text.contains("Response Time Statistics"));
        assert!(text.contains("Success Rate:          0.00%"));
        assert!(text.contains("  HTTP 500: internal error: 4"));
    }

    #[test]
    fn health_failure_includes_remediation() {
        let text = render_health(false, "http://localhost:8000/health");
        assert!(text.contains("http://localhost:8000/health"));
        assert!(text.contains("Make sure the API is running"));
        assert!(render_health(true, "unused").contains("passed"));
    }

    #[test]
    fn header_echoes_configuration() {
        let config = RunConfig::new(
            "http://localhost:8000/predict",
            10,
            Duration::from_secs(60),
        )
        .unwrap();
        let text = render_header(&config);
        assert!(text.starts_with("Starting load test..."));
        assert!(text.contains("Number of concurrent workers: 10"));
    }
}
