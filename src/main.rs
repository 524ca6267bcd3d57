use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use prometheus::Registry;
use tracing::{error, info};

use predict_loadtest::client::{build_client, ClientConfig};
use predict_loadtest::config::{normalize_args, Cli, RunConfig};
use predict_loadtest::errors::LoadTestError;
use predict_loadtest::health::check_health;
use predict_loadtest::logging::init_logging;
use predict_loadtest::metrics::{gather_metrics_string, register_metrics, start_metrics_server};
use predict_loadtest::report::{render_header, render_health, render_results};
use predict_loadtest::scheduler::LoadTestRun;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    init_logging(cli.log_format);

    let result = match cli.into_run_config() {
        Ok(config) => run(config).await,
        Err(e) => Err(LoadTestError::from(e)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Load test aborted");
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(config: RunConfig) -> Result<(), LoadTestError> {
    print!("{}", render_header(&config));

    let registry = match config.metrics_port {
        Some(port) => {
            let registry = Registry::new();
            register_metrics(&registry)?;
            let registry = Arc::new(Mutex::new(registry));
            tokio::spawn(start_metrics_server(port, registry.clone()));
            Some(registry)
        }
        None => None,
    };

    let healthy = check_health(&config.health_url).await;
    print!("{}", render_health(healthy, &config.health_url));
    if !healthy {
        return Err(LoadTestError::HealthCheckFailed {
            url: config.health_url.clone(),
        });
    }

    let client = build_client(&ClientConfig::from(&config))?;

    println!("\nRunning load test...");
    println!(
        "Wait for {} seconds to finish the test...",
        config.duration.as_secs()
    );

    let mut load_test = LoadTestRun::new(config, client);
    let outcome = load_test.run().await?;

    if outcome.panicked_workers > 0 {
        error!(
            panicked = outcome.panicked_workers,
            "Some workers panicked; their in-flight requests were not recorded"
        );
    }
    info!(requests = outcome.requests_sent, "Load test finished");

    print!("{}", render_results(&outcome.report()));

    if let Some(registry) = registry {
        println!("\n--- FINAL METRICS ---\n{}", gather_metrics_string(&registry));
        println!("--- END OF FINAL METRICS ---");
    }

    Ok(())
}
