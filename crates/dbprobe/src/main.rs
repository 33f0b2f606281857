//! dbprobe - verify that the PostgreSQL and Neo4j backends are reachable.
//!
//! Reads configuration from the environment, connects both probes, prints a
//! JSON readiness report to stdout and exits 0 only when every backend is
//! reachable.

use std::process::ExitCode;

use dbprobe_core::logging::{init_logging, log_dir, LogConfig};
use dbprobe_core::{HarnessConfig, ProbeRegistry, ReadinessReport};

#[tokio::main]
async fn main() -> ExitCode {
    let _logging_guard = init_logging(LogConfig::new(log_dir()));

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting dbprobe");

    let config = match HarnessConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("{e}");
            if let Some(hint) = e.hint() {
                eprintln!("hint: {hint}");
            }
            return ExitCode::FAILURE;
        }
    };

    let registry = ProbeRegistry::from_config(&config);
    for (name, result) in registry.connect_all().await {
        if let Err(e) = result {
            tracing::warn!(probe = %name, error = %e, "Probe failed to connect");
        }
    }

    let report = registry.check_all().await;
    registry.close_all().await;

    print_report(&report)
}

fn print_report(report: &ReadinessReport) -> ExitCode {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize readiness report");
            return ExitCode::FAILURE;
        }
    }

    if report.ready {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
