//! CLI entry point for the netsweep scanner.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use netsweep_core::{ErrorBody, ScanConfig, ScanMode};
use netsweep_engine::ScanCoordinator;

#[derive(Parser)]
#[command(name = "netsweep")]
#[command(about = "Scan an IPv4 range for an open port or for live hosts")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: netsweep).
    #[arg(short, long, default_value = "netsweep", global = true)]
    config: String,

    /// Pretty-print the JSON output.
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Command {
    /// TCP-connect one port on every address in the range.
    Scan {
        /// Range to scan (e.g., 192.168.1.1-192.168.1.254 or 10.0.1.0/24).
        #[arg(short, long)]
        range: String,

        /// Port to connect to.
        #[arg(short, long)]
        port: u16,
    },
    /// Check every address in the range for liveness.
    Ping {
        /// Range to scan (e.g., 192.168.1.1-192.168.1.254 or 10.0.1.0/24).
        #[arg(short, long)]
        range: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = ScanConfig::load(&cli.config)?;
    let coordinator = ScanCoordinator::from_config(config)?;

    let (range, port, mode) = match &cli.command {
        Command::Scan { range, port } => (range.as_str(), Some(*port), ScanMode::Port),
        Command::Ping { range } => (range.as_str(), None, ScanMode::Reachability),
    };

    match coordinator.run(range, port, mode).await {
        Ok(report) => {
            tracing::debug!(
                scan_id = %report.scan_id(),
                hosts = report.len(),
                positive = report.summary().positive,
                "Writing results"
            );
            println!("{}", report.to_json(cli.pretty)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!(target = %range, status = e.status_code(), error = %e, "Scan failed");
            println!("{}", serde_json::to_string(&ErrorBody::from(&e))?);
            Ok(if e.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
