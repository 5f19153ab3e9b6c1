use anyhow::Context;
use clap::Parser;
use energy_ingest::cli::{args::Args, commands};
use std::process;
use tokio_util::sync::CancellationToken;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    match run(args) {
        Ok(stats) if stats.has_failures() => process::exit(1),
        Ok(_stats) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Run the selected command on a fresh runtime, stopping on CTRL+C
fn run(args: Args) -> anyhow::Result<commands::ProcessingStats> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

    runtime.block_on(async {
        let cancellation_token = CancellationToken::new();

        let shutdown_signal = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => cancellation_token.cancel(),
                // Without a handler there is nothing to wait for
                Err(_) => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = commands::run(args, cancellation_token.clone()) => {
                result.context("Command failed")
            }
            _ = shutdown_signal => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err::<commands::ProcessingStats, _>(
                    energy_ingest::Error::processing_interrupted("Processing interrupted by user"),
                )
                .context("Command cancelled")
            }
        }
    })
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("energy-ingest - Solar and wind telemetry CSV ingestion");
    println!("======================================================");
    println!();
    println!("Validate hourly, daily or weekly telemetry CSV files and convert");
    println!("them into normalized JSON datasets for forecast configuration.");
    println!();
    println!("USAGE:");
    println!("    energy-ingest <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    process     Validate and aggregate CSV files into JSON datasets");
    println!("    schema      Show the required columns of every domain schema");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("EXAMPLES:");
    println!("    # Aggregate a weekly wind export:");
    println!("    energy-ingest process wind_weekly.csv --domain wind");
    println!();
    println!("    # Roll hourly solar data up to days and print the dataset:");
    println!("    energy-ingest process solar.csv --domain solar --aggregate-to daily --stdout");
    println!();
    println!("    # List the combined schemas as JSON:");
    println!("    energy-ingest schema --domain combined --format json");
    println!();
    println!("For detailed help on any command, use:");
    println!("    energy-ingest <COMMAND> --help");
}
