//! Process command implementation
//!
//! Runs one pipeline per input file, shows stage progress on a spinner and
//! hands each finished dataset to the output directory (or stdout). A file
//! the pipeline rejects, or one that cannot be read or written, is reported
//! with its reason and does not stop the remaining files. Only cancellation
//! ends the batch early.

use chrono::Utc;
use colored::Colorize;
use indicatif::HumanDuration;
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::models::PipelineOutcome;
use crate::app::services::dataset_export::{DatasetSink, DirectorySink, prepare_upload};
use crate::app::services::pipeline::{PipelineCoordinator, PipelineMessage, UploadFile};
use crate::cli::args::ProcessArgs;
use crate::cli::commands::shared::{
    ProcessingStats, create_spinner, load_configuration, setup_logging,
};
use crate::config::Config;
use crate::{Error, Result};

/// Run the process command
pub async fn run_process(
    args: ProcessArgs,
    cancellation_token: CancellationToken,
) -> Result<ProcessingStats> {
    setup_logging(args.get_log_level(), args.quiet);
    args.validate()?;

    let config = load_configuration(&args)?;
    let sink = DirectorySink::new(&config.output_dir);
    let start = Instant::now();
    let mut stats = ProcessingStats::default();

    info!(
        "Processing {} file(s) as {} data",
        args.files.len(),
        config.pipeline.domain
    );

    for path in &args.files {
        if cancellation_token.is_cancelled() {
            return Err(Error::processing_interrupted("Processing interrupted by user"));
        }

        let outcome = match run_file(path, &config, &args, &cancellation_token).await {
            Ok(outcome) => outcome,
            Err(error @ Error::ProcessingInterrupted { .. }) => return Err(error),
            Err(error) => {
                report_failure(path, &error.to_string());
                stats.files_failed += 1;
                continue;
            }
        };

        match outcome {
            PipelineOutcome::Complete { data, summary } => {
                let prepared =
                    prepare_upload(&data, summary.output_granularity, summary.domain, Utc::now());
                let upload = match prepared {
                    Ok(upload) => upload,
                    Err(error) => {
                        report_failure(path, &error.to_string());
                        stats.files_failed += 1;
                        continue;
                    }
                };

                if args.stdout {
                    println!("{}", upload.payload);
                } else {
                    let written = match sink.store(&upload).await {
                        Ok(written) => written,
                        Err(error) => {
                            report_failure(path, &error.to_string());
                            stats.files_failed += 1;
                            continue;
                        }
                    };
                    if !args.quiet {
                        println!(
                            "{} {} → {} ({} records)",
                            "✓".green().bold(),
                            path.display(),
                            written.display(),
                            summary.records_emitted
                        );
                    }
                    stats
                        .output_sizes
                        .push((upload.filename.clone(), upload.len() as u64));
                }

                stats.files_processed += 1;
                stats.rows_read += summary.rows_read;
                stats.records_written += summary.records_emitted;
            }
            PipelineOutcome::Failed { reason } => {
                report_failure(path, &reason);
                stats.files_failed += 1;
            }
        }
    }

    stats.processing_time = start.elapsed();
    if !args.quiet && !args.stdout {
        print_summary(&stats);
    }

    Ok(stats)
}

/// Run the pipeline for one file, aborting it if the user cancels
async fn run_file(
    path: &Path,
    config: &Config,
    args: &ProcessArgs,
    cancellation_token: &CancellationToken,
) -> Result<PipelineOutcome> {
    let file = UploadFile::open(path).await?;
    let handle = PipelineCoordinator::new(config.pipeline.clone()).spawn(Some(file));

    let spinner = args
        .show_progress()
        .then(|| create_spinner(&path.display().to_string()));

    let outcome = tokio::select! {
        outcome = handle.outcome_with(|message| {
            if let Some(spinner) = &spinner {
                match message {
                    PipelineMessage::Stage { stage } => spinner.set_message(stage.to_string()),
                    PipelineMessage::Chunk { data } => {
                        if let Some(row) = data.last() {
                            spinner.set_message(format!("tokenizing (line {})", row.line));
                        }
                    }
                    _ => {}
                }
            }
        }) => outcome,
        _ = cancellation_token.cancelled() => {
            debug!("Cancelling pipeline for {}", path.display());
            if let Some(spinner) = &spinner {
                spinner.abandon_with_message("cancelled");
            }
            return Err(Error::processing_interrupted("Processing interrupted by user"));
        }
    };

    if let Some(spinner) = &spinner {
        match &outcome {
            PipelineOutcome::Complete { .. } => spinner.finish_and_clear(),
            PipelineOutcome::Failed { .. } => spinner.abandon_with_message("failed"),
        }
    }

    Ok(outcome)
}

fn report_failure(path: &Path, reason: &str) {
    warn!("Skipping {}: {}", path.display(), reason);
    eprintln!("{} {}: {}", "✗".red().bold(), path.display(), reason);
}

/// Print the final processing report
fn print_summary(stats: &ProcessingStats) {
    let duration = HumanDuration(stats.processing_time);
    let total_size = ProcessingStats::format_size(stats.total_output_size());

    println!();
    println!("{}", "Processing summary".bold());
    println!("   • Files processed: {}", stats.files_processed);
    if stats.has_failures() {
        println!(
            "   • Files rejected: {}",
            stats.files_failed.to_string().red()
        );
    }
    println!("   • Rows read: {}", stats.rows_read);
    println!("   • Records written: {}", stats.records_written);
    println!("   • Total output size: {}", total_size);
    println!("   • Processing time: {}", duration);

    if !stats.output_sizes.is_empty() {
        println!("\n{}", "Output files:".bold());
        for (filename, size) in &stats.output_sizes {
            println!("   • {}: {}", filename, ProcessingStats::format_size(*size));
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn process_args(files: Vec<std::path::PathBuf>, output: &Path) -> ProcessArgs {
        ProcessArgs {
            files,
            domain: Some(crate::Domain::Wind),
            expect: None,
            aggregate_to: None,
            pass_through: false,
            output_path: Some(output.to_path_buf()),
            stdout: false,
            config_file: None,
            verbose: 0,
            quiet: true,
        }
    }

    #[tokio::test]
    async fn test_run_process_writes_datasets_and_counts_failures() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("good.csv");
        let bad = temp_dir.path().join("bad.csv");
        std::fs::write(
            &good,
            "week,wind_power,wind_speed,dew_point\n2024-W06,1,2,3\n2024-W06,2,4,5\n",
        )
        .unwrap();
        std::fs::write(&bad, "week,wind_power\n").unwrap();

        let output = temp_dir.path().join("out");
        let args = process_args(vec![good, bad], &output);
        let stats = run_process(args, CancellationToken::new()).await.unwrap();

        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.records_written, 1);

        let written: Vec<_> = std::fs::read_dir(&output)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(written.len(), 1);
        assert!(written[0].starts_with("weekly_wind_data_"));
        assert!(written[0].ends_with(".json"));
    }

    #[tokio::test]
    async fn test_unwritable_output_fails_each_file_and_continues() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("first.csv");
        let second = temp_dir.path().join("second.csv");
        for file in [&first, &second] {
            std::fs::write(file, "week,wind_power,wind_speed,dew_point\n2024-W06,1,2,3\n").unwrap();
        }

        let output = temp_dir.path().join("not_a_directory");
        std::fs::write(&output, "occupied").unwrap();

        let args = process_args(vec![first, second], &output);
        let stats = run_process(args, CancellationToken::new()).await.unwrap();

        assert_eq!(stats.files_processed, 0);
        assert_eq!(stats.files_failed, 2);
        assert!(stats.output_sizes.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_is_interrupted() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("wind.csv");
        std::fs::write(&file, "week,wind_power,wind_speed,dew_point\n2024-W06,1,2,3\n").unwrap();

        let token = CancellationToken::new();
        token.cancel();

        let args = process_args(vec![file], temp_dir.path());
        let err = run_process(args, token).await.unwrap_err();
        assert!(matches!(err, Error::ProcessingInterrupted { .. }));
    }
}
