//! End-to-end tests for the pipeline coordinator

use super::*;
use crate::app::models::{Domain, Granularity, PipelineMode, PipelineStage, Timestamp};
use crate::app::services::dataset_export::to_json;
use crate::app::services::pipeline::TERMINATED_REASON;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

fn solar_hourly_csv(rows: &[&str]) -> String {
    let mut text = format!("{}\n", SOLAR_HOURLY_HEADER);
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

/// Reader that always fails
struct FailingReader;

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::Error::other("connection reset")))
    }
}

/// Reader that panics on first use
struct PanickingReader;

impl AsyncRead for PanickingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        panic!("reader exploded")
    }
}

#[tokio::test]
async fn test_no_file_provided() {
    let outcome = PipelineCoordinator::new(PipelineConfig::default())
        .run(None)
        .await;
    assert_eq!(outcome.reason(), Some("No file provided"));
}

#[tokio::test]
async fn test_empty_and_header_only_files() {
    for text in ["", "\n\n", "time,solar_power\n", "time,solar_power\n\n   \n"] {
        let reason = failure(PipelineConfig::default(), text).await;
        assert!(
            reason.starts_with("No data found in CSV file"),
            "{text:?}: {reason}"
        );
    }
}

#[tokio::test]
async fn test_two_rows_in_one_hour_become_one_record() {
    let text = solar_hourly_csv(&[
        "2024-02-05T14:00:00,1.0,10,20,30,5,80,60",
        "2024-02-05T14:00:00,2.0,10,20,30,7,82,62",
    ]);

    let outcome = run(PipelineConfig::new(Domain::Solar), &text).await;
    let records = outcome.records().unwrap();
    assert_eq!(records.len(), 1);

    assert_eq!(
        records[0].timestamp(),
        &Timestamp::Time("2024-02-05T14:00:00".to_string())
    );
    let solar = records[0].solar().unwrap();
    assert_eq!(solar.solar_power, 3.0);
    assert_eq!(solar.dhi, 20.0);
    assert_eq!(solar.temperature, Some(6.0));
}

#[tokio::test]
async fn test_hourly_periods_are_distinct_hours() {
    let text = solar_hourly_csv(&[
        "2024-02-05T14:00:00,1,0,0,0,1,1,1",
        "2024-02-05T15:00:00,1,0,0,0,1,1,1",
        "2024-02-05T14:00:00,1,0,0,0,1,1,1",
        "2024-02-06T14:00:00,1,0,0,0,1,1,1",
    ]);

    let outcome = run(PipelineConfig::new(Domain::Solar), &text).await;
    let times: Vec<&str> = outcome
        .records()
        .unwrap()
        .iter()
        .map(|record| record.timestamp().value())
        .collect();

    assert_eq!(
        times,
        vec![
            "2024-02-05T14:00:00",
            "2024-02-05T15:00:00",
            "2024-02-06T14:00:00"
        ]
    );
    assert!(times.iter().all(|time| time.ends_with(":00:00")));
}

#[tokio::test]
async fn test_missing_column_is_reported() {
    let text = "time,solar_power,dni,ghi,temperature,relative_humidity,solar_zenith_angle\n\
                2024-02-05T14:00:00,1,2,3,4,5,6\n";
    let reason = failure(PipelineConfig::new(Domain::Solar), text).await;
    assert_eq!(reason, "Missing required columns: dhi");
}

#[tokio::test]
async fn test_unpadded_date_is_rejected() {
    let text = "date,wind_power,wind_speed,dew_point\n\
                2024-02-04,1,2,3\n\
                2024-2-5,1,2,3\n";
    let reason = failure(PipelineConfig::new(Domain::Wind), text).await;
    assert_eq!(
        reason,
        "Invalid timestamp on line 3: '2024-2-5'. Expected a value like 2024-02-05"
    );
}

#[tokio::test]
async fn test_two_time_columns_are_ambiguous() {
    let text = "date,week,wind_power,wind_speed,dew_point\n\
                2024-02-05,2024-W06,1,2,3\n";
    let reason = failure(PipelineConfig::new(Domain::Wind), text).await;
    assert!(
        reason.starts_with("CSV must contain exactly one time-related column"),
        "{reason}"
    );
}

#[tokio::test]
async fn test_repeated_time_column_is_ambiguous() {
    let text = "Time,time,wind_power,wind_speed,dew_point\n\
                2024-02-05T14:00:00,garbage,1,2,3\n";
    let reason = failure(PipelineConfig::new(Domain::Wind), text).await;
    assert!(
        reason.starts_with("CSV must contain exactly one time-related column"),
        "{reason}"
    );
}

#[tokio::test]
async fn test_aliases_of_one_column_are_rejected() {
    let text = "time,solar_power,dhi,dni,ghi,temp,temperature,relative_humidity,solar_zenith_angle\n\
                2024-02-05T14:00:00,1,2,3,4,5,6,7,8\n";
    let reason = failure(PipelineConfig::new(Domain::Solar), text).await;
    assert_eq!(reason, "Duplicate columns in header: temperature");
}

#[tokio::test]
async fn test_weekly_mean_ignores_missing_dew_point() {
    let text = format!(
        "{}\n2024-W06,1,3,2.0\n2024-W06,2,3,\n2024-W06,3,3,5.0\n",
        WIND_WEEKLY_HEADER
    );

    let outcome = run(PipelineConfig::new(Domain::Wind), &text).await;
    let records = outcome.records().unwrap();
    assert_eq!(records.len(), 1);

    let wind = records[0].wind().unwrap();
    assert_eq!(wind.dew_point, Some(3.5));
    assert_eq!(wind.wind_power, 6.0);
    assert_eq!(wind.wind_speed, Some(3.0));
}

#[tokio::test]
async fn test_expected_granularity_mismatch() {
    let text = format!("{}\n2024-W06,1,2,3\n", WIND_WEEKLY_HEADER);
    let config = PipelineConfig::new(Domain::Wind).with_expected_granularity(Granularity::Daily);

    let reason = failure(config, &text).await;
    assert_eq!(reason, "Expected daily data but the file contains weekly timestamps");
}

#[tokio::test]
async fn test_roll_up_to_daily() {
    let text = solar_hourly_csv(&[
        "2024-02-05T22:00:00,1,0,0,0,10,1,1",
        "2024-02-05T23:00:00,2,0,0,0,20,1,1",
        "2024-02-06T00:00:00,4,0,0,0,30,1,1",
    ]);
    let config = PipelineConfig::new(Domain::Solar).with_target_granularity(Granularity::Daily);

    let outcome = run(config, &text).await;
    let PipelineOutcome::Complete { data, summary } = outcome else {
        panic!("expected completion");
    };

    assert_eq!(summary.detected_granularity, Granularity::Hourly);
    assert_eq!(summary.output_granularity, Granularity::Daily);
    assert_eq!(data.len(), 2);
    assert_eq!(data[0].timestamp(), &Timestamp::Date("2024-02-05".to_string()));
    assert_eq!(data[0].solar().unwrap().solar_power, 3.0);
    assert_eq!(data[0].solar().unwrap().temperature, Some(15.0));
}

#[tokio::test]
async fn test_finer_target_fails() {
    let text = format!("{}\n2024-W06,1,2,3\n", WIND_WEEKLY_HEADER);
    let config = PipelineConfig::new(Domain::Wind).with_target_granularity(Granularity::Hourly);

    let reason = failure(config, &text).await;
    assert_eq!(reason, "Cannot aggregate weekly data into finer hourly periods");
}

#[tokio::test]
async fn test_pass_through_combined() {
    let text = "Date,Solar_Power,DHI,DNI,GHI,Temperature,Relative Humidity,Solar Zenith Angle,Wind_Power,Wind Speed,Dew Point\n\
                2024-02-05,1,2,3,4,5,6,7,8,9,10\n\
                2024-02-05,1,2,3,4,,6,7,x,9,10\n";
    let config = PipelineConfig::new(Domain::Combined).with_pass_through();

    let outcome = run(config, text).await;
    let PipelineOutcome::Complete { data, summary } = outcome else {
        panic!("expected completion");
    };

    assert_eq!(summary.mode, PipelineMode::PassThrough);
    assert_eq!(data.len(), 2);
    assert_eq!(data[1].solar().unwrap().temperature, None);
    assert_eq!(data[1].wind().unwrap().wind_power, 0.0);
    assert_eq!(data[0].wind().unwrap().dew_point, Some(10.0));
}

#[tokio::test]
async fn test_header_aliases_need_normalization() {
    let text = "time,solar_power,DHI,DNI,GHI,Temperature,Relative Humidity,Solar Zenith Angle\n\
                2024-02-05T14:00:00,1,2,3,4,5,6,7\n";

    let outcome = run(PipelineConfig::new(Domain::Solar), text).await;
    assert!(outcome.is_complete());

    let config = PipelineConfig::new(Domain::Solar).without_header_normalization();
    let reason = failure(config, text).await;
    assert!(reason.starts_with("Missing required columns: dhi, dni, ghi"), "{reason}");
}

#[tokio::test]
async fn test_shape_mismatch_rows_are_skipped() {
    let text = format!(
        "{}\n2024-W06,1,2,3\n2024-W06,1,2\n2024-W06,1,2,3,4\n2024-W06,1,2,3\n",
        WIND_WEEKLY_HEADER
    );

    let outcome = run(PipelineConfig::new(Domain::Wind), &text).await;
    let PipelineOutcome::Complete { data, summary } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.rows_skipped_shape, 2);
    assert_eq!(data[0].wind().unwrap().wind_power, 2.0);
}

#[tokio::test]
async fn test_message_sequence() {
    let text = format!("{}\n2024-W06,1,2,3\n", WIND_WEEKLY_HEADER);
    let handle = PipelineCoordinator::new(PipelineConfig::new(Domain::Wind)).spawn(Some(upload(&text)));

    let messages = collect_messages(handle).await;
    let stages: Vec<PipelineStage> = messages
        .iter()
        .filter_map(|message| match message {
            PipelineMessage::Stage { stage } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            PipelineStage::Tokenizing,
            PipelineStage::Validating,
            PipelineStage::Aggregating
        ]
    );

    let terminals = messages.iter().filter(|message| message.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert!(matches!(messages.last(), Some(PipelineMessage::Complete { .. })));
}

#[tokio::test]
async fn test_failure_sends_no_data() {
    let handle = PipelineCoordinator::new(PipelineConfig::default()).spawn(Some(upload("")));
    let messages = collect_messages(handle).await;

    assert!(messages
        .iter()
        .all(|message| !matches!(message, PipelineMessage::Complete { .. })));
    assert!(matches!(messages.last(), Some(PipelineMessage::Error { .. })));
}

#[tokio::test]
async fn test_preview_chunks_every_interval() {
    let mut text = format!("{}\n", WIND_WEEKLY_HEADER);
    for _ in 0..25 {
        text.push_str("2024-W06,1,2,3\n");
    }
    let config = PipelineConfig::new(Domain::Wind)
        .with_chunk_size(16)
        .with_preview(10, 3);

    let mut previews = Vec::new();
    let outcome = PipelineCoordinator::new(config)
        .spawn(Some(upload(&text)))
        .outcome_with(|message| {
            if let PipelineMessage::Chunk { data } = message {
                previews.push(data.len());
            }
        })
        .await;

    assert!(outcome.is_complete());
    assert_eq!(previews, vec![3, 3]);
}

fn wind_weekly_csv(rows: usize) -> String {
    let mut text = format!("{}\n", WIND_WEEKLY_HEADER);
    for index in 0..rows {
        text.push_str(&format!("2024-W{:02},{},2,{}\n", index % 20 + 1, index % 7, index % 5));
    }
    text
}

#[tokio::test]
async fn test_batch_size_does_not_change_result() {
    let text = wind_weekly_csv(1200);

    let batched = run(PipelineConfig::new(Domain::Wind).with_batch_rows(64), &text).await;
    let whole = run(PipelineConfig::new(Domain::Wind), &text).await;

    let PipelineOutcome::Complete { data, summary } = batched else {
        panic!("expected completion");
    };
    assert_eq!(summary.rows_read, 1200);
    assert_eq!(data.len(), 20);
    assert_eq!(to_json(&data).unwrap(), to_json(whole.records().unwrap()).unwrap());
}

#[tokio::test]
async fn test_bad_row_in_later_batch_reports_its_line() {
    let mut text = wind_weekly_csv(1200);
    text.push_str("W7,1,2,3\n");

    let reason = failure(PipelineConfig::new(Domain::Wind).with_batch_rows(64), &text).await;
    assert!(
        reason.starts_with("Invalid timestamp on line 1202: 'W7'"),
        "{reason}"
    );
}

#[tokio::test]
async fn test_previews_span_batch_boundaries() {
    let config = PipelineConfig::new(Domain::Wind)
        .with_chunk_size(64)
        .with_batch_rows(7)
        .with_preview(10, 5);

    let mut previews: Vec<Vec<usize>> = Vec::new();
    let outcome = PipelineCoordinator::new(config)
        .spawn(Some(upload(&wind_weekly_csv(50))))
        .outcome_with(|message| {
            if let PipelineMessage::Chunk { data } = message {
                previews.push(data.iter().map(|row| row.line).collect());
            }
        })
        .await;

    assert!(outcome.is_complete());
    assert_eq!(previews.len(), 5);
    for lines in &previews {
        assert_eq!(lines.len(), 5, "{lines:?}");
        assert!(lines.windows(2).all(|pair| pair[1] == pair[0] + 1), "{lines:?}");
    }
}

#[tokio::test]
async fn test_identical_input_gives_identical_payload() {
    let text = solar_hourly_csv(&[
        "2024-02-05T14:00:00,1.5,1,2,3,4,,6",
        "2024-02-05T15:00:00,abc,1,2,3,4,5,6",
    ]);

    let first = run(PipelineConfig::new(Domain::Solar), &text).await;
    let second = run(PipelineConfig::new(Domain::Solar), &text).await;

    let first = to_json(first.records().unwrap()).unwrap();
    let second = to_json(second.records().unwrap()).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_read_failure_is_reported() {
    let file = UploadFile::from_reader("broken.csv", FailingReader);
    let outcome = PipelineCoordinator::new(PipelineConfig::default())
        .run(Some(file))
        .await;
    assert!(outcome.reason().unwrap().starts_with("I/O error"));
}

#[tokio::test]
async fn test_panic_becomes_generic_failure() {
    let file = UploadFile::from_reader("panics.csv", PanickingReader);
    let outcome = PipelineCoordinator::new(PipelineConfig::default())
        .run(Some(file))
        .await;

    let reason = outcome.reason().unwrap();
    assert!(reason.starts_with("Internal pipeline error"), "{reason}");
    assert!(!reason.contains("exploded"));
}

#[tokio::test]
async fn test_abort_stops_run_without_terminal() {
    let (reader, _writer) = tokio::io::duplex(64);
    let file = UploadFile::from_reader("stalled.csv", reader);
    let handle = PipelineCoordinator::new(PipelineConfig::default()).spawn(Some(file));

    handle.abort();
    let outcome = handle.outcome().await;
    assert_eq!(outcome.reason(), Some(TERMINATED_REASON));
}
