//! Test utilities for pipeline testing
//!
//! Helpers to build uploads, run a coordinator and collect its messages.

use crate::app::models::PipelineOutcome;
use crate::app::services::pipeline::{PipelineCoordinator, PipelineHandle, PipelineMessage, UploadFile};
use crate::config::PipelineConfig;

// Test modules
mod coordinator_tests;

pub const SOLAR_HOURLY_HEADER: &str =
    "time,solar_power,dhi,dni,ghi,temperature,relative_humidity,solar_zenith_angle";

pub const WIND_WEEKLY_HEADER: &str = "week,wind_power,wind_speed,dew_point";

/// In-memory upload from CSV text
pub fn upload(text: &str) -> UploadFile {
    UploadFile::from_bytes("upload.csv", text.as_bytes().to_vec())
}

/// Run one file to completion
pub async fn run(config: PipelineConfig, text: &str) -> PipelineOutcome {
    PipelineCoordinator::new(config).run(Some(upload(text))).await
}

/// Failure reason of a run expected to fail
pub async fn failure(config: PipelineConfig, text: &str) -> String {
    let outcome = run(config, text).await;
    match outcome.reason() {
        Some(reason) => reason.to_string(),
        None => panic!("expected failure, got {outcome:?}"),
    }
}

/// Drain every message until the channel closes
pub async fn collect_messages(mut handle: PipelineHandle) -> Vec<PipelineMessage> {
    let mut messages = Vec::new();
    while let Some(message) = handle.recv().await {
        messages.push(message);
    }
    messages
}
