//! Output formatting and persistence for telemetry samples.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::model::TelemetrySample;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One CSV row of the telemetry log. The breakdown map is flattened to a
/// JSON string so the row stays a flat record.
#[derive(Debug, Serialize)]
pub struct TelemetryRow {
    pub logged_at: DateTime<Utc>,
    pub feed_timestamp: String,
    pub vehicle_count: u32,
    pub fps: f64,
    pub device: String,
    pub breakdown: String,
}

impl TelemetryRow {
    pub fn from_sample(sample: &TelemetrySample) -> Self {
        Self {
            logged_at: Utc::now(),
            feed_timestamp: sample.timestamp.clone(),
            vehicle_count: sample.vehicle_count,
            fps: sample.fps,
            device: sample.device.clone(),
            breakdown: serde_json::to_string(&sample.breakdown).unwrap_or_default(),
        }
    }
}

/// Appends a telemetry sample as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_sample(path: &str, sample: &TelemetrySample) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(TelemetryRow::from_sample(sample))?;
    writer.flush()?;

    Ok(())
}
