use crate::error::SessionError;
use crate::events::SensorSample;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// Append-only event log: one JSON object per line, flushed per row so a
/// mid-session crash loses at most the last unflushed row.
pub struct EventLog {
    file: File,
}

impl EventLog {
    pub fn create(path: &Path) -> Result<Self, SessionError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SessionError::LogOpen {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(Self { file })
    }

    /// Write one event row: {pc_timestamp_ns, event_type, payload}
    pub fn append(&mut self, event_type: &str, payload: Value) -> Result<(), SessionError> {
        let timestamp_ns = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| Utc::now().timestamp_micros().saturating_mul(1_000));
        let row = json!({
            "pc_timestamp_ns": timestamp_ns,
            "event_type": event_type,
            "payload": payload,
        });

        let mut line = row.to_string();
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

/// Sensor log: CSV with a header row, flushed per record
pub struct SensorLog {
    writer: csv::Writer<File>,
    started: Instant,
}

impl SensorLog {
    pub fn create(path: &Path) -> Result<Self, SessionError> {
        let file = File::create(path).map_err(|e| SessionError::LogOpen {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(["timestamp", "elapsed_seconds", "gsr_value"])?;
        writer.flush().map_err(SessionError::LogWrite)?;
        Ok(Self {
            writer,
            started: Instant::now(),
        })
    }

    pub fn append(&mut self, sample: &SensorSample) -> Result<(), SessionError> {
        let timestamp: DateTime<Utc> = sample.timestamp.into();
        let elapsed = self.started.elapsed().as_secs_f64();
        self.writer.write_record([
            timestamp.to_rfc3339(),
            format!("{:.3}", elapsed),
            sample.raw_value.to_string(),
        ])?;
        self.writer.flush().map_err(SessionError::LogWrite)?;
        Ok(())
    }
}
