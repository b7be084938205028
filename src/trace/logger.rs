use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::field::CandidateField;
use crate::trace::trace::DetectionTrace;

/// Appends one JSONL line per detected field. A file that cannot be opened
/// disables tracing instead of failing the run.
pub struct TraceLogger {
    file: Option<Mutex<File>>,
}

impl TraceLogger {
    pub fn new(path: &str) -> Self {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .inspect_err(|e| warn!(path, error = %e, "could not open trace file; tracing disabled"))
            .ok();
        Self {
            file: file.map(Mutex::new),
        }
    }

    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// One trace per field, written under a single lock so a detection pass
    /// never interleaves with another.
    pub fn log_fields(&self, url: &str, fields: &[CandidateField], mode: &'static str) {
        let Some(file) = &self.file else {
            return;
        };

        let mut batch = String::new();
        for field in fields {
            match serde_json::to_string(&DetectionTrace::from_field(url, field, mode)) {
                Ok(line) => {
                    batch.push_str(&line);
                    batch.push('\n');
                }
                Err(e) => warn!(selector = %field.selector, error = %e, "skipping unserializable trace"),
            }
        }

        let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
        match file.write_all(batch.as_bytes()) {
            Ok(()) => debug!(url, count = fields.len(), mode, "detection traces written"),
            Err(e) => warn!(error = %e, "failed to write detection traces"),
        }
    }
}
