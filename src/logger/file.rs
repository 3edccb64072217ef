/// Request audit log file writer
///
/// Appends one JSON line per audited request/message to `request.log`.
/// All writes are serialized through a single mutex so entries from
/// concurrent handlers never interleave.
use once_cell::sync::Lazy;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

use crate::logger::{self, LogTag};
use crate::models::LogEntry;

/// Audit log file path, relative to the working directory
const REQUEST_LOG_PATH: &str = "request.log";

/// Open file handle, None when the file could not be opened
static REQUEST_LOG: Lazy<Mutex<Option<File>>> = Lazy::new(|| Mutex::new(None));

/// Open the audit log file for appending
pub fn init_file_logging() {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(REQUEST_LOG_PATH);

    match file {
        Ok(f) => {
            if let Ok(mut guard) = REQUEST_LOG.lock() {
                *guard = Some(f);
            }
        }
        Err(e) => {
            logger::warning(
                LogTag::Logs,
                &format!("Failed to open {}: {}", REQUEST_LOG_PATH, e),
            );
        }
    }
}

/// Append one log entry as a JSON line
///
/// Failures are logged and swallowed; the audit file is best-effort and
/// must never take down a request.
pub fn append_request_log(entry: &LogEntry) {
    let line = match serde_json::to_string(entry) {
        Ok(json) => json,
        Err(e) => {
            logger::warning(LogTag::Logs, &format!("Failed to serialize log entry: {}", e));
            return;
        }
    };

    let mut guard = match REQUEST_LOG.lock() {
        Ok(g) => g,
        Err(_) => return,
    };

    if let Some(file) = guard.as_mut() {
        if let Err(e) = writeln!(file, "{}", line) {
            logger::warning(LogTag::Logs, &format!("Failed to write request log: {}", e));
        }
    }
}

/// Flush pending writes to disk
pub fn flush_file_logging() {
    if let Ok(mut guard) = REQUEST_LOG.lock() {
        if let Some(file) = guard.as_mut() {
            let _ = file.flush();
        }
    }
}
