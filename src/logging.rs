//! Timestamped log writer behind [`LogSink`](crate::events::LogSink)
//!
//! Session events and CLI messages end up here as single lines of the form
//! `YYYY-MM-DD HH:MM:SS [T<id>] message`. Output goes to stdout until
//! [`set_log_file`] points it at a file, which is then appended to.

use chrono::Local;
use once_cell::sync::Lazy;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Destination of log lines, `None` for stdout
pub static LOG_FILE: Lazy<Mutex<Option<String>>> = Lazy::new(|| Mutex::new(None));

/// Writes `message` as one timestamped line
///
/// ```text
/// // log("Downloaded /pub/README to README (1024 bytes)")?;
/// ```
pub fn log(message: &str) -> io::Result<()> {
    log_with_thread(message, None)
}

/// Writes `message` tagged with `[T<id>]`, so lines from several sessions
/// driven side by side can be told apart
pub fn log_with_thread(message: &str, thread_id: Option<usize>) -> io::Result<()> {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let line = format_line(&timestamp, message, thread_id);

    // A panic while holding the lock leaves a usable path behind
    let destination = LOG_FILE.lock().unwrap_or_else(|e| e.into_inner());
    match destination.as_deref() {
        Some(path) => OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?
            .write_all(line.as_bytes()),
        None => io::stdout().lock().write_all(line.as_bytes()),
    }
}

fn format_line(timestamp: &str, message: &str, thread_id: Option<usize>) -> String {
    match thread_id {
        Some(tid) => format!("{} [T{}] {}\n", timestamp, tid, message),
        None => format!("{} {}\n", timestamp, message),
    }
}

/// Appends subsequent log lines to `path`
pub fn set_log_file<P: AsRef<Path>>(path: P) {
    let path = path.as_ref().to_string_lossy().into_owned();
    *LOG_FILE.lock().unwrap_or_else(|e| e.into_inner()) = Some(path);
}

/// Sends subsequent log lines back to stdout
pub fn clear_log_file() {
    *LOG_FILE.lock().unwrap_or_else(|e| e.into_inner()) = None;
}
