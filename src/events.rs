//! Observability hook
//!
//! A [`Session`](crate::session::Session) reports what it does to an
//! [`EventSink`] supplied at construction. The crate ships [`LogSink`], which
//! writes through the timestamped logger in [`crate::logging`], and
//! [`NopSink`], which drops everything.

use crate::logging::log_with_thread;
use std::fmt;
use std::net::SocketAddr;

/// Something that happened on a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An operation started
    Enter(&'static str),
    /// An operation returned
    Leave(&'static str),
    /// A command line was written to the control channel (secrets masked)
    Command(String),
    /// A reply was read from the control channel
    Reply { code: i32, message: String },
    /// A data connection was dialed
    DataConnection(SocketAddr),
    /// A transfer stream reached end-of-stream and was confirmed
    TransferComplete { bytes: u64 },
    /// Something failed but the operation carried on
    Warning(String),
    /// An operation failed
    Failure {
        operation: &'static str,
        error: String,
    },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Enter(op) => write!(f, "Entered {}", op),
            Event::Leave(op) => write!(f, "Leaving {}", op),
            Event::Command(line) => write!(f, "CC OUT: {}", line),
            Event::Reply { code, message } => write!(f, "CC IN: {} {}", code, message),
            Event::DataConnection(addr) => write!(f, "data connection opened to {}", addr),
            Event::TransferComplete { bytes } => write!(f, "transfer complete, {} bytes", bytes),
            Event::Warning(msg) => write!(f, "warning: {}", msg),
            Event::Failure { operation, error } => write!(f, "{} failed: {}", operation, error),
        }
    }
}

/// Receiver of session events
///
/// `realm` is the part after `@` of the login identifier, empty before login
/// or when the identifier has none. It is carried for log correlation only.
pub trait EventSink: Send + Sync {
    fn record(&self, realm: &str, event: &Event);
}

/// Discards all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NopSink;

impl EventSink for NopSink {
    fn record(&self, _realm: &str, _event: &Event) {}
}

/// Writes events to the process log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink {
    thread_id: Option<usize>,
    verbose: bool,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags every line with `[T<id>]`
    pub fn with_thread(mut self, thread_id: usize) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    /// Also log control-channel traffic, which is skipped by default
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl EventSink for LogSink {
    fn record(&self, realm: &str, event: &Event) {
        if !self.verbose && matches!(event, Event::Command(_) | Event::Reply { .. }) {
            return;
        }
        let message = if realm.is_empty() {
            event.to_string()
        } else {
            format!("{} {}", realm, event)
        };
        // Logging must never break a transfer
        let _ = log_with_thread(&message, self.thread_id);
    }
}
