//! Passive-mode FTP client library
//!
//! The crate opens a control connection, authenticates, and runs transfers
//! over passive-mode data connections whose end is reconciled with the
//! completion reply on the control connection.
//!
//! ```no_run
//! use pasvftp::Session;
//! use std::io::Read;
//! use std::time::Duration;
//!
//! # fn main() -> pasvftp::FtpResult<()> {
//! let mut session = Session::connect("ftp.example.com", Duration::from_secs(60))?;
//! session.login("anonymous", "guest")?;
//! for entry in session.list("/pub")? {
//!     println!("{}", entry.name);
//! }
//! let mut data = Vec::new();
//! session.retr("/pub/README")?.read_to_end(&mut data)?;
//! session.quit();
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod listing;
pub mod logging;
pub mod passive;
pub mod reply;
pub mod session;
pub mod status;
pub mod stream;

pub use config::{load_profile, Profile};
pub use error::{FtpError, FtpResult};
pub use events::{Event, EventSink, LogSink, NopSink};
pub use listing::{parse_line, Entry, EntryKind};
pub use logging::{log, log_with_thread, set_log_file};
pub use passive::PassiveMode;
pub use reply::Reply;
pub use session::{Session, SessionOptions};
pub use stream::TransferStream;

/// Name of the program, used in usage and version output
pub const PROGRAM_NAME: &str = "pasvftp";

/// Current version of the program (from Cargo.toml)
pub const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");
