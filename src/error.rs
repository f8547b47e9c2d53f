//! Error taxonomy for control and data channel operations

use std::io;
use thiserror::Error;

/// Result alias used across the crate
pub type FtpResult<T> = Result<T, FtpError>;

#[derive(Error, Debug)]
pub enum FtpError {
    /// Socket read, write or dial failure
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// Reply text did not have the shape the operation needs
    /// (PASV/EPSV port group, quoted PWD path)
    #[error("invalid {0} response format")]
    Format(String),

    /// Control stream produced something that is not an FTP reply
    #[error("malformed reply: {0}")]
    BadReply(String),

    /// Final reply code other than the one the operation required
    #[error("{code} {message}")]
    UnexpectedStatus { code: i32, message: String },
}

impl FtpError {
    pub fn unexpected(code: i32, message: impl Into<String>) -> Self {
        FtpError::UnexpectedStatus {
            code,
            message: message.into(),
        }
    }

    /// Status code carried by an [`FtpError::UnexpectedStatus`]
    pub fn code(&self) -> Option<i32> {
        match self {
            FtpError::UnexpectedStatus { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Converts into an `io::Error` so the error can cross a `Read`/`Write`
    /// boundary. `From<io::Error>` recovers the original value.
    pub fn into_io(self) -> io::Error {
        match self {
            FtpError::Transport(err) => err,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

impl From<io::Error> for FtpError {
    fn from(err: io::Error) -> Self {
        let wrapped = err
            .get_ref()
            .is_some_and(|inner| inner.is::<FtpError>());
        if !wrapped {
            return FtpError::Transport(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<FtpError>()) {
            Some(Ok(inner)) => *inner,
            _ => FtpError::BadReply("wrapped protocol error was lost".to_string()),
        }
    }
}
