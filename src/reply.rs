//! Control channel replies
//!
//! A reply is one or more lines prefixed by a 3-digit status code. Multi-line
//! replies open with `ddd-text` and end with the first line that starts with
//! the same code followed by a space:
//!
//! ```text
//! 230-Welcome
//!  Disk quota: 10G
//! 230 Login successful.
//! ```

use crate::error::{FtpError, FtpResult};
use std::io::{self, BufRead};

/// One logical server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: i32,
    /// Message text without the code prefixes; lines joined with `\n`
    pub message: String,
}

impl Reply {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Reply {
            code,
            message: message.into(),
        }
    }

    /// Reports whether the code is one of `codes`
    pub fn is_any(&self, codes: &[i32]) -> bool {
        codes.contains(&self.code)
    }

    /// Turns the reply into an [`FtpError::UnexpectedStatus`]
    pub fn into_error(self) -> FtpError {
        FtpError::unexpected(self.code, self.message)
    }
}

/// Reads one complete reply from `reader`
///
/// # Errors
/// * `Transport` if the stream fails or closes before the reply is complete
/// * `BadReply` if a line does not start with a 3-digit code
pub fn read_reply<R: BufRead>(reader: &mut R) -> FtpResult<Reply> {
    let first = read_line(reader)?;
    let (code, separator, text) = split_code(&first)?;

    match separator {
        None | Some(' ') => return Ok(Reply::new(code, text)),
        Some('-') => {}
        Some(_) => return Err(FtpError::BadReply(first)),
    }

    let prefix = format!("{:03}", code);
    let mut lines = vec![text.to_string()];
    loop {
        let line = read_line(reader)?;
        match line.strip_prefix(prefix.as_str()) {
            Some("") => break,
            Some(rest) if rest.starts_with(' ') => {
                lines.push(rest[1..].to_string());
                break;
            }
            Some(rest) if rest.starts_with('-') => lines.push(rest[1..].to_string()),
            _ => lines.push(line),
        }
    }

    Ok(Reply::new(code, lines.join("\n")))
}

fn read_line<R: BufRead>(reader: &mut R) -> FtpResult<String> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Err(FtpError::Transport(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "control connection closed",
        )));
    }
    let line = String::from_utf8_lossy(&buf);
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn split_code(line: &str) -> FtpResult<(i32, Option<char>, &str)> {
    let digits = line.get(..3).filter(|d| d.bytes().all(|b| b.is_ascii_digit()));
    let code = match digits.and_then(|d| d.parse::<i32>().ok()) {
        Some(code) => code,
        None => return Err(FtpError::BadReply(line.to_string())),
    };
    let mut rest = line[3..].chars();
    let separator = rest.next();
    Ok((code, separator, rest.as_str()))
}
