//! Transfer stream: a data connection tied to its control-channel completion
//!
//! The stream exclusively owns the data socket. It borrows the control
//! channel only to read the reply that confirms the transfer once the data
//! connection reaches end-of-stream, so the borrow checker keeps the session
//! from issuing another command while a transfer is in flight.

use crate::control::{require, ControlChannel};
use crate::error::{FtpError, FtpResult};
use crate::events::Event;
use crate::status;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// Read deadlines shorter than this are ignored
pub const MIN_READ_DEADLINE: Duration = Duration::from_secs(59);

/// Codes accepted as confirmation when the data connection hits end-of-stream
const END_OF_STREAM_CODES: [i32; 3] = [
    status::PASSIVE_MODE,
    status::CLOSING_DATA_CONNECTION,
    status::ABOUT_TO_SEND,
];

/// Returns the idle-read deadline to apply, if any
pub fn effective_deadline(enabled: bool, timeout: Duration) -> Option<Duration> {
    if enabled && timeout >= MIN_READ_DEADLINE {
        Some(timeout)
    } else {
        None
    }
}

pub struct TransferStream<'a, S: Read + Write> {
    conn: TcpStream,
    control: &'a mut ControlChannel<S>,
    read_deadline: Option<Duration>,
    confirmed: bool,
    bytes: u64,
}

impl<'a, S: Read + Write> TransferStream<'a, S> {
    pub(crate) fn new(
        conn: TcpStream,
        control: &'a mut ControlChannel<S>,
        read_deadline: Option<Duration>,
    ) -> Self {
        TransferStream {
            conn,
            control,
            read_deadline,
            confirmed: false,
            bytes: 0,
        }
    }

    /// Bytes read so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Whether end-of-stream was reached and the completion reply consumed
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn read_deadline(&self) -> Option<Duration> {
        self.read_deadline
    }

    /// Closes the data connection without reading the completion reply.
    ///
    /// If end-of-stream was not reached the control channel still holds
    /// that reply; use [`finish`](Self::finish) to keep it in sync.
    pub fn close(self) {
        let _ = self.conn.shutdown(Shutdown::Both);
    }

    /// Closes the data connection and makes sure the completion reply has
    /// been consumed, reading it now if end-of-stream did not already.
    ///
    /// The reply is judged with the same codes as at end-of-stream.
    pub fn finish(self) -> FtpResult<()> {
        let _ = self.conn.shutdown(Shutdown::Both);
        if self.confirmed {
            return Ok(());
        }
        let reply = self.control.read_reply()?;
        require(reply, &END_OF_STREAM_CODES)?;
        self.control.notify(Event::TransferComplete { bytes: self.bytes });
        Ok(())
    }

    fn confirm(&mut self) -> FtpResult<()> {
        self.confirmed = true;
        let reply = self.control.read_reply()?;
        require(reply, &END_OF_STREAM_CODES)?;
        self.control.notify(Event::TransferComplete { bytes: self.bytes });
        Ok(())
    }
}

impl<S: Read + Write> Read for TransferStream<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.confirmed {
            return Ok(0);
        }
        if let Some(deadline) = self.read_deadline {
            self.conn.set_read_timeout(Some(deadline))?;
        }
        match self.conn.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.confirm().map_err(FtpError::into_io)?;
                Ok(0)
            }
            Ok(n) => {
                self.bytes += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.control.notify(Event::Failure {
                    operation: "data read",
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::tests::channel;
    use std::net::TcpListener;
    use std::thread;

    /// Data connection whose peer sends `payload` then closes
    fn data_conn(payload: &'static [u8]) -> TcpStream {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut peer, _) = listener.accept().unwrap();
            let _ = peer.write_all(payload);
        });
        TcpStream::connect(addr).unwrap()
    }

    #[test]
    fn test_effective_deadline() {
        assert_eq!(effective_deadline(false, Duration::from_secs(120)), None);
        assert_eq!(effective_deadline(true, Duration::from_secs(30)), None);
        assert_eq!(
            effective_deadline(true, Duration::from_secs(59)),
            Some(Duration::from_secs(59))
        );
    }

    #[test]
    fn test_end_of_stream_consumes_completion_reply() {
        let mut cc = channel("226 Transfer complete\r\n200 next\r\n");
        let mut stream = TransferStream::new(data_conn(b"hello"), &mut cc, None);
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
        assert!(stream.is_confirmed());
        assert_eq!(stream.bytes_read(), 5);
        // Reading past the end does not touch the control channel again
        assert_eq!(stream.read(&mut [0u8; 8]).unwrap(), 0);
        stream.finish().unwrap();
        assert_eq!(cc.read_reply().unwrap().code, 200);
    }

    #[test]
    fn test_end_of_stream_with_error_reply() {
        let mut cc = channel("500 Something went wrong\r\n");
        let mut stream = TransferStream::new(data_conn(b"partial"), &mut cc, None);
        let mut out = Vec::new();
        let err = FtpError::from(stream.read_to_end(&mut out).unwrap_err());
        assert_eq!(err.code(), Some(500));
    }

    #[test]
    fn test_end_of_stream_without_reply() {
        let mut cc = channel("");
        let mut stream = TransferStream::new(data_conn(b""), &mut cc, None);
        let err = FtpError::from(stream.read(&mut [0u8; 16]).unwrap_err());
        assert!(matches!(err, FtpError::Transport(_)));
    }

    #[test]
    fn test_finish_reads_pending_reply() {
        let mut cc = channel("226 Closing data connection\r\n");
        let stream = TransferStream::new(data_conn(b"unread"), &mut cc, None);
        stream.finish().unwrap();
        assert_eq!(cc.get_ref().remaining(), 0);
    }

    #[test]
    fn test_finish_judges_reply_like_end_of_stream() {
        let mut cc = channel("150 Still sending\r\n550 Transfer aborted\r\n");
        let stream = TransferStream::new(data_conn(b"unread"), &mut cc, None);
        stream.finish().unwrap();

        let stream = TransferStream::new(data_conn(b"unread"), &mut cc, None);
        assert_eq!(stream.finish().unwrap_err().code(), Some(550));
    }

    #[test]
    fn test_read_deadline_is_set_on_data_socket() {
        let mut cc = channel("226 ok\r\n");
        let deadline = Duration::from_secs(60);
        let mut stream = TransferStream::new(data_conn(b"x"), &mut cc, Some(deadline));
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(stream.conn.read_timeout().unwrap(), Some(deadline));
    }

    #[test]
    fn test_no_read_deadline_below_minimum() {
        let mut cc = channel("226 ok\r\n");
        let deadline = effective_deadline(true, Duration::from_secs(30));
        let mut stream = TransferStream::new(data_conn(b"x"), &mut cc, deadline);
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(stream.read_deadline(), None);
        assert_eq!(stream.conn.read_timeout().unwrap(), None);
    }

    #[test]
    fn test_close_leaves_reply_pending() {
        let mut cc = channel("226 Closing data connection\r\n");
        let stream = TransferStream::new(data_conn(b"unread"), &mut cc, None);
        stream.close();
        assert_eq!(cc.read_reply().unwrap().code, 226);
    }
}
