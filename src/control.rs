//! Control channel: command lines out, replies in
//!
//! The channel is half-duplex at the message level. Every command must have
//! its reply consumed before the next one is written, which `&mut self` on
//! every method enforces.

use crate::error::FtpResult;
use crate::events::{Event, EventSink};
use crate::reply::{self, Reply};
use crate::status;
use std::io::{BufReader, Read, Write};
use std::sync::Arc;

/// Upper bound on replies read by [`ControlChannel::send`] while waiting
/// for the expected code
pub const MAX_REPLY_READS: usize = 10;

pub struct ControlChannel<S: Read + Write> {
    reader: BufReader<S>,
    sink: Arc<dyn EventSink>,
    realm: String,
}

impl<S: Read + Write> ControlChannel<S> {
    pub fn new(stream: S, sink: Arc<dyn EventSink>) -> Self {
        ControlChannel {
            reader: BufReader::new(stream),
            sink,
            realm: String::new(),
        }
    }

    /// Writes `line` followed by CRLF and flushes
    pub fn write_command(&mut self, line: &str) -> FtpResult<()> {
        self.notify(Event::Command(mask_secrets(line)));
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\r\n")?;
        stream.flush()?;
        Ok(())
    }

    /// Reads exactly one reply
    pub fn read_reply(&mut self) -> FtpResult<Reply> {
        let reply = reply::read_reply(&mut self.reader)?;
        self.notify(Event::Reply {
            code: reply.code,
            message: reply.message.clone(),
        });
        Ok(reply)
    }

    /// Sends `line` and reads replies until `expected` shows up
    ///
    /// Servers sometimes emit informational or stray replies ahead of the
    /// one that answers the command. Replies below 400 that do not match are
    /// skipped, up to [`MAX_REPLY_READS`] reads in total. A failure code
    /// (4xx/5xx) ends the loop at once. The last reply read is returned
    /// whether it matches or not; comparing it is up to the caller.
    ///
    /// [`status::ANY`] accepts the first reply.
    pub fn send(&mut self, expected: i32, line: &str) -> FtpResult<Reply> {
        self.send_in(&[expected], line)
    }

    /// Like [`send`](Self::send) with several acceptable codes
    pub fn send_in(&mut self, expected: &[i32], line: &str) -> FtpResult<Reply> {
        self.write_command(line)?;

        let mut reply = self.read_reply()?;
        let mut reads = 1;
        while !accepts(expected, reply.code)
            && !status::is_failure(reply.code)
            && reads < MAX_REPLY_READS
        {
            reply = self.read_reply()?;
            reads += 1;
        }
        Ok(reply)
    }

    /// Forwards an event to the sink, tagged with the session realm
    pub fn notify(&self, event: Event) {
        self.sink.record(&self.realm, &event);
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub(crate) fn set_realm(&mut self, realm: &str) {
        self.realm = realm.to_string();
    }

    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Unwraps the underlying stream. Buffered, unread reply bytes are lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Fails with the reply as [`FtpError::UnexpectedStatus`](crate::error::FtpError)
/// unless its code is one of `codes`
pub fn require(reply: Reply, codes: &[i32]) -> FtpResult<Reply> {
    if accepts(codes, reply.code) {
        Ok(reply)
    } else {
        Err(reply.into_error())
    }
}

fn accepts(expected: &[i32], code: i32) -> bool {
    expected.iter().any(|&e| e == status::ANY || e == code)
}

fn mask_secrets(line: &str) -> String {
    match line.get(..5) {
        Some(verb) if verb.eq_ignore_ascii_case("PASS ") => "PASS ********".to_string(),
        _ => line.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::FtpError;
    use crate::events::NopSink;
    use std::io::{self, Cursor};

    /// In-memory control stream: replies are served from a script,
    /// commands are captured
    pub(crate) struct ScriptedStream {
        input: Cursor<Vec<u8>>,
        pub(crate) output: Vec<u8>,
    }

    impl ScriptedStream {
        pub(crate) fn new(replies: &str) -> Self {
            ScriptedStream {
                input: Cursor::new(replies.as_bytes().to_vec()),
                output: Vec::new(),
            }
        }

        pub(crate) fn written(&self) -> String {
            String::from_utf8_lossy(&self.output).into_owned()
        }

        /// Bytes of the script not consumed yet
        pub(crate) fn remaining(&self) -> usize {
            self.input.get_ref().len() - self.input.position() as usize
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn channel(replies: &str) -> ControlChannel<ScriptedStream> {
        ControlChannel::new(ScriptedStream::new(replies), Arc::new(NopSink))
    }

    #[test]
    fn test_send_skips_intermediate_replies() {
        let mut cc = channel("150 Opening\r\n150 Still opening\r\n226 Done\r\n200 later\r\n");
        let reply = cc.send(status::CLOSING_DATA_CONNECTION, "NOOP").unwrap();
        assert_eq!(reply.code, 226);
        assert_eq!(cc.get_ref().written(), "NOOP\r\n");
        // Exactly three replies were consumed
        assert_eq!(cc.read_reply().unwrap().code, 200);
    }

    #[test]
    fn test_send_gives_up_after_budget() {
        let script: String = (0..12).map(|i| format!("{} info {}\r\n", 110 + i, i)).collect();
        let mut cc = channel(&script);
        let reply = cc.send(status::CLOSING_DATA_CONNECTION, "NOOP").unwrap();
        // Tenth reply is returned without an error from this layer
        assert_eq!(reply.code, 119);
        assert_eq!(reply.message, "info 9");
        assert_eq!(cc.read_reply().unwrap().code, 120);
    }

    #[test]
    fn test_send_stops_on_failure_code() {
        let mut cc = channel("150 Opening\r\n550 No such file\r\n226 never read\r\n");
        let reply = cc.send(status::CLOSING_DATA_CONNECTION, "DELE x").unwrap();
        assert_eq!(reply, Reply::new(550, "No such file"));
        assert_eq!(cc.read_reply().unwrap().code, 226);
    }

    #[test]
    fn test_send_any_takes_first_reply() {
        let mut cc = channel("125 Already open\r\n226 Done\r\n");
        let reply = cc.send(status::ANY, "LIST /").unwrap();
        assert_eq!(reply.code, 125);
    }

    #[test]
    fn test_send_in_accepts_alternatives() {
        let mut cc = channel("230 Already in\r\n");
        let reply = cc
            .send_in(&[status::USER_OK, status::LOGGED_IN], "USER anonymous")
            .unwrap();
        assert_eq!(reply.code, 230);
    }

    #[test]
    fn test_send_propagates_read_failure() {
        let mut cc = channel("150 Opening\r\n");
        assert!(matches!(
            cc.send(status::CLOSING_DATA_CONNECTION, "NOOP"),
            Err(FtpError::Transport(_))
        ));
        assert_eq!(cc.get_ref().remaining(), 0);
    }

    #[test]
    fn test_require() {
        assert!(require(Reply::new(257, "\"/\""), &[status::PATH_CREATED]).is_ok());
        let err = require(Reply::new(550, "denied"), &[status::PATH_CREATED]).unwrap_err();
        assert_eq!(err.code(), Some(550));
        assert!(require(Reply::new(999, ""), &[status::ANY]).is_ok());
    }

    #[test]
    fn test_mask_secrets() {
        assert_eq!(mask_secrets("PASS hunter2"), "PASS ********");
        assert_eq!(mask_secrets("pass hunter2"), "PASS ********");
        assert_eq!(mask_secrets("USER bob"), "USER bob");
        assert_eq!(mask_secrets("PWD"), "PWD");
    }
}
