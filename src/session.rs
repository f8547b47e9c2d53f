//! FTP session: login, navigation and passive-mode transfers
//!
//! A [`Session`] owns the control connection. Transfers borrow it mutably
//! for as long as their data connection lives, so only one command or
//! transfer can be in flight at a time.

use crate::control::{require, ControlChannel};
use crate::error::{FtpError, FtpResult};
use crate::events::{Event, EventSink, NopSink};
use crate::listing::{parse_line, Entry};
use crate::passive::{self, PassiveMode};
use crate::reply::Reply;
use crate::status;
use crate::stream::{effective_deadline, TransferStream};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// Control port used when the address has none
pub const DEFAULT_PORT: u16 = 21;

/// Replies that mean the server accepted a data command
const DATA_COMMAND_OK: [i32; 3] = [
    status::ALREADY_OPEN,
    status::ABOUT_TO_SEND,
    status::PASSIVE_MODE,
];

/// Tunables fixed when the session is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Dial timeout for control and data connections, also the idle-read
    /// deadline on data connections when enabled
    pub timeout: Duration,
    pub passive_mode: PassiveMode,
    /// Initial state of the read-deadline flag
    pub read_deadline: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            timeout: Duration::from_secs(30),
            passive_mode: PassiveMode::Standard,
            read_deadline: false,
        }
    }
}

pub struct Session<S: Read + Write = TcpStream> {
    control: ControlChannel<S>,
    host: String,
    welcome: String,
    read_timeout: bool,
    timeout: Duration,
    passive_mode: PassiveMode,
}

impl Session<TcpStream> {
    /// Connects to `addr` (`host` or `host:port`) and waits for the greeting
    pub fn connect(addr: &str, timeout: Duration) -> FtpResult<Self> {
        let options = SessionOptions {
            timeout,
            ..SessionOptions::default()
        };
        Self::connect_with(addr, options, Arc::new(NopSink))
    }

    /// Same as [`connect`](Self::connect) with explicit options and event sink
    pub fn connect_with(
        addr: &str,
        options: SessionOptions,
        sink: Arc<dyn EventSink>,
    ) -> FtpResult<Self> {
        let (host, addr) = split_addr(addr);
        let stream = dial_any(&addr, options.timeout)?;
        Self::from_stream(stream, &host, options, sink)
    }
}

impl<S: Read + Write> Session<S> {
    /// Wraps an established control connection to `host` and reads the
    /// server greeting. `host` is where data connections are dialed.
    pub fn from_stream(
        stream: S,
        host: &str,
        options: SessionOptions,
        sink: Arc<dyn EventSink>,
    ) -> FtpResult<Self> {
        let mut control = ControlChannel::new(stream, sink);
        let greeting = control.read_reply().and_then(|reply| require(reply, &[status::READY]));
        let welcome = match greeting {
            Ok(reply) => reply.message,
            Err(e) => {
                let _ = control.write_command("QUIT");
                return Err(e);
            }
        };

        Ok(Session {
            control,
            host: host.to_string(),
            welcome,
            read_timeout: options.read_deadline,
            timeout: options.timeout,
            passive_mode: options.passive_mode,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Realm part of a `user@realm` login, used to correlate log lines
    pub fn realm(&self) -> Option<&str> {
        Some(self.control.realm()).filter(|realm| !realm.is_empty())
    }

    /// Text of the 220 greeting
    pub fn welcome(&self) -> &str {
        &self.welcome
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn passive_mode(&self) -> PassiveMode {
        self.passive_mode
    }

    pub fn set_passive_mode(&mut self, mode: PassiveMode) {
        self.passive_mode = mode;
    }

    pub fn read_timeout_flag(&self) -> bool {
        self.read_timeout
    }

    pub fn set_read_timeout_flag(&mut self) {
        self.read_timeout = true;
    }

    pub fn unset_read_timeout_flag(&mut self) {
        self.read_timeout = false;
    }

    /// Runs `f` with the read-deadline flag set to `enabled`, restoring the
    /// previous value afterwards even if `f` panics
    pub fn with_read_deadline<T>(&mut self, enabled: bool, f: impl FnOnce(&mut Self) -> T) -> T {
        let prior = self.read_timeout;
        self.read_timeout = enabled;
        let mut session = scopeguard::guard(self, move |s| s.read_timeout = prior);
        f(&mut **session)
    }

    /// Sends `USER` and `PASS`
    ///
    /// A `user@realm` identifier is sent unchanged; the realm is remembered
    /// for event correlation only.
    pub fn login(&mut self, user: &str, password: &str) -> FtpResult<()> {
        if let Some((_, realm)) = user.split_once('@') {
            self.control.set_realm(realm);
        }
        self.notify(Event::Enter("Login"));
        let result = self.login_exchange(user, password);
        self.leave("Login", &result);
        result
    }

    fn login_exchange(&mut self, user: &str, password: &str) -> FtpResult<()> {
        let reply = self
            .control
            .send_in(&[status::USER_OK, status::LOGGED_IN], &format!("USER {}", user))?;
        match reply.code {
            status::LOGGED_IN => return Ok(()),
            status::USER_OK => {}
            _ => return Err(reply.into_error()),
        }
        let reply = self
            .control
            .send(status::LOGGED_IN, &format!("PASS {}", password))?;
        require(reply, &[status::LOGGED_IN])?;
        Ok(())
    }

    /// Lists `path` and parses every line of the reply
    ///
    /// The read deadline is enabled for the duration of the call. On error
    /// nothing read so far is returned.
    pub fn list(&mut self, path: &str) -> FtpResult<Vec<Entry>> {
        self.notify(Event::Enter("List"));
        let result = self.with_read_deadline(true, |session| session.list_entries(path));
        self.leave("List", &result);
        result
    }

    fn list_entries(&mut self, path: &str) -> FtpResult<Vec<Entry>> {
        let command = if path.is_empty() {
            "LIST".to_string()
        } else {
            format!("LIST {}", path)
        };
        let mut reader = BufReader::new(self.transfer(&command)?);

        let mut entries = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_line(&line));
        }
        reader.into_inner().close();
        Ok(entries)
    }

    /// Starts downloading `path` in binary mode
    ///
    /// Read the returned stream to its end so the completion reply is
    /// consumed, or call [`TransferStream::finish`].
    pub fn retr(&mut self, path: &str) -> FtpResult<TransferStream<'_, S>> {
        self.notify(Event::Enter("Retr"));
        match self.control.send(status::COMMAND_OK, "TYPE I") {
            Ok(reply) if reply.code == status::COMMAND_OK => {}
            Ok(reply) => self.notify(Event::Warning(format!(
                "TYPE I refused: {} {}",
                reply.code, reply.message
            ))),
            Err(e) => self.notify(Event::Warning(format!("TYPE I failed: {}", e))),
        }

        let command = format!("RETR {}", path);
        match self.data_command(&command) {
            Ok(conn) => {
                self.notify(Event::Leave("Retr"));
                let deadline = effective_deadline(self.read_timeout, self.timeout);
                Ok(TransferStream::new(conn, &mut self.control, deadline))
            }
            Err(e) => {
                self.notify(Event::Failure {
                    operation: "Retr",
                    error: e.to_string(),
                });
                self.notify(Event::Leave("Retr"));
                Err(e)
            }
        }
    }

    /// Downloads `path` into `dest`, returning the byte count
    ///
    /// `dest` is flushed before returning so buffered write errors are
    /// reported here.
    pub fn retr_into<W: Write>(&mut self, path: &str, dest: &mut W) -> FtpResult<u64> {
        let mut stream = self.retr(path)?;
        let bytes = io::copy(&mut stream, dest)?;
        stream.finish()?;
        dest.flush()?;
        Ok(bytes)
    }

    /// Uploads everything `source` yields to `path`
    ///
    /// If copying fails the error is returned at once and the server's
    /// completion reply is left unread; quit and reconnect before reuse.
    pub fn stor<R: Read>(&mut self, path: &str, source: &mut R) -> FtpResult<u64> {
        self.notify(Event::Enter("Stor"));
        let result = self.stor_exchange(path, source);
        self.leave("Stor", &result);
        result
    }

    fn stor_exchange<R: Read>(&mut self, path: &str, source: &mut R) -> FtpResult<u64> {
        let mut conn = self.data_command(&format!("STOR {}", path))?;
        let copied = io::copy(source, &mut conn);
        let _ = conn.shutdown(Shutdown::Both);
        drop(conn);
        let bytes = copied?;

        let reply = self.control.read_reply()?;
        require(
            reply,
            &[status::CLOSING_DATA_CONNECTION, status::REQUESTED_FILE_ACTION_OK],
        )?;
        self.notify(Event::TransferComplete { bytes });
        Ok(bytes)
    }

    pub fn change_dir(&mut self, path: &str) -> FtpResult<()> {
        self.simple(
            "ChangeDir",
            &[status::REQUESTED_FILE_ACTION_OK, status::CLOSING_DATA_CONNECTION],
            &format!("CWD {}", path),
        )
        .map(drop)
    }

    pub fn change_dir_to_parent(&mut self) -> FtpResult<()> {
        self.simple(
            "ChangeDirToParent",
            &[status::REQUESTED_FILE_ACTION_OK, status::COMMAND_OK],
            "CDUP",
        )
        .map(drop)
    }

    /// Returns the working directory reported by `PWD`
    pub fn current_dir(&mut self) -> FtpResult<String> {
        let reply = self.simple("CurrentDir", &[status::PATH_CREATED], "PWD")?;
        parse_pwd(&reply.message)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> FtpResult<()> {
        self.simple(
            "Rename",
            &[status::REQUEST_FILE_PENDING],
            &format!("RNFR {}", from),
        )?;
        self.simple(
            "Rename",
            &[status::REQUESTED_FILE_ACTION_OK],
            &format!("RNTO {}", to),
        )
        .map(drop)
    }

    pub fn delete(&mut self, path: &str) -> FtpResult<()> {
        self.simple(
            "Delete",
            &[status::REQUESTED_FILE_ACTION_OK],
            &format!("DELE {}", path),
        )
        .map(drop)
    }

    pub fn make_dir(&mut self, path: &str) -> FtpResult<()> {
        self.simple("MakeDir", &[status::PATH_CREATED], &format!("MKD {}", path))
            .map(drop)
    }

    pub fn remove_dir(&mut self, path: &str) -> FtpResult<()> {
        self.simple(
            "RemoveDir",
            &[status::REQUESTED_FILE_ACTION_OK],
            &format!("RMD {}", path),
        )
        .map(drop)
    }

    /// Keepalive
    pub fn noop(&mut self) -> FtpResult<()> {
        self.simple("NoOp", &[status::COMMAND_OK], "NOOP").map(drop)
    }

    /// Sends `QUIT` without waiting for the reply and closes the control
    /// connection
    pub fn quit(mut self) {
        self.notify(Event::Enter("Quit"));
        if let Err(e) = self.control.write_command("QUIT") {
            self.notify(Event::Warning(format!("QUIT not sent: {}", e)));
        }
        self.notify(Event::Leave("Quit"));
    }

    /// Drops the control connection without telling the server
    pub fn close(self) {
        drop(self.control.into_inner());
    }

    /// One command, one expected reply
    fn simple(&mut self, op: &'static str, expected: &[i32], command: &str) -> FtpResult<Reply> {
        self.notify(Event::Enter(op));
        let result = self
            .control
            .send_in(expected, command)
            .and_then(|reply| require(reply, expected));
        self.leave(op, &result);
        result
    }

    /// Opens a data connection, sends `command` and checks that the server
    /// is about to use the connection
    fn data_command(&mut self, command: &str) -> FtpResult<TcpStream> {
        let conn = passive::open_data_connection(
            &mut self.control,
            &self.host,
            self.passive_mode,
            self.timeout,
        )?;

        if let Err(e) = self.control.write_command(command) {
            let _ = conn.shutdown(Shutdown::Both);
            return Err(e);
        }
        let reply = match self.control.read_reply() {
            Ok(reply) => reply,
            Err(e) => {
                let _ = conn.shutdown(Shutdown::Both);
                return Err(e);
            }
        };
        if reply.is_any(&DATA_COMMAND_OK) {
            return Ok(conn);
        }
        // After 425 the server never completed its side of the connection
        if reply.code != status::CAN_NOT_OPEN_DATA_CONNECTION {
            let _ = conn.shutdown(Shutdown::Both);
        }
        Err(reply.into_error())
    }

    /// Runs a data command and wraps the connection for reading
    fn transfer(&mut self, command: &str) -> FtpResult<TransferStream<'_, S>> {
        let conn = self.data_command(command)?;
        let deadline = effective_deadline(self.read_timeout, self.timeout);
        Ok(TransferStream::new(conn, &mut self.control, deadline))
    }

    fn notify(&self, event: Event) {
        self.control.notify(event);
    }

    fn leave<T>(&self, op: &'static str, result: &FtpResult<T>) {
        if let Err(e) = result {
            self.notify(Event::Failure {
                operation: op,
                error: e.to_string(),
            });
        }
        self.notify(Event::Leave(op));
    }
}

/// Extracts the quoted path from a PWD reply text
pub fn parse_pwd(message: &str) -> FtpResult<String> {
    match (message.find('"'), message.rfind('"')) {
        (Some(start), Some(end)) if start < end => Ok(message[start + 1..end].to_string()),
        _ => Err(FtpError::Format("PWD".to_string())),
    }
}

/// Splits `host[:port]` into the host and a dialable `host:port`
fn split_addr(addr: &str) -> (String, String) {
    match addr.split_once(':') {
        Some((host, _)) => (host.to_string(), addr.to_string()),
        None => (addr.to_string(), format!("{}:{}", addr, DEFAULT_PORT)),
    }
}

/// Tries every resolved address until one accepts
fn dial_any(addr: &str, timeout: Duration) -> FtpResult<TcpStream> {
    let addrs: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    Err(FtpError::Transport(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "No addresses found")
    })))
}
