//! Passive-mode data connection negotiation
//!
//! Both variants only use the *port* the server announces. The data
//! connection is always dialed to the host the control channel was opened
//! to, which keeps servers behind NAT that advertise an internal address
//! reachable.

use crate::control::{require, ControlChannel};
use crate::error::{FtpError, FtpResult};
use crate::events::Event;
use crate::status;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Number of times a passive negotiation is attempted when the server
/// answers with something unusable. Transport errors are never retried.
pub const PASSIVE_ATTEMPTS: usize = 3;

// 227 Entering Passive Mode (h1,h2,h3,h4,p1,p2).
static PASV_PORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)")
        .expect("PASV regex is valid")
});

/// Which passive command opens data connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum PassiveMode {
    /// `PASV`
    #[default]
    #[serde(rename = "pasv", alias = "standard")]
    Standard,
    /// `EPSV` (RFC 2428)
    #[serde(rename = "epsv", alias = "extended")]
    Extended,
}

/// Extracts the data port from a PASV reply text
///
/// The first `(h1,h2,h3,h4,p1,p2)` group is used; the port is `p1*256+p2`
/// and the host octets are ignored.
pub fn parse_pasv_port(text: &str) -> FtpResult<u16> {
    let caps = PASV_PORT_RE
        .captures(text)
        .ok_or_else(|| FtpError::Format("PASV".to_string()))?;
    let octet = |i: usize| {
        caps[i]
            .parse::<u8>()
            .map_err(|_| FtpError::Format("PASV".to_string()))
    };
    let (msb, lsb) = (octet(5)?, octet(6)?);
    Ok((u16::from(msb) << 8) | u16::from(lsb))
}

/// Extracts the data port from an EPSV reply text: the number between
/// `|||` and the last `|`
pub fn parse_epsv_port(text: &str) -> FtpResult<u16> {
    let bad = || FtpError::Format("EPSV".to_string());
    let start = text.find("|||").ok_or_else(bad)?;
    let end = text.rfind('|').ok_or_else(bad)?;
    if end < start + 3 {
        return Err(bad());
    }
    text[start + 3..end].trim().parse::<u16>().map_err(|_| bad())
}

/// Sends `PASV` and returns the announced port
///
/// Intermediate replies are skipped like any other control exchange.
pub fn pasv<S: Read + Write>(cc: &mut ControlChannel<S>) -> FtpResult<u16> {
    let codes = [status::PASSIVE_MODE, status::EXTENDED_PASSIVE_MODE];
    let reply = require(cc.send_in(&codes, "PASV")?, &codes)?;
    parse_pasv_port(&reply.message)
}

/// Sends `EPSV` and returns the announced port
pub fn epsv<S: Read + Write>(cc: &mut ControlChannel<S>) -> FtpResult<u16> {
    let codes = [status::EXTENDED_PASSIVE_MODE];
    let reply = require(cc.send_in(&codes, "EPSV")?, &codes)?;
    parse_epsv_port(&reply.message)
}

/// A new negotiation is only safe when the previous one got its final
/// answer: an unparsable passive reply or a failure code
fn can_retry(err: &FtpError) -> bool {
    match err {
        FtpError::Format(_) => true,
        FtpError::UnexpectedStatus { code, .. } => status::is_failure(*code),
        _ => false,
    }
}

/// Runs the negotiation for `mode`, repeating it while the server answers
/// with an unusable reply, at most [`PASSIVE_ATTEMPTS`] times
pub fn negotiate<S: Read + Write>(cc: &mut ControlChannel<S>, mode: PassiveMode) -> FtpResult<u16> {
    let mut attempt = 1;
    loop {
        let result = match mode {
            PassiveMode::Standard => pasv(cc),
            PassiveMode::Extended => epsv(cc),
        };
        match result {
            Err(e) if attempt < PASSIVE_ATTEMPTS && can_retry(&e) => {
                cc.notify(Event::Warning(format!(
                    "passive negotiation attempt {} failed: {}",
                    attempt, e
                )));
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Dials `host:port` over IPv4
pub fn dial(host: &str, port: u16, timeout: Duration) -> FtpResult<TcpStream> {
    let addr = resolve_v4(host, port)?;
    Ok(TcpStream::connect_timeout(&addr, timeout)?)
}

fn resolve_v4(host: &str, port: u16) -> FtpResult<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| {
            FtpError::Transport(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no IPv4 address for {}", host),
            ))
        })
}

/// Negotiates a passive port and dials it on the control channel's `host`
pub fn open_data_connection<S: Read + Write>(
    cc: &mut ControlChannel<S>,
    host: &str,
    mode: PassiveMode,
    timeout: Duration,
) -> FtpResult<TcpStream> {
    let port = negotiate(cc, mode)?;
    match dial(host, port, timeout) {
        Ok(conn) => {
            if let Ok(addr) = conn.peer_addr() {
                cc.notify(Event::DataConnection(addr));
            }
            Ok(conn)
        }
        Err(e) => {
            cc.notify(Event::Failure {
                operation: "open data connection",
                error: e.to_string(),
            });
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::tests::channel;

    #[test]
    fn test_parse_pasv_port_ignores_host() {
        let port = parse_pasv_port("Entering Passive Mode (10,0,0,7,4,1).").unwrap();
        assert_eq!(port, 4 * 256 + 1);
        let port = parse_pasv_port("Entering Passive Mode (192,168,1,200,4,1)").unwrap();
        assert_eq!(port, 1025);
        let port = parse_pasv_port("=(127, 0, 0, 1, 195, 80)").unwrap();
        assert_eq!(port, 195 * 256 + 80);
    }

    #[test]
    fn test_parse_pasv_port_rejects_missing_group() {
        assert!(matches!(
            parse_pasv_port("Entering Passive Mode 10,0,0,7,4,1"),
            Err(FtpError::Format(_))
        ));
        assert!(matches!(
            parse_pasv_port("Entering Passive Mode (10,0,0,7,400,1)"),
            Err(FtpError::Format(_))
        ));
    }

    #[test]
    fn test_parse_epsv_port() {
        assert_eq!(parse_epsv_port("Entering Extended Passive Mode (|||42|)").unwrap(), 42);
        assert_eq!(parse_epsv_port("|||6446|").unwrap(), 6446);
    }

    #[test]
    fn test_parse_epsv_port_rejects_bad_text() {
        for text in ["Entering Extended Passive Mode", "(|||)", "(||42|)", "(|||abc|)"] {
            assert!(
                matches!(parse_epsv_port(text), Err(FtpError::Format(_))),
                "{} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_pasv_accepts_229_code() {
        let mut cc = channel("229 Entering Passive Mode (1,2,3,4,0,21)\r\n");
        assert_eq!(pasv(&mut cc).unwrap(), 21);
        assert_eq!(cc.get_ref().written(), "PASV\r\n");
    }

    #[test]
    fn test_negotiate_retries_unusable_reply() {
        let mut cc = channel(
            "227 Entering Passive Mode\r\n227 Entering Passive Mode (1,2,3,4,1,0)\r\n",
        );
        assert_eq!(negotiate(&mut cc, PassiveMode::Standard).unwrap(), 256);
        assert_eq!(cc.get_ref().written(), "PASV\r\nPASV\r\n");
    }

    #[test]
    fn test_pasv_skips_intermediate_reply() {
        let mut cc = channel(concat!(
            "200 Stray reply\r\n",
            "227 Entering Passive Mode (1,2,3,4,0,21)\r\n",
            "150 Opening data connection\r\n",
        ));
        assert_eq!(negotiate(&mut cc, PassiveMode::Standard).unwrap(), 21);
        assert_eq!(cc.get_ref().written(), "PASV\r\n");
        assert_eq!(cc.read_reply().unwrap().code, 150);
    }

    #[test]
    fn test_negotiate_gives_up_without_final_reply() {
        let replies = "120 Wait\r\n".repeat(11);
        let mut cc = channel(&replies);
        let err = negotiate(&mut cc, PassiveMode::Standard).unwrap_err();
        assert_eq!(err.code(), Some(120));
        assert_eq!(cc.get_ref().written(), "PASV\r\n");
    }

    #[test]
    fn test_negotiate_is_bounded() {
        let mut cc = channel("500 no\r\n500 no\r\n500 no\r\n227 (1,2,3,4,1,0)\r\n");
        let err = negotiate(&mut cc, PassiveMode::Extended).unwrap_err();
        assert_eq!(err.code(), Some(500));
        assert_eq!(cc.get_ref().written(), "EPSV\r\n".repeat(PASSIVE_ATTEMPTS));
    }

    #[test]
    fn test_negotiate_does_not_retry_transport_errors() {
        let mut cc = channel("");
        assert!(matches!(
            negotiate(&mut cc, PassiveMode::Standard),
            Err(FtpError::Transport(_))
        ));
        assert_eq!(cc.get_ref().written(), "PASV\r\n");
    }

    #[test]
    fn test_passive_mode_from_json() {
        let mode: PassiveMode = serde_json::from_str("\"epsv\"").unwrap();
        assert_eq!(mode, PassiveMode::Extended);
        let mode: PassiveMode = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(mode, PassiveMode::Standard);
    }
}
