//! FTP reply codes (RFC 959, RFC 2428)
//!
//! Codes are plain `i32` values so that callers can compare them directly
//! against [`Reply::code`](crate::reply::Reply) and use [`ANY`] as a wildcard.

/// Wildcard accepted by [`ControlChannel::send`](crate::control::ControlChannel::send):
/// whatever the server answers is returned.
pub const ANY: i32 = -1;

pub const INITIATING: i32 = 100;
pub const RESTART_MARKER: i32 = 110;
pub const READY_MINUTE: i32 = 120;
/// Data connection already open; transfer starting
pub const ALREADY_OPEN: i32 = 125;
/// File status okay; about to open data connection
pub const ABOUT_TO_SEND: i32 = 150;

pub const COMMAND_OK: i32 = 200;
pub const COMMAND_NOT_IMPLEMENTED: i32 = 202;
pub const SYSTEM: i32 = 211;
pub const DIRECTORY: i32 = 212;
pub const FILE: i32 = 213;
pub const HELP: i32 = 214;
pub const NAME: i32 = 215;
/// Service ready for new user
pub const READY: i32 = 220;
pub const CLOSING: i32 = 221;
pub const DATA_CONNECTION_OPEN: i32 = 225;
/// Closing data connection; requested file action successful
pub const CLOSING_DATA_CONNECTION: i32 = 226;
/// Entering passive mode (h1,h2,h3,h4,p1,p2)
pub const PASSIVE_MODE: i32 = 227;
pub const LONG_PASSIVE_MODE: i32 = 228;
/// Entering extended passive mode (|||port|)
pub const EXTENDED_PASSIVE_MODE: i32 = 229;
pub const LOGGED_IN: i32 = 230;
pub const LOGGED_OUT: i32 = 231;
pub const LOGOUT_ACK: i32 = 232;
pub const REQUESTED_FILE_ACTION_OK: i32 = 250;
/// "PATHNAME" created (also the PWD reply)
pub const PATH_CREATED: i32 = 257;

pub const USER_OK: i32 = 331;
pub const LOGIN_NEED_ACCOUNT: i32 = 332;
pub const REQUEST_FILE_PENDING: i32 = 350;

pub const NOT_AVAILABLE: i32 = 421;
/// Can't open data connection
pub const CAN_NOT_OPEN_DATA_CONNECTION: i32 = 425;
pub const TRANSFER_ABORTED: i32 = 426;
pub const INVALID_CREDENTIALS: i32 = 430;
pub const HOST_UNAVAILABLE: i32 = 434;
pub const FILE_ACTION_IGNORED: i32 = 450;
pub const ACTION_ABORTED: i32 = 451;
pub const REQUESTED_ACTION_NOT_TAKEN: i32 = 452;

pub const BAD_COMMAND: i32 = 500;
pub const BAD_ARGUMENTS: i32 = 501;
pub const NOT_IMPLEMENTED: i32 = 502;
pub const BAD_SEQUENCE: i32 = 503;
pub const NOT_IMPLEMENTED_PARAMETER: i32 = 504;
pub const NOT_LOGGED_IN: i32 = 530;
pub const STORING_NEED_ACCOUNT: i32 = 532;
pub const FILE_UNAVAILABLE: i32 = 550;
pub const PAGE_TYPE_UNKNOWN: i32 = 551;
pub const EXCEEDED_STORAGE: i32 = 552;
pub const BAD_FILENAME: i32 = 553;

/// First code of the transient/permanent failure classes. Replies at or
/// above this value are final and never skipped by the control channel.
pub const FIRST_FAILURE: i32 = 400;

/// Reports whether `code` belongs to the failure classes (4xx, 5xx).
pub fn is_failure(code: i32) -> bool {
    code >= FIRST_FAILURE
}
