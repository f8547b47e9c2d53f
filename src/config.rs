use crate::passive::PassiveMode;
use crate::session::{SessionOptions, DEFAULT_PORT};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Error, ErrorKind};
use std::time::Duration;

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> u64 {
    30
}

/// Connection profile for one FTP server
#[derive(Debug, Deserialize)]
pub struct Profile {
    /// Server IP/hostname
    pub host: String,
    /// Control port (default 21)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login name, `user@realm` accepted
    pub login: String,
    /// Password, never printed by `Debug`
    pub password: SecretString,
    /// Dial timeout and idle-read deadline in seconds (default 30)
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// `"pasv"` (default) or `"epsv"`
    #[serde(default)]
    pub passive: PassiveMode,
    /// Apply the idle-read deadline to every download, not only listings
    #[serde(default)]
    pub read_deadline: bool,
}

impl Profile {
    /// `host:port` for [`Session::connect_with`](crate::session::Session::connect_with)
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            timeout: Duration::from_secs(self.timeout),
            passive_mode: self.passive,
            read_deadline: self.read_deadline,
        }
    }
}

/// Reads a connection profile from a JSON file
///
/// # Arguments
/// * `filename` - Path to the profile
///
/// # Errors
/// - File not found or unreadable
/// - Invalid JSON or missing required fields
/// - Port 0 or timeout 0
///
/// # File Format
/// One JSON object with fields host, port, login, password, timeout,
/// passive, read_deadline. Lines starting with `#` are comments.
///
/// # Example
/// ```text
/// // let profile = load_profile("backup.json")?;
/// ```
pub fn load_profile(filename: &str) -> Result<Profile, Error> {
    let file = File::open(filename)?;
    let reader = BufReader::new(file);

    let mut json = String::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim_start().starts_with('#') {
            continue;
        }
        json.push_str(&line);
        json.push('\n');
    }

    let profile: Profile = serde_json::from_str(&json).map_err(|e| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("invalid profile {}: {}", filename, e),
        )
    })?;

    if profile.port == 0 {
        return Err(Error::new(ErrorKind::InvalidInput, "port must not be 0"));
    }
    if profile.timeout == 0 {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "timeout must be a positive number of seconds",
        ));
    }

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_profile(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let mut path = PathBuf::from(dir.path());
        path.push("profile.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_profile() {
        let (_dir, path) = write_profile(
            r#"# backup server
{
  "host": "192.168.0.1",
  "port": 2121,
  "login": "user1@backup.example",
  "password": "password1",
  "timeout": 120,
  "passive": "epsv",
  "read_deadline": true
}"#,
        );
        let profile = load_profile(path.to_str().unwrap()).unwrap();
        assert_eq!(profile.address(), "192.168.0.1:2121");
        assert_eq!(profile.login, "user1@backup.example");
        assert_eq!(profile.password.expose_secret(), "password1");
        assert_eq!(
            profile.options(),
            SessionOptions {
                timeout: Duration::from_secs(120),
                passive_mode: PassiveMode::Extended,
                read_deadline: true,
            }
        );
        assert!(!format!("{:?}", profile).contains("password1"));
    }

    #[test]
    fn test_load_profile_defaults() {
        let (_dir, path) = write_profile(
            r#"{"host":"ftp.example.com","login":"anonymous","password":"guest"}"#,
        );
        let profile = load_profile(path.to_str().unwrap()).unwrap();
        assert_eq!(profile.port, 21);
        assert_eq!(profile.options(), SessionOptions::default());
    }

    #[test]
    fn test_load_profile_rejects_bad_values() {
        let (_dir, path) = write_profile(
            r#"{"host":"ftp.example.com","port":0,"login":"a","password":"b"}"#,
        );
        assert!(load_profile(path.to_str().unwrap()).is_err());

        let (_dir, path) = write_profile(
            r#"{"host":"ftp.example.com","login":"a","password":"b","timeout":0}"#,
        );
        assert!(load_profile(path.to_str().unwrap()).is_err());

        let (_dir, path) = write_profile(r#"{"host":"ftp.example.com"}"#);
        let err = load_profile(path.to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
