//! LIST output parsing
//!
//! Understands the Unix `ls -l` layout most servers emit and the MS-DOS/IIS
//! layout. Lines in neither format still produce an entry of kind
//! [`EntryKind::Unknown`] so that no server line is silently dropped.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

// drwxr-xr-x   2 owner group      4096 Jan  5 12:30 name
static UNIX_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([\-dlbcps])([rwxsStT\-]{9})[+@.]?\s+\d+\s+(\S+)\s+(?:(\S+)\s+)?(\d+)\s+([A-Za-z]{3}\s+\d{1,2}\s+(?:\d{1,2}:\d{2}|\d{4}))\s(.+)$",
    )
    .expect("unix listing regex is valid")
});

// 01-16-24  02:22PM       <DIR>          name
static DOS_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2}-\d{2}-\d{2,4})\s+(\d{1,2}:\d{2}\s*[AaPp][Mm])\s+(<DIR>|\d+)\s+(.+)$")
        .expect("dos listing regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Link,
    /// Device, socket, pipe or an unparsable line
    Unknown,
}

/// One directory entry from a LIST reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: EntryKind,
    pub name: String,
    pub size: u64,
    pub modified: Option<NaiveDateTime>,
    /// Unix permission string such as `rwxr-xr-x`
    pub permissions: Option<String>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub link_target: Option<String>,
    /// The line as received, without the line terminator
    pub raw: String,
}

impl Entry {
    fn unknown(raw: &str) -> Self {
        Entry {
            kind: EntryKind::Unknown,
            name: raw.to_string(),
            size: 0,
            modified: None,
            permissions: None,
            owner: None,
            group: None,
            link_target: None,
            raw: raw.to_string(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Parses one LIST line into an [`Entry`]
pub fn parse_line(raw_line: &str) -> Entry {
    let line = raw_line.trim_end_matches(['\r', '\n']);
    parse_unix(line)
        .or_else(|| parse_dos(line))
        .unwrap_or_else(|| Entry::unknown(line))
}

fn parse_unix(line: &str) -> Option<Entry> {
    let caps = UNIX_LINE_RE.captures(line)?;
    let kind = match &caps[1] {
        "-" => EntryKind::File,
        "d" => EntryKind::Directory,
        "l" => EntryKind::Link,
        _ => EntryKind::Unknown,
    };
    let name_field = &caps[7];
    let (name, link_target) = match (kind, name_field.split_once(" -> ")) {
        (EntryKind::Link, Some((name, target))) => (name.to_string(), Some(target.to_string())),
        _ => (name_field.to_string(), None),
    };
    Some(Entry {
        kind,
        name,
        size: caps[5].parse().ok()?,
        modified: parse_unix_date(&caps[6], Local::now().naive_local()),
        permissions: Some(caps[2].to_string()),
        owner: Some(caps[3].to_string()),
        group: caps.get(4).map(|g| g.as_str().to_string()),
        link_target,
        raw: line.to_string(),
    })
}

/// `Jan  5 12:30` (within the last year) or `Jan  5  2019`
fn parse_unix_date(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let mut parts = text.split_whitespace();
    let (month, day, last) = (parts.next()?, parts.next()?, parts.next()?);

    if last.contains(':') {
        let time = NaiveTime::parse_from_str(last, "%H:%M").ok()?;
        let at_year = |year: i32| {
            NaiveDate::parse_from_str(&format!("{} {} {}", month, day, year), "%b %d %Y")
                .ok()
                .map(|date| date.and_time(time))
        };
        let stamp = at_year(now.year())?;
        // Recent entries without a year may belong to last year
        if stamp > now + chrono::Duration::days(1) {
            at_year(now.year() - 1)
        } else {
            Some(stamp)
        }
    } else {
        NaiveDate::parse_from_str(&format!("{} {} {}", month, day, last), "%b %d %Y")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}

fn parse_dos(line: &str) -> Option<Entry> {
    let caps = DOS_LINE_RE.captures(line)?;
    let time = caps[2].replace(' ', "").to_uppercase();
    let stamp = format!("{} {}", &caps[1], time);
    let modified = NaiveDateTime::parse_from_str(&stamp, "%m-%d-%y %I:%M%p")
        .or_else(|_| NaiveDateTime::parse_from_str(&stamp, "%m-%d-%Y %I:%M%p"))
        .ok();
    let (kind, size) = match &caps[3] {
        "<DIR>" => (EntryKind::Directory, 0),
        digits => (EntryKind::File, digits.parse().ok()?),
    };
    Some(Entry {
        kind,
        name: caps[4].to_string(),
        size,
        modified,
        permissions: None,
        owner: None,
        group: None,
        link_target: None,
        raw: line.to_string(),
    })
}
