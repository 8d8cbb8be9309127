//! Screen lines: one decoded fragment of a record per terminal row.

#![allow(missing_docs)]

use chrono::NaiveDateTime;

use super::driver::Record;

/// Syslog facility names indexed by facility code.
pub const FACILITIES: [&str; 24] = [
    "kern", "user", "mail", "daemon", "auth", "syslog", "lpr", "news", "uucp", "9", "authpriv",
    "ftp", "12", "13", "14", "cron", "local0", "local1", "local2", "local3", "local4", "local5",
    "local6", "local7",
];

/// Syslog severity names indexed by level code, most severe first.
pub const LEVELS: [&str; 8] = [
    "emerg", "alert", "crit", "err", "warning", "notice", "info", "debug",
];

/// Highest (least severe) level code; the "show everything" ceiling.
pub const MAX_LEVEL: u8 = 7;

/// Translate a raw code into its display name.
///
/// Anything that is not a plain decimal integer inside the table yields `""`.
#[must_use]
pub fn translate_code(table: &[&'static str], raw: &str) -> &'static str {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return "";
    }
    raw.parse::<usize>()
        .ok()
        .and_then(|idx| table.get(idx).copied())
        .unwrap_or("")
}

/// An immutable screen row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    id: i64,
    datetime: NaiveDateTime,
    host: String,
    program: String,
    facility: &'static str,
    level: &'static str,
    message: String,
    is_continuation: bool,
}

impl Line {
    /// Split `record` on newlines; every fragment after the first is a continuation.
    pub fn explode(record: &Record) -> impl Iterator<Item = Self> + '_ {
        let facility = translate_code(&FACILITIES, &record.facility);
        let level = translate_code(&LEVELS, &record.level);
        record
            .message
            .split('\n')
            .enumerate()
            .map(move |(idx, fragment)| Self {
                id: record.id,
                datetime: record.datetime,
                host: record.host.clone(),
                program: record.program.clone(),
                facility,
                level,
                message: fragment.to_string(),
                is_continuation: idx > 0,
            })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Facility display name, empty when the code was unknown.
    pub fn facility(&self) -> &'static str {
        self.facility
    }

    /// Level display name, empty when the code was unknown.
    pub fn level(&self) -> &'static str {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_continuation(&self) -> bool {
        self.is_continuation
    }
}

#[cfg(test)]
pub(crate) fn test_record(id: i64, message: &str) -> Record {
    Record {
        id,
        datetime: chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap(),
        host: "oasis".to_string(),
        program: "test".to_string(),
        facility: "1".to_string(),
        level: "5".to_string(),
        pid: None,
        message: message.to_string(),
    }
}
