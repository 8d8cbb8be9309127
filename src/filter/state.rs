//! Active filter constraints, owned by the UI and handed to driver factories.

#![allow(missing_docs)]

use chrono::NaiveDateTime;

use crate::buffer::line::{FACILITIES, LEVELS, MAX_LEVEL};
use crate::core::errors::{LvError, Result};

/// Level, facility, host, program and start-date constraints.
///
/// Setters normalise "show everything" values to unset, so the query
/// compiler only emits clauses for constraints that actually narrow results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    level: Option<u8>,
    facility: Option<u8>,
    host: Option<String>,
    program: Option<String>,
    start_date: Option<NaiveDateTime>,
}

impl FilterState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective severity ceiling; `MAX_LEVEL` when unset.
    pub fn level(&self) -> u8 {
        self.level.unwrap_or(MAX_LEVEL)
    }

    /// The ceiling only when it was narrowed below `MAX_LEVEL`.
    pub fn explicit_level(&self) -> Option<u8> {
        self.level
    }

    /// Values above `MAX_LEVEL` are clamped.
    pub fn set_level(&mut self, level: u8) {
        let level = level.min(MAX_LEVEL);
        self.level = (level != MAX_LEVEL).then_some(level);
    }

    /// `None` means all facilities.
    pub fn facility(&self) -> Option<u8> {
        self.facility
    }

    pub fn set_facility(&mut self, facility: Option<u8>) -> Result<()> {
        if let Some(code) = facility {
            if usize::from(code) >= FACILITIES.len() {
                return Err(LvError::InvalidFilter {
                    field: "facility",
                    details: format!("code {code} is out of range"),
                });
            }
        }
        self.facility = facility;
        Ok(())
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Whitespace-separated terms; blank input clears the constraint.
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = non_blank(host.into());
    }

    pub fn program(&self) -> Option<&str> {
        self.program.as_deref()
    }

    /// Whitespace-separated terms; blank input clears the constraint.
    pub fn set_program(&mut self, program: impl Into<String>) {
        self.program = non_blank(program.into());
    }

    pub fn start_date(&self) -> Option<NaiveDateTime> {
        self.start_date
    }

    pub fn set_start_date(&mut self, start_date: Option<NaiveDateTime>) {
        self.start_date = start_date;
    }

    /// `(label, value)` pairs for the status bar.
    pub fn summary(&self) -> [(&'static str, String); 4] {
        let facility = self
            .facility
            .and_then(|code| FACILITIES.get(usize::from(code)))
            .map_or_else(|| "ALL".to_string(), |name| (*name).to_string());
        [
            ("[l]evel", LEVELS[usize::from(self.level())].to_string()),
            ("[f]acility", facility),
            ("[p]rogram", self.program.clone().unwrap_or_else(|| "*".to_string())),
            ("[h]ost", self.host.clone().unwrap_or_else(|| "*".to_string())),
        ]
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Parse a severity given by name (`warning`) or code (`4`).
pub fn level_from_name(name: &str) -> Result<u8> {
    lookup(&LEVELS, name).ok_or_else(|| LvError::InvalidFilter {
        field: "level",
        details: format!("unknown level `{name}`"),
    })
}

/// Parse a facility given by name (`cron`) or code (`15`); `all` yields `None`.
pub fn facility_from_name(name: &str) -> Result<Option<u8>> {
    if name.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    lookup(&FACILITIES, name)
        .map(Some)
        .ok_or_else(|| LvError::InvalidFilter {
            field: "facility",
            details: format!("unknown facility `{name}`"),
        })
}

fn lookup(table: &[&str], name: &str) -> Option<u8> {
    let name = name.trim();
    let idx = table
        .iter()
        .position(|entry| entry.eq_ignore_ascii_case(name))
        .or_else(|| name.parse::<usize>().ok().filter(|idx| *idx < table.len()))?;
    u8::try_from(idx).ok()
}
