//! Terminal front end: line layout shared by the viewer and `dump`, the
//! interactive viewer itself, and demo data for `init-db`.
#![allow(missing_docs)]

pub mod seed;
pub mod viewer;

use crate::buffer::Line;
use crate::core::errors::LvError;
use crate::filter::FilterState;

/// Timestamp column layout, syslog style.
pub const TIME_FORMAT: &str = "%b %d %H:%M:%S";

/// Render one screen row. Continuation lines leave the fixed columns blank so
/// a multi-line message reads as one block.
#[must_use]
pub fn format_line(line: &Line) -> String {
    if line.is_continuation() {
        return format!("{:<15} {:<12} {:<16} {:<7} {}", "", "", "", "", line.message());
    }
    format!(
        "{:<15} {:<12.12} {:<16.16} {:<7} {}",
        line.datetime().format(TIME_FORMAT).to_string(),
        line.host(),
        line.program(),
        line.level(),
        line.message(),
    )
}

/// Clip `text` to `width` terminal cells, replacing control characters.
#[must_use]
pub fn fit(text: &str, width: usize) -> String {
    text.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if c.is_control() => '?',
            c => c,
        })
        .take(width)
        .collect()
}

/// Colour class of a row, keyed by its level name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Urgent,
    Error,
    Warning,
    Notice,
    Debug,
    Normal,
}

impl Severity {
    #[must_use]
    pub fn of(level: &str) -> Self {
        match level {
            "emerg" | "alert" | "crit" => Self::Urgent,
            "err" => Self::Error,
            "warning" => Self::Warning,
            "notice" => Self::Notice,
            "debug" => Self::Debug,
            _ => Self::Normal,
        }
    }
}

/// Status bar form of a worker failure; hints at `r` when a restart may help.
#[must_use]
pub fn failure_notice(err: &LvError) -> String {
    if err.is_retryable() {
        format!("{err} (r to retry)")
    } else {
        err.to_string()
    }
}

/// Status bar text: the filter summary, then any worker failure.
#[must_use]
pub fn status_text(filter: &FilterState, failure: Option<&str>) -> String {
    let summary = filter
        .summary()
        .iter()
        .map(|(label, value)| format!("{label}: {value}"))
        .collect::<Vec<_>>()
        .join("  ");
    match failure {
        Some(failure) => format!("{summary}  | {failure}"),
        None => summary,
    }
}
