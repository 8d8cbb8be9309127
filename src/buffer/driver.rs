//! Backend boundary: the record shape, fetch instructions and the `Driver`
//! contract every connector implements.

#![allow(missing_docs)]

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::filter::FilterState;

/// One log row as delivered by a backend.
///
/// Facility and level are kept as the backend's raw text so that translation
/// to display names can degrade to an empty string instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub datetime: NaiveDateTime,
    pub host: String,
    pub program: String,
    pub facility: String,
    pub level: String,
    pub pid: Option<i64>,
    /// May contain embedded newlines.
    pub message: String,
}

/// One backend request produced by the refill policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchInstruction {
    /// Boundary row id (exclusive). `None` means "from the newest record".
    pub anchor: Option<i64>,
    /// `true` fetches rows before the anchor, newest first.
    pub descending: bool,
    pub count: usize,
}

impl FetchInstruction {
    #[must_use]
    pub const fn backward(anchor: Option<i64>, count: usize) -> Self {
        Self {
            anchor,
            descending: true,
            count,
        }
    }

    #[must_use]
    pub const fn forward(anchor: i64, count: usize) -> Self {
        Self {
            anchor: Some(anchor),
            descending: false,
            count,
        }
    }
}

/// Connector contract consumed by the fetch engine.
///
/// A driver is owned by exactly one worker thread for its whole lifecycle:
/// `start_connection` once, any number of queries, `stop_connection` once.
pub trait Driver: Send {
    /// Backend-specific handle for one prepared query.
    type Query;

    /// Whether a start date was configured, enabling the datetime seek.
    fn has_start_date(&self) -> bool;

    fn start_connection(&mut self) -> Result<()>;

    fn stop_connection(&mut self);

    fn prepare_query(
        &mut self,
        anchor: Option<i64>,
        descending: bool,
        count: usize,
    ) -> Result<Self::Query>;

    /// Only called when [`Driver::has_start_date`] is true.
    fn prepare_datetime_query(&mut self) -> Result<Self::Query>;

    /// Pull the next record, `None` once the query is exhausted.
    fn fetch_record(&mut self, query: &mut Self::Query) -> Result<Option<Record>>;
}

/// Builds a fresh driver for the current filter; called on every restart.
pub trait DriverFactory {
    type Driver: Driver + 'static;

    fn create_driver(&self, filter: &FilterState) -> Self::Driver;
}
