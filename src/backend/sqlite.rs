//! SQLite connector: read-only driver for the viewer plus a small writer used
//! to create and seed log databases.
//!
//! Each prepared query is executed eagerly into a bounded queue (at most
//! `count` rows) which `fetch_record` drains one record at a time, so no
//! statement borrows outlive a single driver call.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use log::{debug, warn};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row, params};

use crate::buffer::driver::{Driver, DriverFactory, Record};
use crate::core::errors::{LvError, Result};
use crate::filter::{DATETIME_FORMAT, FilterState, QueryCompiler, is_plain_identifier};

/// How long a reader waits on a writer's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

// ──────────────────── driver ────────────────────

/// Rows of one executed query, drained front to back.
#[derive(Debug, Default)]
pub struct SqliteQuery {
    rows: VecDeque<Record>,
}

/// Read-only SQLite driver bound to one filter.
pub struct SqliteDriver {
    path: PathBuf,
    compiler: QueryCompiler,
    conn: Option<Connection>,
}

impl SqliteDriver {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, compiler: QueryCompiler) -> Self {
        Self {
            path: path.into(),
            compiler,
            conn: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn execute(&self, sql: &str) -> Result<SqliteQuery> {
        let conn = self.conn.as_ref().ok_or_else(|| LvError::Runtime {
            details: "sqlite driver is not connected".to_string(),
        })?;
        debug!("sqlite: {sql}");
        let mut stmt = conn.prepare(sql)?;
        let raw = stmt
            .query_map([], RawRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let rows = raw
            .into_iter()
            .map(RawRow::into_record)
            .collect::<Result<VecDeque<_>>>()?;
        Ok(SqliteQuery { rows })
    }
}

impl Driver for SqliteDriver {
    type Query = SqliteQuery;

    fn has_start_date(&self) -> bool {
        self.compiler.filter().start_date().is_some()
    }

    fn start_connection(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| LvError::Sql {
            context: "sqlite open",
            details: format!("{}: {e}", self.path.display()),
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn = Some(conn);
        Ok(())
    }

    fn stop_connection(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                warn!("sqlite: close failed for {}: {e}", self.path.display());
            }
        }
    }

    fn prepare_query(
        &mut self,
        anchor: Option<i64>,
        descending: bool,
        count: usize,
    ) -> Result<Self::Query> {
        let sql = self.compiler.fetch_query(anchor, descending, count);
        self.execute(&sql)
    }

    fn prepare_datetime_query(&mut self) -> Result<Self::Query> {
        let sql = self
            .compiler
            .datetime_query()
            .ok_or_else(|| LvError::Runtime {
                details: "datetime query requested without a start date".to_string(),
            })?;
        self.execute(&sql)
    }

    fn fetch_record(&mut self, query: &mut Self::Query) -> Result<Option<Record>> {
        Ok(query.rows.pop_front())
    }
}

/// Builds a [`SqliteDriver`] per filter change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteDriverFactory {
    path: PathBuf,
    table: String,
}

impl SqliteDriverFactory {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl DriverFactory for SqliteDriverFactory {
    type Driver = SqliteDriver;

    fn create_driver(&self, filter: &FilterState) -> SqliteDriver {
        SqliteDriver::new(&self.path, QueryCompiler::new(filter.clone(), &self.table))
    }
}

// ──────────────────── row decoding ────────────────────

struct RawRow {
    id: i64,
    facility: String,
    level: String,
    host: Option<String>,
    datetime: Option<String>,
    program: Option<String>,
    pid: Option<i64>,
    message: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            facility: code_text(row.get_ref(1)?),
            level: code_text(row.get_ref(2)?),
            host: row.get(3)?,
            datetime: row.get(4)?,
            program: row.get(5)?,
            pid: match row.get_ref(6)? {
                ValueRef::Integer(pid) => Some(pid),
                ValueRef::Text(raw) => std::str::from_utf8(raw).ok().and_then(|s| s.parse().ok()),
                _ => None,
            },
            message: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<Record> {
        let raw_datetime = self.datetime.unwrap_or_default();
        let datetime = parse_datetime(&raw_datetime).ok_or_else(|| LvError::RecordDecode {
            id: self.id,
            details: format!("unparseable datetime `{raw_datetime}`"),
        })?;
        Ok(Record {
            id: self.id,
            datetime,
            host: self.host.unwrap_or_default(),
            program: self.program.unwrap_or_default(),
            facility: self.facility,
            level: self.level,
            pid: self.pid,
            message: self.message.unwrap_or_default(),
        })
    }
}

/// Facility/level columns may be stored as integers or text.
fn code_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Integer(code) => code.to_string(),
        ValueRef::Text(raw) => String::from_utf8_lossy(raw).into_owned(),
        _ => String::new(),
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

// ──────────────────── writer ────────────────────

/// A new row for [`SqliteLogWriter::append`]; the id is assigned by SQLite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub datetime: NaiveDateTime,
    pub host: String,
    pub program: String,
    pub facility: u8,
    pub level: u8,
    pub pid: Option<i64>,
    pub message: String,
}

/// Creates the log table and appends rows (used by `init-db` and tests).
pub struct SqliteLogWriter {
    conn: Connection,
    table: String,
}

impl SqliteLogWriter {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        if !is_plain_identifier(table) {
            return Err(LvError::InvalidConfig {
                details: format!("table `{table}` is not a plain identifier"),
            });
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LvError::io(parent, source))?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        apply_pragmas(&conn)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                facility_num INTEGER,
                level_num INTEGER,
                host TEXT,
                datetime TEXT,
                program TEXT,
                pid INTEGER,
                message TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_datetime ON {table}(datetime);"
        ))?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    /// Insert one row and return its id.
    pub fn append(&self, entry: &LogEntry) -> Result<i64> {
        self.conn
            .prepare_cached(&format!(
                "INSERT INTO {} (facility_num, level_num, host, datetime, program, pid, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                self.table
            ))?
            .execute(params![
                entry.facility,
                entry.level,
                entry.host,
                entry.datetime.format(DATETIME_FORMAT).to_string(),
                entry.program,
                entry.pid,
                entry.message,
            ])?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert many rows in one transaction.
    pub fn append_all(&mut self, entries: &[LogEntry]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {} (facility_num, level_num, host, datetime, program, pid, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                self.table
            ))?;
            for entry in entries {
                stmt.execute(params![
                    entry.facility,
                    entry.level,
                    entry.host,
                    entry.datetime.format(DATETIME_FORMAT).to_string(),
                    entry.program,
                    entry.pid,
                    entry.message,
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;",
    )?;
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        warn!("sqlite: requested WAL mode but got '{mode}'");
    }
    Ok(())
}
