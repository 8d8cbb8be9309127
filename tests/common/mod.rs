#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use parking_lot::Mutex;

use logview::buffer::{Driver, Record, ScreenBuffer};
use logview::core::errors::{LvError, Result};

// ──────────────────── fake driver ────────────────────

/// Shared counters observed by the test while the worker owns the driver.
#[derive(Debug, Default)]
pub struct DriverProbe {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    calls: Mutex<Vec<(Option<i64>, bool, usize)>>,
}

impl DriverProbe {
    /// Connections currently open across every driver sharing this probe.
    pub fn live(&self) -> usize {
        self.connects.load(Ordering::SeqCst) - self.disconnects.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(Option<i64>, bool, usize)> {
        self.calls.lock().clone()
    }
}

/// Serves ids `1..=last_id`. `last_id` is shared so tests can grow the table.
pub struct FakeDriver {
    pub last_id: Arc<AtomicI64>,
    pub probe: Arc<DriverProbe>,
    pub start_id: Option<i64>,
    pub fail_connect: bool,
    pub fail_queries: bool,
}

impl FakeDriver {
    pub fn new(last_id: i64) -> Self {
        Self {
            last_id: Arc::new(AtomicI64::new(last_id)),
            probe: Arc::new(DriverProbe::default()),
            start_id: None,
            fail_connect: false,
            fail_queries: false,
        }
    }

    /// A second driver over the same table and counters.
    pub fn sibling(&self) -> Self {
        Self {
            last_id: Arc::clone(&self.last_id),
            probe: Arc::clone(&self.probe),
            start_id: self.start_id,
            fail_connect: false,
            fail_queries: false,
        }
    }
}

pub fn record(id: i64) -> Record {
    Record {
        id,
        datetime: NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap(),
        host: "oasis".to_string(),
        program: "test".to_string(),
        facility: "1".to_string(),
        level: "6".to_string(),
        pid: Some(id),
        message: id.to_string(),
    }
}

impl Driver for FakeDriver {
    type Query = VecDeque<Record>;

    fn has_start_date(&self) -> bool {
        self.start_id.is_some()
    }

    fn start_connection(&mut self) -> Result<()> {
        if self.fail_connect {
            return Err(LvError::Sql {
                context: "fake connect",
                details: "connection refused".to_string(),
            });
        }
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop_connection(&mut self) {
        self.probe.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn prepare_query(
        &mut self,
        anchor: Option<i64>,
        descending: bool,
        count: usize,
    ) -> Result<Self::Query> {
        self.probe.calls.lock().push((anchor, descending, count));
        if self.fail_queries {
            return Err(LvError::Sql {
                context: "fake query",
                details: "server has gone away".to_string(),
            });
        }
        let last = self.last_id.load(Ordering::SeqCst);
        let ids: Vec<i64> = match (anchor, descending) {
            (None, _) => (1..=last).rev().take(count).collect(),
            (Some(a), true) => (1..a.min(last + 1)).rev().take(count).collect(),
            (Some(a), false) => ((a + 1)..=last).take(count).collect(),
        };
        Ok(ids.into_iter().map(record).collect())
    }

    fn prepare_datetime_query(&mut self) -> Result<Self::Query> {
        let last = self.last_id.load(Ordering::SeqCst);
        Ok(self
            .start_id
            .filter(|id| *id <= last)
            .map(record)
            .into_iter()
            .collect())
    }

    fn fetch_record(&mut self, query: &mut Self::Query) -> Result<Option<Record>> {
        Ok(query.pop_front())
    }
}

// ──────────────────── helpers ────────────────────

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

pub fn visible_ids(buffer: &ScreenBuffer) -> Vec<i64> {
    buffer.current_lines().iter().map(|line| line.id()).collect()
}

// ──────────────────── CLI runner ────────────────────

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Run the `logview` binary with an isolated config home; the transcript is
/// written to a per-case log for post-mortems.
pub fn run_cli_case(case_name: &str, config_home: &std::path::Path, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("logview-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = PathBuf::from(
        option_env!("CARGO_BIN_EXE_logview").expect("logview binary requires the `cli` feature"),
    );

    let output = Command::new(&bin_path)
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("LOGVIEW_TIMEOUT_SECS")
        .env_remove("LOGVIEW_BACKEND")
        .env_remove("LOGVIEW_SQLITE_PATH")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute logview command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let log_content = format!(
        "case={case_name}\nbin={}\nargs={args:?}\nstatus={}\n----- stdout -----\n{stdout}\n----- stderr -----\n{stderr}\n",
        bin_path.display(),
        output.status,
    );
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
