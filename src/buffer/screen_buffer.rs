//! Windowed record cache over an append-only, id-ordered log table.
//!
//! The cache holds a contiguous run of [`Line`]s (records exploded on newline
//! boundaries) and a visible window of `page_size` lines starting at
//! `position`. Navigation only ever touches lines that are already buffered;
//! whenever the window comes within `low_buffer_threshold` lines of either
//! edge, the refill policy asks the fetch worker for another `buffer_size`
//! records in that direction.
//!
//! Concurrency: the line list, the window and the bottom-seen latch live
//! behind one `parking_lot::Mutex`. The worker signal (`stopped` / `invalid`)
//! has its own mutex and condition variable. Observer callbacks are always
//! invoked after the cache lock has been released, on whichever thread made
//! the change.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, bounded};
use log::debug;
use parking_lot::{Condvar, Mutex};

use super::driver::{Driver, FetchInstruction, Record};
use super::engine::EngineSlot;
use super::line::Line;
use crate::core::errors::{LvError, Result};

/// Multiplier applied to `page_size` for the default `buffer_size`.
const DEFAULT_BUFFER_PAGES: usize = 5;

/// Sizing and polling knobs for a [`ScreenBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Number of visible lines.
    pub page_size: usize,
    /// Records requested per refill; defaults to `5 * page_size`.
    pub buffer_size: Option<usize>,
    /// Slack that triggers a refill; defaults to `page_size`.
    pub low_buffer_threshold: Option<usize>,
    /// Tail re-poll interval once the newest record has been reached.
    pub timeout: Option<Duration>,
}

impl BufferConfig {
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            buffer_size: None,
            low_buffer_threshold: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    #[must_use]
    pub fn with_low_buffer_threshold(mut self, threshold: usize) -> Self {
        self.low_buffer_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Callback fired after a change to the visible window.
pub type Observer = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`ScreenBuffer::add_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

// ──────────────────── window ────────────────────

struct Window {
    lines: VecDeque<Line>,
    position: usize,
    page_size: usize,
    /// Follow the tail on append. Cleared while a start-date seek pass runs.
    auto_scroll: bool,
    /// The earliest matching record has been fetched.
    bottom_seen: bool,
}

impl Window {
    fn new(page_size: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            position: 0,
            page_size,
            auto_scroll: true,
            bottom_seen: false,
        }
    }

    fn max_position(&self) -> usize {
        self.lines.len().saturating_sub(self.page_size)
    }

    fn set_position(&mut self, pos: usize) {
        self.position = pos.min(self.max_position());
    }

    fn refill_instructions(&self, buffer_size: usize, threshold: usize) -> Vec<FetchInstruction> {
        let mut out = Vec::with_capacity(2);
        let (Some(first), Some(last)) = (self.lines.front(), self.lines.back()) else {
            return out;
        };
        let tail_reach = self
            .position
            .saturating_add(self.page_size)
            .saturating_add(threshold);
        if tail_reach >= self.lines.len() {
            out.push(FetchInstruction::forward(last.id(), buffer_size));
        }
        if self.position <= threshold && !self.bottom_seen {
            out.push(FetchInstruction::backward(Some(first.id()), buffer_size));
        }
        out
    }
}

// ──────────────────── worker signal ────────────────────

#[derive(Debug, Default)]
struct Signal {
    stopped: bool,
    invalid: bool,
}

/// What woke the fetch worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerEvent {
    Stop,
    Refill,
    Timeout,
}

// ──────────────────── shared state ────────────────────

/// State shared between the UI-facing handle and the fetch worker.
pub(crate) struct Inner {
    window: Mutex<Window>,
    signal: Mutex<Signal>,
    wakeup: Condvar,
    observers: Mutex<Vec<(ObserverId, Observer)>>,
    next_observer: AtomicU64,
    failure: Mutex<Option<LvError>>,
    buffer_size: usize,
    low_buffer_threshold: usize,
    timeout: Option<Duration>,
}

impl Inner {
    fn new(config: &BufferConfig) -> Self {
        Self {
            window: Mutex::new(Window::new(config.page_size)),
            signal: Mutex::new(Signal::default()),
            wakeup: Condvar::new(),
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(0),
            failure: Mutex::new(None),
            buffer_size: config
                .buffer_size
                .unwrap_or(config.page_size * DEFAULT_BUFFER_PAGES),
            low_buffer_threshold: config.low_buffer_threshold.unwrap_or(config.page_size),
            timeout: config.timeout,
        }
    }

    fn notify_observers(&self) {
        let snapshot: Vec<Observer> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in snapshot {
            observer();
        }
    }

    pub(crate) fn invalidate(&self) {
        let mut signal = self.signal.lock();
        signal.invalid = true;
        self.wakeup.notify_one();
    }

    /// Arm the signal for a fresh worker: not stopped, one refill owed.
    pub(crate) fn reset_for_start(&self) {
        {
            let mut signal = self.signal.lock();
            signal.stopped = false;
            signal.invalid = true;
        }
        self.window.lock().bottom_seen = false;
        *self.failure.lock() = None;
    }

    pub(crate) fn request_stop(&self) {
        let mut signal = self.signal.lock();
        signal.stopped = true;
        self.wakeup.notify_one();
    }

    fn stop_requested(&self) -> bool {
        self.signal.lock().stopped
    }

    /// Block until stop, invalidation or `timeout` elapses.
    pub(crate) fn wait_event(&self, timeout: Option<Duration>) -> WorkerEvent {
        let mut signal = self.signal.lock();
        while !(signal.stopped || signal.invalid) {
            match timeout {
                Some(limit) => {
                    if self.wakeup.wait_for(&mut signal, limit).timed_out()
                        && !(signal.stopped || signal.invalid)
                    {
                        return WorkerEvent::Timeout;
                    }
                }
                None => self.wakeup.wait(&mut signal),
            }
        }
        if signal.stopped {
            return WorkerEvent::Stop;
        }
        signal.invalid = false;
        WorkerEvent::Refill
    }

    pub(crate) fn record_failure(&self, err: LvError) {
        *self.failure.lock() = Some(err);
        self.notify_observers();
    }

    pub(crate) fn clear(&self) {
        let had_lines = {
            let mut window = self.window.lock();
            let had_lines = !window.lines.is_empty();
            window.lines.clear();
            window.position = 0;
            had_lines
        };
        if had_lines {
            self.notify_observers();
        }
    }

    fn append_record(&self, record: &Record) {
        let notify = {
            let mut window = self.window.lock();
            let old_len = window.lines.len();
            window.lines.extend(Line::explode(record));

            if old_len - window.position <= window.page_size && window.auto_scroll {
                let tail = window.max_position();
                window.set_position(tail);
                true
            } else {
                old_len < window.page_size
            }
        };
        if notify {
            self.notify_observers();
        }
    }

    fn prepend_record(&self, record: &Record) {
        let fragments: Vec<Line> = Line::explode(record).collect();
        let inserted = fragments.len();
        let notify = {
            let mut window = self.window.lock();
            let old_pos = window.position;
            for line in fragments.into_iter().rev() {
                window.lines.push_front(line);
            }
            window.set_position(old_pos + inserted);
            old_pos + inserted != window.position
        };
        if notify {
            self.notify_observers();
        }
    }

    fn move_position(&self, step: impl FnOnce(usize, usize) -> usize) {
        let changed = {
            let mut window = self.window.lock();
            let old = window.position;
            let target = step(old, window.page_size);
            window.set_position(target);
            old != window.position
        };
        self.invalidate();
        if changed {
            self.notify_observers();
        }
    }

    pub(crate) fn buffer_instructions<D: Driver>(
        &self,
        driver: &mut D,
    ) -> Result<Vec<FetchInstruction>> {
        let initial_count = {
            let window = self.window.lock();
            if !window.lines.is_empty() {
                return Ok(window.refill_instructions(self.buffer_size, self.low_buffer_threshold));
            }
            self.buffer_size + window.page_size
        };

        // The seek runs without the cache lock; only this worker mutates lines.
        let seed = if driver.has_start_date() {
            let mut query = driver.prepare_datetime_query()?;
            let first = driver.fetch_record(&mut query)?;
            if first.is_some() {
                while driver.fetch_record(&mut query)?.is_some() {}
            }
            first
        } else {
            None
        };

        Ok(match seed {
            Some(record) => {
                self.window.lock().auto_scroll = false;
                debug!("start date seek landed on record {}", record.id);
                vec![
                    FetchInstruction::forward(record.id - 1, initial_count),
                    FetchInstruction::backward(Some(record.id), self.buffer_size),
                ]
            }
            None => vec![FetchInstruction::backward(None, initial_count)],
        })
    }

    pub(crate) fn refill<D: Driver>(&self, driver: &mut D) -> Result<Option<Duration>> {
        let outcome = self
            .buffer_instructions(driver)
            .and_then(|instructions| self.run_instructions(driver, &instructions));
        self.window.lock().auto_scroll = true;
        outcome
    }

    fn run_instructions<D: Driver>(
        &self,
        driver: &mut D,
        instructions: &[FetchInstruction],
    ) -> Result<Option<Duration>> {
        let mut next_timeout = None;

        for instruction in instructions {
            debug!(
                "fetch anchor={:?} descending={} count={}",
                instruction.anchor, instruction.descending, instruction.count
            );
            let mut query =
                driver.prepare_query(instruction.anchor, instruction.descending, instruction.count)?;
            let mut remaining = instruction.count;
            while let Some(record) = driver.fetch_record(&mut query)? {
                remaining = remaining.saturating_sub(1);
                if instruction.descending {
                    self.prepend_record(&record);
                } else {
                    self.append_record(&record);
                }
                if self.stop_requested() {
                    debug!("stop requested mid-fetch, abandoning query");
                    return Ok(None);
                }
            }

            if instruction.descending && remaining > 0 {
                debug!("backward fetch short by {remaining}, bottom seen");
                self.window.lock().bottom_seen = true;
            }
            if (remaining > 0 && !instruction.descending) || instruction.anchor.is_none() {
                next_timeout = self.timeout;
            }
        }

        Ok(next_timeout)
    }
}

// ──────────────────── public handle ────────────────────

/// UI-facing windowed cache plus its background fetch engine.
///
/// Navigation is synchronous and never blocks on the backend. Each move
/// invalidates the cache so the worker (if running) re-evaluates the refill
/// policy. Dropping the buffer stops the worker.
pub struct ScreenBuffer {
    pub(crate) inner: Arc<Inner>,
    pub(crate) engine: Mutex<EngineSlot>,
}

impl ScreenBuffer {
    /// Empty cache with default buffer sizing for `page_size`.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self::with_config(&BufferConfig::new(page_size))
    }

    #[must_use]
    pub fn with_config(config: &BufferConfig) -> Self {
        Self {
            inner: Arc::new(Inner::new(config)),
            engine: Mutex::new(EngineSlot::default()),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    pub fn low_buffer_threshold(&self) -> usize {
        self.inner.low_buffer_threshold
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    pub fn page_size(&self) -> usize {
        self.inner.window.lock().page_size
    }

    /// Resize the visible window, keeping it inside the buffered lines.
    pub fn set_page_size(&self, page_size: usize) {
        let changed = {
            let mut window = self.inner.window.lock();
            let changed = window.page_size != page_size;
            window.page_size = page_size;
            if window.position + page_size > window.lines.len() {
                let pos = window.max_position();
                window.set_position(pos);
            }
            changed
        };
        self.inner.invalidate();
        if changed {
            self.inner.notify_observers();
        }
    }

    /// Offset of the first visible line.
    pub fn position(&self) -> usize {
        self.inner.window.lock().position
    }

    /// Number of buffered lines.
    pub fn line_count(&self) -> usize {
        self.inner.window.lock().lines.len()
    }

    /// Whether a backward fetch has already come back short.
    pub fn bottom_seen(&self) -> bool {
        self.inner.window.lock().bottom_seen
    }

    /// The visible lines, at most `page_size` of them. Never padded.
    pub fn current_lines(&self) -> Vec<Line> {
        let window = self.inner.window.lock();
        let end = (window.position + window.page_size).min(window.lines.len());
        window.lines.range(window.position..end).cloned().collect()
    }

    pub fn go_to_previous_line(&self) {
        self.inner.move_position(|pos, _| pos.saturating_sub(1));
    }

    pub fn go_to_next_line(&self) {
        self.inner.move_position(|pos, _| pos + 1);
    }

    pub fn go_to_previous_page(&self) {
        self.inner
            .move_position(|pos, page_size| pos.saturating_sub(page_size));
    }

    pub fn go_to_next_page(&self) {
        self.inner.move_position(|pos, page_size| pos + page_size);
    }

    /// Explode `record` and splice it after the newest buffered line.
    pub fn append_record(&self, record: &Record) {
        self.inner.append_record(record);
    }

    /// Explode `record` and splice it before the oldest buffered line,
    /// shifting `position` so the visible lines stay put.
    pub fn prepend_record(&self, record: &Record) {
        self.inner.prepend_record(record);
    }

    /// Drop every buffered line.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Wake the fetch worker for a refill check. No-op when idle.
    pub fn invalidate(&self) {
        self.inner.invalidate();
    }

    /// Register `observer`; it runs after every change to the visible window.
    pub fn add_observer(&self, observer: impl Fn() + Send + Sync + 'static) -> ObserverId {
        let id = ObserverId(self.inner.next_observer.fetch_add(1, Ordering::Relaxed));
        self.inner.observers.lock().push((id, Arc::new(observer)));
        id
    }

    /// Returns `false` when `id` was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.inner.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Register a depth-1 wake channel; redundant notifications coalesce.
    pub fn subscribe(&self) -> (ObserverId, Receiver<()>) {
        let (tx, rx) = bounded(1);
        let id = self.add_observer(move || {
            let _ = tx.try_send(());
        });
        (id, rx)
    }

    /// Refill instructions for the current window.
    ///
    /// On an empty cache with a start date configured this performs the
    /// datetime seek through `driver`.
    pub fn buffer_instructions<D: Driver>(&self, driver: &mut D) -> Result<Vec<FetchInstruction>> {
        self.inner.buffer_instructions(driver)
    }

    /// Run one refill pass synchronously. Returns the wait timeout the worker
    /// should use before the next pass.
    pub fn refill<D: Driver>(&self, driver: &mut D) -> Result<Option<Duration>> {
        self.inner.refill(driver)
    }

    /// Take the error that ended the last worker, if any.
    pub fn take_failure(&self) -> Option<LvError> {
        self.inner.failure.lock().take()
    }
}

impl Drop for ScreenBuffer {
    fn drop(&mut self) {
        self.stop();
    }
}
