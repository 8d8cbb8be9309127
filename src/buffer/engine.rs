//! Background fetch engine: at most one worker thread owns the driver.
//!
//! Lifecycle: `Idle` → `start` → `Running` → `stop` → `Stopping` → `Idle`.
//! The worker sleeps on the cache's condition variable until the UI
//! invalidates the window, a stop is requested, or the tail poll timeout
//! fires. A failed connect or fetch ends the worker; the error is kept for
//! [`ScreenBuffer::take_failure`] and the engine reports `Idle` again.

use std::sync::Arc;
use std::thread;

use log::{debug, error, warn};

use super::driver::Driver;
use super::screen_buffer::{Inner, ScreenBuffer, WorkerEvent};
use crate::core::errors::{LvError, Result};

/// Observable state of the fetch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No driver attached.
    Idle,
    /// Worker thread active.
    Running,
    /// Stop requested; waiting for the worker to disconnect and exit.
    Stopping,
}

#[derive(Debug)]
pub(crate) struct EngineSlot {
    state: EngineState,
    worker: Option<thread::JoinHandle<()>>,
}

impl Default for EngineSlot {
    fn default() -> Self {
        Self {
            state: EngineState::Idle,
            worker: None,
        }
    }
}

impl EngineSlot {
    /// Reap a worker that exited on its own after a failure.
    fn reap_finished(&mut self) {
        if self.state == EngineState::Running
            && self
                .worker
                .as_ref()
                .is_some_and(thread::JoinHandle::is_finished)
        {
            if let Some(handle) = self.worker.take() {
                if handle.join().is_err() {
                    error!("fetch worker panicked");
                }
            }
            self.state = EngineState::Idle;
        }
    }
}

impl ScreenBuffer {
    /// Current engine state.
    pub fn state(&self) -> EngineState {
        let mut slot = self.engine.lock();
        slot.reap_finished();
        slot.state
    }

    /// Attach `driver` and launch the worker.
    ///
    /// The worker clears the cache, connects, and immediately runs a first
    /// refill pass. Fails with [`LvError::AlreadyRunning`] when a worker is
    /// already attached.
    pub fn start<D: Driver + 'static>(&self, driver: D) -> Result<()> {
        let mut slot = self.engine.lock();
        slot.reap_finished();
        if slot.state != EngineState::Idle {
            return Err(LvError::AlreadyRunning);
        }

        self.inner.reset_for_start();
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("logview-fetch".to_string())
            .spawn(move || worker_main(&inner, driver))
            .map_err(|source| LvError::Runtime {
                details: format!("failed to spawn fetch worker: {source}"),
            })?;

        slot.worker = Some(handle);
        slot.state = EngineState::Running;
        debug!("fetch engine started");
        Ok(())
    }

    /// Signal the worker and block until it has disconnected and exited.
    /// No-op when nothing is running.
    pub fn stop(&self) {
        let handle = {
            let mut slot = self.engine.lock();
            let handle = slot.worker.take();
            if handle.is_some() {
                slot.state = EngineState::Stopping;
            }
            handle
        };

        self.inner.request_stop();
        let Some(handle) = handle else {
            return;
        };
        if handle.join().is_err() {
            error!("fetch worker panicked");
        }
        self.engine.lock().state = EngineState::Idle;
        debug!("fetch engine stopped");
    }

    /// `stop` followed by `start` with a fresh driver.
    pub fn restart<D: Driver + 'static>(&self, driver: D) -> Result<()> {
        self.stop();
        self.start(driver)
    }
}

fn worker_main<D: Driver>(inner: &Inner, mut driver: D) {
    inner.clear();
    if let Err(err) = driver.start_connection() {
        error!("fetch worker: connection failed: {err}");
        inner.record_failure(err);
        return;
    }
    debug!("fetch worker: connected");

    let mut timeout = None;
    loop {
        match inner.wait_event(timeout) {
            WorkerEvent::Stop => break,
            WorkerEvent::Refill | WorkerEvent::Timeout => match inner.refill(&mut driver) {
                Ok(next) => timeout = next,
                Err(err) => {
                    warn!("fetch worker: refill failed, exiting: {err}");
                    inner.record_failure(err);
                    break;
                }
            },
        }
    }

    driver.stop_connection();
    debug!("fetch worker: disconnected");
}
