//! Fetch engine integration tests: the background worker driving a
//! `ScreenBuffer` through the public API only.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FakeDriver, visible_ids, wait_until};
use logview::buffer::{BufferConfig, EngineState, ScreenBuffer};
use logview::core::errors::LvError;

fn small_buffer() -> ScreenBuffer {
    ScreenBuffer::with_config(&BufferConfig::new(2).with_buffer_size(5))
}

#[test]
fn opens_at_tail_and_pages_back_inside_buffer() {
    let buffer = small_buffer();
    let driver = FakeDriver::new(100);
    let probe = Arc::clone(&driver.probe);

    buffer.start(driver).unwrap();
    wait_until("initial fetch", || buffer.line_count() == 7);
    assert_eq!(visible_ids(&buffer), vec![99, 100]);
    assert_eq!(probe.calls(), vec![(None, true, 7)]);

    buffer.go_to_previous_page();
    assert_eq!(visible_ids(&buffer), vec![97, 98]);

    // The move re-arms the tail check only; nothing older is requested.
    wait_until("tail check", || probe.calls().len() == 2);
    assert_eq!(probe.calls()[1], (Some(100), false, 5));
    assert_eq!(buffer.line_count(), 7);
    assert_eq!(visible_ids(&buffer), vec![97, 98]);

    buffer.stop();
}

#[test]
fn stop_without_start_is_a_noop() {
    let buffer = small_buffer();
    buffer.stop();
    buffer.stop();
    assert_eq!(buffer.state(), EngineState::Idle);
}

#[test]
fn second_start_is_rejected() {
    let buffer = small_buffer();
    let driver = FakeDriver::new(10);
    let second = driver.sibling();
    let probe = Arc::clone(&driver.probe);

    buffer.start(driver).unwrap();
    let err = buffer.start(second).unwrap_err();
    assert!(matches!(err, LvError::AlreadyRunning));
    assert_eq!(buffer.state(), EngineState::Running);

    buffer.stop();
    assert_eq!(buffer.state(), EngineState::Idle);
    assert_eq!(probe.connects.load(Ordering::SeqCst), 1);
    assert_eq!(probe.live(), 0);
}

#[test]
fn restart_swaps_drivers_cleanly() {
    let buffer = small_buffer();
    let first = FakeDriver::new(50);
    let second = first.sibling();
    let probe = Arc::clone(&first.probe);

    buffer.start(first).unwrap();
    wait_until("first driver connected", || probe.live() == 1);

    buffer.restart(second).unwrap();
    assert_eq!(buffer.state(), EngineState::Running);
    wait_until("second driver connected", || {
        probe.connects.load(Ordering::SeqCst) == 2
    });
    assert_eq!(probe.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(probe.live(), 1);
    wait_until("refilled after restart", || visible_ids(&buffer) == vec![49, 50]);

    buffer.stop();
    assert_eq!(probe.live(), 0);
}

#[test]
fn restart_clears_bottom_seen() {
    let buffer = small_buffer();
    buffer.start(FakeDriver::new(3)).unwrap();
    wait_until("short table exhausted", || buffer.bottom_seen());
    assert_eq!(visible_ids(&buffer), vec![2, 3]);

    let larger = FakeDriver::new(100);
    let probe = Arc::clone(&larger.probe);
    buffer.restart(larger).unwrap();
    assert!(!buffer.bottom_seen());
    wait_until("refilled after restart", || buffer.line_count() == 7);
    assert!(!buffer.bottom_seen());
    assert_eq!(visible_ids(&buffer), vec![99, 100]);

    buffer.go_to_previous_page();
    buffer.go_to_previous_page();
    wait_until("backward fetch after restart", || {
        probe.calls().iter().any(|call| *call == (Some(94), true, 5))
    });
    buffer.stop();
}

#[test]
fn stop_returns_after_disconnect() {
    let buffer = small_buffer();
    let driver = FakeDriver::new(10);
    let probe = Arc::clone(&driver.probe);

    buffer.start(driver).unwrap();
    wait_until("connected", || probe.live() == 1);
    buffer.stop();
    assert_eq!(probe.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(buffer.state(), EngineState::Idle);
}

#[test]
fn connection_failure_is_reported_and_engine_idles() {
    let buffer = small_buffer();
    let (_, wake) = buffer.subscribe();
    let mut driver = FakeDriver::new(10);
    driver.fail_connect = true;

    buffer.start(driver).unwrap();
    wake.recv_timeout(Duration::from_secs(5)).unwrap();
    wait_until("worker exit", || buffer.state() == EngineState::Idle);

    let failure = buffer.take_failure().unwrap();
    assert_eq!(failure.code(), "LV-2001");
    assert!(buffer.take_failure().is_none());
    assert_eq!(buffer.line_count(), 0);
}

#[test]
fn fetch_failure_disconnects_and_allows_restart() {
    let buffer = small_buffer();
    let mut broken = FakeDriver::new(10);
    broken.fail_queries = true;
    let healthy = broken.sibling();
    let probe = Arc::clone(&broken.probe);

    buffer.start(broken).unwrap();
    wait_until("worker exit", || buffer.state() == EngineState::Idle);
    assert_eq!(probe.disconnects.load(Ordering::SeqCst), 1);
    assert!(buffer.take_failure().is_some());

    buffer.restart(healthy).unwrap();
    wait_until("recovered", || visible_ids(&buffer) == vec![9, 10]);
    buffer.stop();
}

#[test]
fn tail_is_polled_on_timeout() {
    let buffer = ScreenBuffer::with_config(
        &BufferConfig::new(2)
            .with_buffer_size(5)
            .with_timeout(Some(Duration::from_millis(20))),
    );
    let driver = FakeDriver::new(100);
    let last_id = Arc::clone(&driver.last_id);

    buffer.start(driver).unwrap();
    wait_until("initial page", || visible_ids(&buffer) == vec![99, 100]);

    last_id.store(102, Ordering::SeqCst);
    wait_until("new records at tail", || visible_ids(&buffer) == vec![101, 102]);
    buffer.stop();
}

#[test]
fn navigation_wakes_worker_for_older_records() {
    let buffer = ScreenBuffer::with_config(
        &BufferConfig::new(2)
            .with_buffer_size(4)
            .with_low_buffer_threshold(1),
    );
    let driver = FakeDriver::new(100);
    let probe = Arc::clone(&driver.probe);

    buffer.start(driver).unwrap();
    wait_until("initial fetch", || buffer.line_count() == 6);
    assert_eq!(visible_ids(&buffer), vec![99, 100]);

    buffer.go_to_previous_page();
    buffer.go_to_previous_page();
    wait_until("backward refill", || {
        probe.calls().iter().any(|call| *call == (Some(95), true, 4))
    });
    wait_until("older lines buffered", || buffer.line_count() == 10);
    assert_eq!(visible_ids(&buffer), vec![95, 96]);
    buffer.stop();
}

#[test]
fn start_date_opens_window_at_seek_target() {
    let buffer = small_buffer();
    let mut driver = FakeDriver::new(100);
    driver.start_id = Some(40);

    buffer.start(driver).unwrap();
    wait_until("seek page", || visible_ids(&buffer) == vec![40, 41]);
    buffer.stop();
}

#[test]
fn observers_see_worker_updates() {
    let buffer = small_buffer();
    let (id, wake) = buffer.subscribe();
    buffer.start(FakeDriver::new(20)).unwrap();

    wake.recv_timeout(Duration::from_secs(5)).unwrap();
    wait_until("page", || visible_ids(&buffer) == vec![19, 20]);
    assert!(buffer.remove_observer(id));
    buffer.stop();
}

#[test]
fn dropping_buffer_stops_worker() {
    let driver = FakeDriver::new(10);
    let probe = Arc::clone(&driver.probe);
    {
        let buffer = small_buffer();
        buffer.start(driver).unwrap();
        wait_until("connected", || probe.live() == 1);
    }
    assert_eq!(probe.live(), 0);
}
