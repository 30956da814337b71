// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the staged scheduler

use agecam::AgeError;
use agecam::pipelines::dispatch::{Context, current_context};
use agecam::pipelines::scheduler::run_in_background;
use agecam::pipelines::{Dispatcher, ForegroundLoop, StageResult, StagedScheduler, TaskOutcome};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(10);

fn setup() -> (tokio::runtime::Runtime, Dispatcher, ForegroundLoop) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let (dispatcher, foreground) = Dispatcher::new(rt.handle().clone());
    (rt, dispatcher, foreground)
}

type Log = Arc<Mutex<Vec<(u32, Option<Context>)>>>;

fn logging_task(log: &Log, last: u32) -> impl FnMut(u32) -> StageResult + Send + 'static {
    let log = Arc::clone(log);
    move |stage| {
        log.lock().push((stage, current_context()));
        if stage == last {
            StageResult::Done
        } else {
            StageResult::Continue
        }
    }
}

#[test]
fn test_four_stages_alternate_contexts() {
    let (_rt, dispatcher, mut foreground) = setup();
    let log: Log = Arc::default();

    let mut scheduler = StagedScheduler::new("four", dispatcher, logging_task(&log, 3));
    let mut outcome = scheduler.start().unwrap();
    let outcome = foreground.wait_for_timeout(&mut outcome, WAIT).unwrap();

    assert_eq!(outcome, TaskOutcome::Completed { stages: 4 });
    assert_eq!(
        *log.lock(),
        vec![
            (0, Some(Context::Background)),
            (1, Some(Context::Foreground)),
            (2, Some(Context::Background)),
            (3, Some(Context::Foreground)),
        ]
    );
}

#[test]
fn test_runaway_task_fails_at_stage_ceiling() {
    let (_rt, dispatcher, mut foreground) = setup();
    let log: Log = Arc::default();

    let mut scheduler = StagedScheduler::new("forever", dispatcher, logging_task(&log, u32::MAX));
    let mut outcome = scheduler.start().unwrap();
    let err = foreground.wait_for_timeout(&mut outcome, WAIT).unwrap_err();

    assert_eq!(err, AgeError::RunawayTask { limit: 100 });
    let log = log.lock();
    assert_eq!(log.len(), 100);
    assert_eq!(log.last().map(|entry| entry.0), Some(99));
}

#[test]
fn test_abort_stops_scheduling() {
    let (_rt, dispatcher, mut foreground) = setup();
    let log: Log = Arc::default();
    let inner = Arc::clone(&log);

    let mut scheduler = StagedScheduler::new("abort", dispatcher, move |stage: u32| {
        inner.lock().push((stage, current_context()));
        if stage == 2 {
            StageResult::Abort
        } else {
            StageResult::Continue
        }
    });
    let mut outcome = scheduler.start().unwrap();
    let outcome = foreground.wait_for_timeout(&mut outcome, WAIT).unwrap();

    assert_eq!(outcome, TaskOutcome::Aborted { stage: 2 });
    // Nothing else runs afterwards
    std::thread::sleep(Duration::from_millis(50));
    foreground.pump();
    assert_eq!(log.lock().len(), 3);
}

#[test]
fn test_start_twice_fails() {
    let (_rt, dispatcher, _foreground) = setup();
    let mut scheduler = StagedScheduler::new("once", dispatcher, |_: u32| StageResult::Done);
    assert!(!scheduler.is_started());
    let _first = scheduler.start().unwrap();
    assert!(scheduler.is_started());
    assert!(matches!(scheduler.start(), Err(AgeError::InvalidState(_))));
    assert!(matches!(scheduler.set_stage_delay(5), Err(AgeError::InvalidState(_))));
}

#[test]
fn test_outcome_arrives_on_foreground_after_background_stage() {
    let (_rt, dispatcher, mut foreground) = setup();
    // A single background stage finishes the task; delivery still waits for the loop
    let mut scheduler = StagedScheduler::new("short", dispatcher, |_: u32| StageResult::Done);
    let mut outcome = scheduler.start().unwrap();

    std::thread::sleep(Duration::from_millis(50));
    assert!(!outcome.is_ready());
    let outcome = foreground.wait_for_timeout(&mut outcome, WAIT).unwrap();
    assert_eq!(outcome, TaskOutcome::Completed { stages: 1 });
}

#[test]
fn test_stage_delay_is_applied() {
    let (_rt, dispatcher, mut foreground) = setup();
    let log: Log = Arc::default();

    let mut scheduler = StagedScheduler::new("slow", dispatcher, logging_task(&log, 2));
    scheduler.set_stage_delay(20).unwrap();
    let start = Instant::now();
    let mut outcome = scheduler.start().unwrap();
    foreground.wait_for_timeout(&mut outcome, WAIT).unwrap();

    // Two delayed transitions, each at least 0.6 x 20ms
    assert!(start.elapsed() >= Duration::from_millis(24));
    assert_eq!(log.lock().len(), 3);
}

#[test]
fn test_run_in_background() {
    let (_rt, dispatcher, mut foreground) = setup();
    let mut result = run_in_background("answer", dispatcher, 0, || {
        assert_eq!(current_context(), Some(Context::Background));
        Ok(42)
    })
    .unwrap();
    assert_eq!(foreground.wait_for_timeout(&mut result, WAIT).unwrap(), 42);
}

#[test]
fn test_panicking_stage_disconnects() {
    let (_rt, dispatcher, mut foreground) = setup();
    let mut scheduler = StagedScheduler::new("panics", dispatcher, |_: u32| -> StageResult {
        panic!("stage blew up")
    });
    let mut outcome = scheduler.start().unwrap();
    let err = foreground.wait_for_timeout(&mut outcome, WAIT).unwrap_err();
    assert!(matches!(err, AgeError::Disconnected(_)));
}
