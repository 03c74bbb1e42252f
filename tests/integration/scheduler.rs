//! Scheduler behaviour under paused time: cadence, stop predicate,
//! persisted state and shutdown.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use por_runner::scheduler::{is_timeout_error, Scheduler, SchedulerState, StopReason, TaskFuture};
use por_runner::storage;
use por_runner::types::{ErrorData, PorError};

const INTERVAL: Duration = Duration::from_secs(60);

fn temp_state_file() -> PathBuf {
    std::env::temp_dir().join(format!("por_scheduler_{}.json", uuid::Uuid::new_v4()))
}

/// A task that fails according to `outcome(call_number)` and counts calls.
fn scripted(
    calls: Arc<AtomicUsize>,
    outcome: fn(usize) -> Result<(), PorError>,
) -> impl FnMut() -> TaskFuture + Send {
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let fut: TaskFuture = Box::pin(async move { outcome(n) });
        fut
    }
}

fn timeout() -> PorError {
    PorError::remote("proof generation timed out", Some(ErrorData::timeout()))
}

fn never() -> std::future::Pending<()> {
    std::future::pending()
}

#[tokio::test(start_paused = true)]
async fn test_halts_on_timeout_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let task = scripted(calls.clone(), |n| if n == 3 { Err(timeout()) } else { Ok(()) });

    let outcome = assert_ok!(Scheduler::new(task, INTERVAL).stop_when(is_timeout_error).run(never()).await);

    assert_eq!(outcome.runs, 3);
    match outcome.reason {
        StopReason::Halted(e) => assert_eq!(e.data().map(|d| d.code.as_str()), Some("timeout")),
        other => panic!("expected halt, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_other_errors_keep_running() {
    let calls = Arc::new(AtomicUsize::new(0));
    let task = scripted(calls.clone(), |_| {
        Err(PorError::remote("bad signature", Some(ErrorData::new("invalid_request"))))
    });

    let outcome = assert_ok!(
        Scheduler::new(task, INTERVAL)
            .stop_when(is_timeout_error)
            .with_max_runs(4)
            .run(never())
            .await
    );

    assert_eq!(outcome.runs, 4);
    assert!(matches!(outcome.reason, StopReason::MaxRuns));
}

#[tokio::test(start_paused = true)]
async fn test_runs_are_spaced_by_interval() {
    let stamps: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = stamps.clone();
    let task = move || {
        recorded.lock().unwrap().push(Instant::now());
        let fut: TaskFuture = Box::pin(async { Ok(()) });
        fut
    };

    let start = Instant::now();
    assert_ok!(Scheduler::new(task, INTERVAL).with_max_runs(3).run(never()).await);

    let stamps = stamps.lock().unwrap();
    assert_eq!(stamps.len(), 3);
    // First run is immediate.
    assert_eq!(stamps[0] - start, Duration::ZERO);
    assert_eq!(stamps[1] - stamps[0], INTERVAL);
    assert_eq!(stamps[2] - stamps[1], INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_long_run_skips_missed_ticks() {
    let stamps: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = stamps.clone();
    let task = move || {
        recorded.lock().unwrap().push(Instant::now());
        let first = recorded.lock().unwrap().len() == 1;
        let fut: TaskFuture = Box::pin(async move {
            if first {
                tokio::time::sleep(INTERVAL * 3 + Duration::from_secs(5)).await;
            }
            Ok(())
        });
        fut
    };

    assert_ok!(Scheduler::new(task, INTERVAL).with_max_runs(2).run(never()).await);

    let stamps = stamps.lock().unwrap();
    // The second run starts as soon as the long first run ends, not three times.
    assert_eq!(stamps[1] - stamps[0], INTERVAL * 3 + Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_between_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let task = scripted(calls.clone(), |_| Ok(()));

    let shutdown = tokio::time::sleep(INTERVAL * 3 + Duration::from_secs(1));
    let outcome = assert_ok!(Scheduler::new(task, INTERVAL).run(shutdown).await);

    // Runs at 0, 60, 120 and 180 seconds.
    assert_eq!(outcome.runs, 4);
    assert!(matches!(outcome.reason, StopReason::Shutdown));
}

#[tokio::test(start_paused = true)]
async fn test_state_file_is_written_after_each_run() {
    let path = temp_state_file();
    let calls = Arc::new(AtomicUsize::new(0));
    let task = scripted(calls.clone(), |n| {
        if n == 2 {
            Err(PorError::remote("exchange unavailable", None))
        } else {
            Ok(())
        }
    });

    assert_ok!(
        Scheduler::new(task, INTERVAL)
            .with_state_file(&path)
            .with_max_runs(2)
            .run(never())
            .await
    );

    let state: SchedulerState = assert_ok!(storage::load_json(&path)).unwrap();
    assert_eq!(state.run_count, 2);
    assert_eq!(state.failure_count, 1);
    assert!(state.last_run_at.is_some());
    assert!(state.next_run_at.is_some());
    assert!(state.last_error.unwrap().contains("exchange unavailable"));
    assert!(!state.halted);

    storage::delete_file(&path).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_counters_survive_restart() {
    let path = temp_state_file();

    let first = scripted(Arc::new(AtomicUsize::new(0)), |_| Ok(()));
    assert_ok!(
        Scheduler::new(first, INTERVAL)
            .with_state_file(&path)
            .with_max_runs(2)
            .run(never())
            .await
    );

    let second = scripted(Arc::new(AtomicUsize::new(0)), |_| Ok(()));
    assert_ok!(
        Scheduler::new(second, INTERVAL)
            .with_state_file(&path)
            .with_max_runs(1)
            .run(never())
            .await
    );

    let state: SchedulerState = storage::load_json(&path).unwrap().unwrap();
    assert_eq!(state.run_count, 3);
    assert_eq!(state.failure_count, 0);

    storage::delete_file(&path).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_halted_state_is_persisted_and_cleared_on_restart() {
    let path = temp_state_file();

    let failing = scripted(Arc::new(AtomicUsize::new(0)), |_| Err(timeout()));
    let outcome = assert_ok!(
        Scheduler::new(failing, INTERVAL)
            .with_state_file(&path)
            .stop_when(is_timeout_error)
            .run(never())
            .await
    );
    assert!(matches!(outcome.reason, StopReason::Halted(_)));

    let state: SchedulerState = storage::load_json(&path).unwrap().unwrap();
    assert!(state.halted);
    assert!(state.next_run_at.is_none());

    let healthy = scripted(Arc::new(AtomicUsize::new(0)), |_| Ok(()));
    assert_ok!(
        Scheduler::new(healthy, INTERVAL)
            .with_state_file(&path)
            .stop_when(is_timeout_error)
            .with_max_runs(1)
            .run(never())
            .await
    );

    let state: SchedulerState = storage::load_json(&path).unwrap().unwrap();
    assert!(!state.halted);
    assert_eq!(state.run_count, 2);
    assert!(state.last_error.is_none());

    storage::delete_file(&path).unwrap();
}

#[tokio::test]
async fn test_corrupt_state_file_is_an_error() {
    let path = temp_state_file();
    std::fs::write(&path, "not json").unwrap();

    let task = scripted(Arc::new(AtomicUsize::new(0)), |_| Ok(()));
    let result = Scheduler::new(task, INTERVAL).with_state_file(&path).run(never()).await;
    assert_err!(result);

    storage::delete_file(&path).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_huge_interval_does_not_overflow() {
    let path = temp_state_file();
    let task = scripted(Arc::new(AtomicUsize::new(0)), |_| Ok(()));

    let outcome = assert_ok!(
        Scheduler::new(task, Duration::from_secs(u64::MAX))
            .with_state_file(&path)
            .with_max_runs(1)
            .run(never())
            .await
    );
    assert_eq!(outcome.runs, 1);

    let state: SchedulerState = storage::load_json(&path).unwrap().unwrap();
    assert!(state.next_run_at.is_some());

    storage::delete_file(&path).unwrap();
}
