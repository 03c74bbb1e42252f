//! Core engine: the proof job and the timer loop that repeats it.

pub mod job;
pub mod status;

use std::future::Future;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::info;

pub use job::{scheduler_task, ConfigSource, Job};
pub use status::{RunStatus, StatusSnapshot};

/// Run `job` now and then every interval until `shutdown` resolves.
/// Returns the number of completed runs.
pub async fn run_on_timer<S>(job: Arc<Job>, shutdown: S) -> u64
where
    S: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(job.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(interval_secs = job.interval().as_secs(), "Entering timer loop. Press Ctrl+C to stop.");

    let mut runs = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                job.run_guarded().await;
                runs += 1;
            }
            _ = &mut shutdown => {
                info!(runs, "Shutdown signal received.");
                break;
            }
        }
    }
    runs
}
