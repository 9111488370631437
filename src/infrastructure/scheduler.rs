use crate::domain::ports::{ScheduledTask, Scheduler, Task};
use std::time::Duration;
use tokio::time::Instant;

/// Schedules deferred tasks on the ambient tokio runtime.
///
/// The deadline is fixed when `schedule` is called, not when the spawned task
/// is first polled, so a paused test clock can be advanced right after
/// scheduling.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> ScheduledTask {
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            task.await;
        });
        ScheduledTask::new(handle.abort_handle())
    }
}
