//! Fire-once timers for turn and room timeouts.
//!
//! A [`Timer`] holds a duration and an action. [`Timer::start`] spawns a
//! task that sleeps and then runs the action once; [`Timer::stop`] aborts
//! that task. Starting an armed timer re-arms it from scratch. Dropping a
//! timer stops it, so a discarded timer can never fire late.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;

type Action = Arc<dyn Fn() + Send + Sync>;

pub struct Timer {
    duration: Duration,
    action: Action,
    task: Option<AbortHandle>,
}

impl Timer {
    /// Creates an unarmed timer.
    pub fn new(duration: Duration, action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            duration,
            action: Arc::new(action),
            task: None,
        }
    }

    /// Arms the timer, cancelling any pending expiry first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        self.stop();
        let action = Arc::clone(&self.action);
        let duration = self.duration;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            action();
        });
        self.task = Some(handle.abort_handle());
    }

    /// Cancels a pending expiry. No-op if the timer isn't armed.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether the timer is armed and hasn't fired yet.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("duration", &self.duration)
            .field("running", &self.is_running())
            .finish()
    }
}
