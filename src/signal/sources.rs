use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::controller::{AbortController, AbortSignal};
use super::reason::AbortReason;

/// A timer-backed signal. The timer task keeps the signal alive until it
/// fires; dropping the `Timer` cancels the task, after which the signal never
/// aborts.
#[derive(Debug)]
pub struct Timer {
    signal: AbortSignal,
    task: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn start_timer(after: Duration, reason: AbortReason) -> Timer {
    let controller = AbortController::new();
    let signal = controller.signal();
    let task = tokio::spawn(async move {
        tokio::time::sleep(after).await;
        controller.abort(reason);
    });

    Timer {
        signal,
        task: Some(task),
    }
}

/// Timer that aborts with [`AbortReason::TimedOut`] after `duration`.
/// Must be called from within a tokio runtime.
pub fn timeout(duration: Duration) -> Timer {
    start_timer(duration, AbortReason::TimedOut(duration))
}

/// Timer that aborts with [`AbortReason::DeadlineReached`] at `at`.
/// A deadline in the past yields an already aborted signal.
pub fn deadline(at: DateTime<Utc>) -> Timer {
    match (at - Utc::now()).to_std() {
        Ok(remaining) if !remaining.is_zero() => {
            start_timer(remaining, AbortReason::DeadlineReached(at))
        }
        _ => Timer {
            signal: AbortSignal::already_aborted(AbortReason::DeadlineReached(at)),
            task: None,
        },
    }
}

/// Signal that aborts with [`AbortReason::Interrupted`] on Ctrl-C.
pub fn interrupt() -> AbortSignal {
    let controller = AbortController::new();
    let signal = controller.signal();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::warn!("Interrupt received, aborting");
                controller.abort(AbortReason::Interrupted);
            }
            Err(e) => log::error!("Failed to listen for interrupt: {}", e),
        }
    });

    signal
}
