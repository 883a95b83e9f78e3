use std::{
    fs::OpenOptions,
    io,
    path::Path,
    process::{Child, Command as StdCommand, Stdio},
    sync::Arc,
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{
    executor::{OnFail, Outcome, TrackedProcess},
    signal::{AbortController, AbortReason, AbortSignal},
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs `sh -c cmd` until it exits or `guard` aborts.
///
/// A non-zero exit with [`OnFail::Abort`] aborts `failure`, which the caller
/// usually folds into the guard of every later step.
pub fn spawn(
    cmd: &str,
    step_index: usize,
    on_fail: OnFail,
    guard: AbortSignal,
    failure: AbortController,
    artifacts_dir: &Path,
) -> io::Result<TrackedProcess> {
    let stdout_path = artifacts_dir.join(format!("step_{:03}_stdout.log", step_index));
    let stderr_path = artifacts_dir.join(format!("step_{:03}_stderr.log", step_index));

    let stdout_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&stdout_path)?;

    let stderr_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&stderr_path)?;

    log::info!("Executing shell command (step {}): {}", step_index, cmd);

    let child = StdCommand::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file))
        .spawn()?;

    log::info!("Step {} spawned (PID: {})", step_index, child.id());

    let child_arc = Arc::new(Mutex::new(Some(child)));
    let cmd_string = cmd.to_string();
    let (outcome_tx, outcome_rx) = oneshot::channel();

    thread::spawn(move || {
        let outcome = monitor(child_arc, step_index, &guard);
        // Release the guard before reporting so the caller sees it detached.
        drop(guard);
        if let Outcome::Exited(code) = outcome {
            if code != 0 && on_fail == OnFail::Abort {
                log::error!(
                    "Step {} failed with on_fail: {}, aborting run",
                    step_index,
                    <&'static str>::from(on_fail)
                );
                failure.abort(format!(
                    "Process failed with exit code {}: {}",
                    code, cmd_string
                ));
            }
        }
        let _ = outcome_tx.send(outcome);
    });

    Ok(TrackedProcess {
        outcome: outcome_rx,
    })
}

pub fn monitor(
    child_arc: Arc<Mutex<Option<Child>>>,
    step_index: usize,
    guard: &AbortSignal,
) -> Outcome {
    loop {
        if let Some(reason) = guard.reason() {
            return kill(&child_arc, step_index, reason);
        }

        // Hold the lock only briefly to check status
        let result = {
            let mut child_guard = child_arc.lock();
            match &mut *child_guard {
                Some(child) => child.try_wait(),
                None => return Outcome::WaitFailed("process handle taken".into()),
            }
        };

        match result {
            Ok(Some(status)) => {
                let exit_code = status.code().unwrap_or(-1);
                log::info!(
                    "Step {} completed with exit code: {}",
                    step_index,
                    exit_code
                );
                return Outcome::Exited(exit_code);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                log::error!("Step {} wait error: {}", step_index, e);
                return Outcome::WaitFailed(e.to_string());
            }
        }
    }
}

fn kill(child_arc: &Mutex<Option<Child>>, step_index: usize, reason: AbortReason) -> Outcome {
    let Some(mut child) = child_arc.lock().take() else {
        return Outcome::Aborted(reason);
    };

    log::warn!("Step {} aborted ({}), killing PID {}", step_index, reason, child.id());
    if let Err(e) = child.kill() {
        // Already exited between the last poll and now.
        log::debug!("Step {} kill: {}", step_index, e);
    }
    if let Err(e) = child.wait() {
        log::error!("Step {} wait after kill: {}", step_index, e);
    }
    Outcome::Aborted(reason)
}
