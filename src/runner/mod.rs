pub mod artifacts;

use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;

use crate::config::{Config, Step};
use crate::executor::{process, OnFail, Outcome};
use crate::signal::{self, any_signal, AbortController, AbortSignal, Timer};

pub use artifacts::{ArtifactsManager, ExecutionLog, RunState, StepResult};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("execution log error: {0}")]
    Serialization(#[from] serde_yaml::Error),
    #[error("deadline is out of range")]
    DeadlineOutOfRange,
}

pub(crate) type RunnerResult<T> = Result<T, RunnerError>;

/// Runs the steps of a [`Config`] in order, all guarded by one run signal.
///
/// The run signal combines the configured timeout and deadline, a failure
/// controller fed by steps with `on_fail: abort`, and an optional external
/// signal (Ctrl-C in the CLI).
pub struct Runner {
    pub config: Config,
    pub external: Option<AbortSignal>,
}

impl Runner {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            external: None,
        }
    }

    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.external = Some(signal);
        self
    }

    pub async fn run(self) -> RunnerResult<ExecutionLog> {
        let start = Utc::now();
        let deadline = match &self.config.deadline {
            Some(expr) => Some(expr.resolve(start).ok_or(RunnerError::DeadlineOutOfRange)?),
            None => None,
        };
        let run_id = generate_id(start);
        let mut artifacts =
            ArtifactsManager::new(&self.config.artifacts_dir, &run_id, self.config.name.clone())?;
        log::info!(
            "Starting run {} ({} steps) in {}",
            run_id,
            self.config.steps.len(),
            artifacts.artifacts_dir().display()
        );

        // Timers live until the run ends.
        let run_timeout = self.config.timeout.map(signal::timeout);
        let run_deadline = deadline.map(signal::deadline);
        let failure = AbortController::new();
        let run_signal = any_signal([
            run_timeout.as_ref().map(Timer::signal),
            run_deadline.as_ref().map(Timer::signal),
            self.external.clone(),
            Some(failure.signal()),
        ])
        .unwrap_or_else(|| failure.signal());

        for (i, step) in self.config.steps.iter().enumerate() {
            let started_at = Utc::now();

            if let Some(reason) = run_signal.reason() {
                log::info!("Skipping step {}: {}", i, reason);
                artifacts.add_step_result(StepResult {
                    step_index: i,
                    cmd: step.cmd.clone(),
                    started_at,
                    completed_at: None,
                    success: false,
                    exit_code: None,
                    error: Some(format!("skipped: {}", reason)),
                })?;
                continue;
            }

            let outcome =
                run_step(i, step, &run_signal, &failure, artifacts.artifacts_dir()).await;
            artifacts.add_step_result(step_result(i, &step.cmd, started_at, &outcome))?;
        }

        let (state, abort_reason) = match run_signal.reason() {
            None => (RunState::Completed, None),
            Some(reason) if failure.signal().is_aborted() => {
                (RunState::Failed, Some(reason.to_string()))
            }
            Some(reason) => (RunState::Aborted, Some(reason.to_string())),
        };
        artifacts.finish_with_state(state, abort_reason)?;
        log::info!("Run {} finished: {:?}", run_id, state);

        Ok(artifacts.execution_log().clone())
    }
}

/// Runs one step guarded by the run signal and the step's own timeout.
///
/// The step timer is cancelled on return and the monitor releases the step
/// signal before reporting, so nothing stays subscribed to `run_signal`.
async fn run_step(
    i: usize,
    step: &Step,
    run_signal: &AbortSignal,
    failure: &AbortController,
    artifacts_dir: &Path,
) -> Outcome {
    let timer = step.timeout.map(signal::timeout);
    let step_signal = any_signal([Some(run_signal.clone()), timer.as_ref().map(Timer::signal)])
        .unwrap_or_else(|| run_signal.clone());

    let outcome = match process::spawn(
        &step.cmd,
        i,
        step.on_fail,
        step_signal,
        failure.clone(),
        artifacts_dir,
    ) {
        Ok(tracked) => tracked.wait().await,
        Err(e) => {
            log::error!("Step {} failed to start: {}", i, e);
            if step.on_fail == OnFail::Abort {
                failure.abort(format!("Step {} failed to start: {}", i, e));
            }
            Outcome::WaitFailed(e.to_string())
        }
    };

    // A step timeout only aborts this step; escalate it per policy.
    if let Outcome::Aborted(reason) = &outcome {
        if !run_signal.is_aborted() && step.on_fail == OnFail::Abort {
            failure.abort(format!("Step {} aborted: {}", i, reason));
        }
    }

    outcome
}

fn step_result(
    step_index: usize,
    cmd: &str,
    started_at: DateTime<Utc>,
    outcome: &Outcome,
) -> StepResult {
    let (exit_code, error) = match outcome {
        Outcome::Exited(0) => (Some(0), None),
        Outcome::Exited(code) => (Some(*code), Some(format!("exit code {}", code))),
        Outcome::Aborted(reason) => (None, Some(format!("aborted: {}", reason))),
        Outcome::WaitFailed(e) => (None, Some(e.clone())),
    };
    StepResult {
        step_index,
        cmd: cmd.to_string(),
        started_at,
        completed_at: Some(Utc::now()),
        success: outcome.is_success(),
        exit_code,
        error,
    }
}

fn generate_id(start: DateTime<Utc>) -> String {
    let uuid = uuid::Uuid::new_v4();
    let timestamp = start.format("%Y%m%dT%H%M%SZ");
    format!("{}_{}", timestamp, uuid)
}
