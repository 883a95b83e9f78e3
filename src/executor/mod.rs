pub mod process;

use serde::Deserialize;
use tokio::sync::oneshot;

use crate::signal::AbortReason;

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, strum_macros::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OnFail {
    #[default]
    Abort,
    Continue,
}

/// How a step's process ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Exited(i32),
    Aborted(AbortReason),
    WaitFailed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Exited(0))
    }
}

pub struct TrackedProcess {
    outcome: oneshot::Receiver<Outcome>,
}

impl TrackedProcess {
    pub async fn wait(self) -> Outcome {
        self.outcome
            .await
            .unwrap_or_else(|_| Outcome::WaitFailed("monitor exited without a result".into()))
    }
}
