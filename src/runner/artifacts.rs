use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RunnerResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    Failed,
    Aborted,
}

pub struct ArtifactsManager {
    base_dir: PathBuf,
    execution_log: ExecutionLog,
}

impl ArtifactsManager {
    pub fn new(base_dir: &Path, run_id: &str, name: Option<String>) -> RunnerResult<Self> {
        let artifacts_dir = base_dir.join(run_id);
        fs::create_dir_all(&artifacts_dir)?;
        let manager = Self {
            base_dir: artifacts_dir,
            execution_log: ExecutionLog::new(run_id.to_string(), name),
        };
        manager.execution_log.save(&manager.execution_log_path())?;
        Ok(manager)
    }

    pub fn add_step_result(&mut self, step_result: StepResult) -> RunnerResult<()> {
        self.execution_log.step_results.push(step_result);
        self.execution_log.save(&self.execution_log_path())
    }

    pub fn finish_with_state(
        &mut self,
        state: RunState,
        abort_reason: Option<String>,
    ) -> RunnerResult<()> {
        self.execution_log.state = state;
        self.execution_log.abort_reason = abort_reason;
        self.execution_log.completed_at = Some(Utc::now());
        self.execution_log.save(&self.execution_log_path())
    }

    pub fn execution_log(&self) -> &ExecutionLog {
        &self.execution_log
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.base_dir
    }

    fn execution_log_path(&self) -> PathBuf {
        self.base_dir.join("execution_log.yaml")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_index: usize,
    pub cmd: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub run_id: String,
    pub name: Option<String>,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub abort_reason: Option<String>,
    pub step_results: Vec<StepResult>,
}

impl ExecutionLog {
    pub fn new(run_id: String, name: Option<String>) -> Self {
        Self {
            run_id,
            name,
            state: RunState::Running,
            started_at: Utc::now(),
            completed_at: None,
            abort_reason: None,
            step_results: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> RunnerResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> RunnerResult<()> {
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }
}
