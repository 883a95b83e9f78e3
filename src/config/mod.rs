mod time;

pub use time::{parse_duration, parse_time, TimeExpr};

use serde::Deserialize;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::env;
use crate::executor::OnFail;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },
    #[error("step {0}: {1}")]
    Step(usize, String),
    #[error("no steps defined")]
    NoSteps,
}

#[derive(Debug, Deserialize)]
struct RunFile {
    name: Option<String>,
    #[serde(default = "default_artifacts_dir")]
    artifacts_dir: PathBuf,
    timeout: Option<String>,
    deadline: Option<String>,
    #[serde(default)]
    steps: Vec<StepFile>,
}

#[derive(Debug, Deserialize)]
struct StepFile {
    cmd: String,
    timeout: Option<String>,
    #[serde(default)]
    on_fail: OnFail,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("./artifacts")
}

#[derive(Debug, Clone)]
pub struct Config {
    pub name: Option<String>,
    pub artifacts_dir: PathBuf,
    pub timeout: Option<Duration>,
    pub deadline: Option<TimeExpr>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub cmd: String,
    pub timeout: Option<Duration>,
    pub on_fail: OnFail,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RunFile = serde_yaml::from_str(yaml)?;
        if raw.steps.is_empty() {
            return Err(ConfigError::NoSteps);
        }

        let invalid = |field, message| ConfigError::Invalid { field, message };
        let timeout = raw
            .timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(|e| invalid("timeout", e))?;
        let deadline = raw
            .deadline
            .as_deref()
            .map(parse_time)
            .transpose()
            .map_err(|e| invalid("deadline", e))?;

        let steps = raw
            .steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| {
                let timeout = step
                    .timeout
                    .as_deref()
                    .map(parse_duration)
                    .transpose()
                    .map_err(|e| ConfigError::Step(i, format!("timeout: {}", e)))?;
                if step.cmd.trim().is_empty() {
                    return Err(ConfigError::Step(i, "empty cmd".into()));
                }
                Ok(Step {
                    cmd: step.cmd,
                    timeout,
                    on_fail: step.on_fail,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Config {
            name: raw.name,
            artifacts_dir: raw.artifacts_dir,
            timeout,
            deadline,
            steps,
        })
    }

    /// Fills in values the run file leaves open from the environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var_os(name));
    }

    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<OsString>,
    {
        if self.timeout.is_none() {
            self.timeout = env::duration_with(env::TIMEOUT_VAR, &lookup);
        }
        if let Some(dir) = env::var_with(env::ARTIFACTS_VAR, &lookup) {
            self.artifacts_dir = PathBuf::from(dir);
        }
    }
}
