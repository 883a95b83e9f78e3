use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Why a signal was aborted.
/// Can be produced by any source (timer, deadline, interrupt, failed step, caller).
#[derive(Debug, Clone, PartialEq, Error, Default)]
pub enum AbortReason {
    #[default]
    #[error("operation aborted")]
    Aborted,
    #[error("timed out after {}", human(.0))]
    TimedOut(Duration),
    #[error("deadline {0} reached")]
    DeadlineReached(DateTime<Utc>),
    #[error("interrupted")]
    Interrupted,
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Value(serde_json::Value),
}

fn human(d: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*d)
}

impl From<String> for AbortReason {
    fn from(msg: String) -> Self {
        AbortReason::Message(msg)
    }
}

impl From<&str> for AbortReason {
    fn from(msg: &str) -> Self {
        AbortReason::Message(msg.to_string())
    }
}

impl From<serde_json::Value> for AbortReason {
    fn from(value: serde_json::Value) -> Self {
        AbortReason::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reason_is_plain_abort() {
        assert_eq!(AbortReason::default(), AbortReason::Aborted);
        assert_eq!(AbortReason::default().to_string(), "operation aborted");
    }

    #[test]
    fn timeout_reason_formats_duration() {
        let reason = AbortReason::TimedOut(Duration::from_secs(90));
        assert_eq!(reason.to_string(), "timed out after 1m 30s");
    }

    #[test]
    fn arbitrary_values_are_kept() {
        let reason: AbortReason = serde_json::json!({"code": 7}).into();
        assert_eq!(reason, AbortReason::Value(serde_json::json!({"code": 7})));
        assert_eq!(reason.to_string(), r#"{"code":7}"#);
    }
}
