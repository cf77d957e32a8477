//! Per-stage outcomes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::skill::Capability;
use super::workflow::duration_secs;

/// Outcome class of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The skill produced a reply
    Completed,

    /// The skill could not produce a reply
    Failed,

    /// Not attempted because a mandatory earlier stage failed
    Skipped,
}

/// Why a stage failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("Failed to provision {capability} skill: {reason}")]
    Provisioning {
        capability: Capability,
        reason: String,
    },

    #[error("Skill did not accept the prompt: {0}")]
    Submission(String),

    /// Remote-reported reason, carried verbatim
    #[error("{0}")]
    RemoteExecution(String),

    #[error("Failed to poll job status: {0}")]
    Poll(String),

    #[error("Skill finished without a reply")]
    EmptyReply,

    #[error("Timed out after {waited:?} waiting for the job to finish")]
    Timeout { waited: Duration },

    #[error("Cancelled while waiting for the job to finish")]
    Cancelled,
}

/// Result of one stage. Produced once per stage per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub status: StageStatus,

    /// Normalized reply text (empty unless completed)
    pub text: String,

    /// Skill that ran the stage (empty when it was never resolved)
    pub skill_id: String,

    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Non-text reply parts that were left out of `text`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,

    /// Wall-clock time spent in the stage
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl StageResult {
    pub fn completed(skill_id: impl Into<String>, text: String, attachments: Vec<String>) -> Self {
        Self {
            status: StageStatus::Completed,
            text,
            skill_id: skill_id.into(),
            error: None,
            attachments,
            elapsed: Duration::ZERO,
        }
    }

    pub fn failed(skill_id: impl Into<String>, error: &StageError) -> Self {
        Self {
            status: StageStatus::Failed,
            text: String::new(),
            skill_id: skill_id.into(),
            error: Some(error.to_string()),
            attachments: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: StageStatus::Skipped,
            text: String::new(),
            skill_id: String::new(),
            error: None,
            attachments: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == StageStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_failure_reason_is_verbatim() {
        let err = StageError::RemoteExecution("index unavailable".to_string());
        let result = StageResult::failed("skill_1", &err);

        assert_eq!(result.status, StageStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("index unavailable"));
        assert!(result.text.is_empty());
    }

    #[test]
    fn test_skipped_result_serialization() {
        let json = serde_json::to_value(StageResult::skipped()).unwrap();

        assert_eq!(json["status"], "skipped");
        assert_eq!(json["text"], "");
        assert!(json.get("error").is_none());
        assert!(json.get("attachments").is_none());
    }

    #[test]
    fn test_timeout_message() {
        let err = StageError::Timeout {
            waited: Duration::from_secs(2),
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 2s waiting for the job to finish"
        );
    }
}
