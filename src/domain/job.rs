//! Remote jobs and their run-state machine.

use serde::{Deserialize, Serialize};

/// An isolated exchange scope on the remote side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Remote identifier
    pub id: String,
}

impl ConversationContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Status of a remote job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, not yet picked up
    Submitted,

    /// Executing
    Running,

    /// Paused on a tool call
    WaitingOnTool,

    /// Finished with a reply
    Succeeded,

    /// Finished without a reply
    Failed,
}

impl JobStatus {
    /// Terminal states never transition again
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Submitted
    }
}

/// One observation of a job's remote state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: JobStatus,

    /// Remote-reported reason, set when `status` is `Failed`
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            error: Some(reason.into()),
        }
    }
}

/// One asynchronous unit of remote work.
///
/// Bound to a conversation and a skill. The status only moves forward:
/// once terminal, further observations are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Remote run identifier
    pub id: String,

    /// Conversation the job runs in
    pub conversation_id: String,

    /// Skill executing the job
    pub skill_id: String,

    status: JobStatus,
    error: Option<String>,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        skill_id: impl Into<String>,
        status: JobStatus,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            skill_id: skill_id.into(),
            status,
            error: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Remote failure reason, if the job failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a poll observation. Returns false when the job was already
    /// terminal and the observation was dropped.
    pub fn observe(&mut self, snapshot: JobSnapshot) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = snapshot.status;
        if snapshot.status == JobStatus::Failed {
            self.error = snapshot.error;
        }
        true
    }
}
