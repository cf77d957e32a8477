//! Progress notifications emitted while a workflow runs.
//!
//! Purely observational: nothing in the workflow depends on them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::skill::Capability;

/// Kind of workflow transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    WorkflowStarted,
    StageStarted,
    StageCompleted,
    StageFailed,
    StageSkipped,
    FanOutStarted,
    FanInCompleted,
    WorkflowCompleted,
}

/// A single progress notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub kind: ProgressKind,

    /// Stage the event refers to, if any
    pub stage: Option<Capability>,

    /// Short human-readable status line
    pub message: String,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: None,
            message: message.into(),
        }
    }

    pub fn for_stage(kind: ProgressKind, stage: Capability, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: Some(stage),
            message: message.into(),
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
