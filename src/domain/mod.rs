//! Domain types for the skillflow coordinator.
//!
//! This module contains the core data structures:
//! - Skill: Capabilities, handles and provisioning definitions
//! - Job: Conversations, jobs and their run-state machine
//! - Stage: Per-stage results and failure reasons
//! - Workflow: Aggregated results and summaries
//! - Events: Progress notifications

pub mod events;
pub mod job;
pub mod skill;
pub mod stage;
pub mod workflow;

// Re-export commonly used types
pub use events::{ProgressEvent, ProgressKind};
pub use job::{ConversationContext, Job, JobSnapshot, JobStatus};
pub use skill::{Capability, SkillDefinition, SkillHandle};
pub use stage::{StageError, StageResult, StageStatus};
pub use workflow::{OverallStatus, Summary, WorkflowResult, TOTAL_STAGES};
