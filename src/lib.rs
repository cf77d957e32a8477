//! skillflow - three-stage remote skill workflow coordinator
//!
//! Answers a question by combining three remote skills, each running as an
//! asynchronous job on a skill provider.
//!
//! # Architecture
//!
//! The workflow is strictly staged:
//! - Retrieval runs first and gates everything else
//! - Analysis and synthesis then run concurrently over the retrieval output
//! - Stage failures are recorded in the result, never raised
//!
//! # Modules
//!
//! - `adapters`: Skill provider integrations (assistants-style agent service)
//! - `core`: Coordination logic (Registry, Conversation, Poller, Normalizer, Orchestrator)
//! - `domain`: Data structures (SkillHandle, Job, StageResult, WorkflowResult)
//! - `config`: Configuration loading
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Ask a question
//! skillflow ask "What are the symptoms of diabetes?"
//!
//! # Ask many questions against one orchestrator
//! skillflow batch questions.txt
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{AgentServiceAdapter, SkillProvider};
pub use core::{normalize, MetricsState, Orchestrator, OrchestratorError};
pub use domain::{
    Capability, OverallStatus, ProgressEvent, StageResult, StageStatus, WorkflowResult,
};
