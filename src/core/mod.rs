//! Core coordination logic.
//!
//! This module contains:
//! - SkillRegistry: Lazily provisioned, memoized skill handles
//! - Conversation: Scoped remote exchange contexts
//! - RunPoller: Waiting for remote jobs to finish
//! - Normalizer: Flattening reply payloads into text
//! - StagePool: Bounded workers for the fan-out stage
//! - Metrics: Running query totals
//! - Orchestrator: The workflow itself

pub mod channel;
mod literal;
pub mod metrics;
pub mod normalizer;
pub mod orchestrator;
pub mod poller;
pub mod pool;
pub mod registry;

// Re-export commonly used types
pub use channel::Conversation;
pub use metrics::{MetricsAccumulator, MetricsState};
pub use normalizer::{normalize, normalize_reply, NormalizedReply, ReplyPart};
pub use orchestrator::{Orchestrator, OrchestratorError, ProgressCallback};
pub use poller::RunPoller;
pub use pool::{PoolError, StagePool};
pub use registry::SkillRegistry;
