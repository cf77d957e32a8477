//! Adapter interfaces for remote skill providers.
//!
//! Adapters give the coordinator a uniform view of whatever service hosts
//! the skills: provisioning, conversations, job submission and polling.

pub mod agent_service;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{
    Capability, ConversationContext, Job, JobSnapshot, SkillDefinition, SkillHandle,
};

// Re-export the agent service adapter
pub use agent_service::AgentServiceAdapter;

/// Trait for remote skill providers
#[async_trait]
pub trait SkillProvider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Create the remote skill described by `definition`
    async fn provision(
        &self,
        capability: Capability,
        definition: &SkillDefinition,
    ) -> Result<SkillHandle>;

    /// Open an isolated conversation
    async fn open_conversation(&self) -> Result<ConversationContext>;

    /// Post `prompt` into the conversation and start the skill on it.
    ///
    /// Returns as soon as the remote side accepted the work.
    async fn submit(
        &self,
        conversation: &ConversationContext,
        skill: &SkillHandle,
        prompt: &str,
    ) -> Result<Job>;

    /// Fetch the current state of a job
    async fn poll(&self, job: &Job) -> Result<JobSnapshot>;

    /// Content of the most recent skill-authored message, if any
    async fn latest_reply(
        &self,
        conversation: &ConversationContext,
    ) -> Result<Option<serde_json::Value>>;

    /// Delete the conversation and its messages
    async fn close_conversation(&self, conversation: &ConversationContext) -> Result<()>;

    /// Health check
    async fn health_check(&self) -> Result<()>;
}
