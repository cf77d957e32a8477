//! Conversation channel: a scoped remote exchange context.
//!
//! A [`Conversation`] is opened per stage, receives exactly one prompt and
//! is closed when the stage ends. Callers close it explicitly with
//! [`Conversation::close`]; if the guard is dropped while still open (a
//! panic, or the stage future being dropped mid-poll), a best-effort close
//! is spawned on the current runtime instead.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::adapters::SkillProvider;
use crate::domain::{ConversationContext, Job, JobSnapshot, SkillHandle, StageError};

/// An open conversation on the remote side
pub struct Conversation {
    provider: Arc<dyn SkillProvider>,
    context: ConversationContext,
    retain: bool,
    closed: bool,
}

impl Conversation {
    /// Open a new conversation. With `retain`, the conversation is left on
    /// the remote side when closed.
    pub async fn open(provider: Arc<dyn SkillProvider>, retain: bool) -> Result<Self, StageError> {
        let context = provider
            .open_conversation()
            .await
            .map_err(|e| StageError::Submission(format!("{:#}", e)))?;

        debug!(conversation_id = %context.id, "Conversation opened");

        Ok(Self {
            provider,
            context,
            retain,
            closed: false,
        })
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Submit the prompt and start `skill` on it. Does not wait for the job.
    pub async fn submit(&self, skill: &SkillHandle, prompt: &str) -> Result<Job, StageError> {
        let job = self
            .provider
            .submit(&self.context, skill, prompt)
            .await
            .map_err(|e| StageError::Submission(format!("{:#}", e)))?;

        debug!(
            conversation_id = %self.context.id,
            job_id = %job.id,
            skill = %skill.name,
            "Prompt submitted"
        );
        Ok(job)
    }

    /// Fetch the current state of a job running in this conversation
    pub async fn poll(&self, job: &Job) -> Result<JobSnapshot, StageError> {
        self.provider
            .poll(job)
            .await
            .map_err(|e| StageError::Poll(format!("{:#}", e)))
    }

    /// Content of the most recent skill-authored message
    pub async fn latest_reply(&self) -> Result<Option<serde_json::Value>, StageError> {
        self.provider
            .latest_reply(&self.context)
            .await
            .map_err(|e| StageError::Poll(format!("{:#}", e)))
    }

    /// Release the conversation. Failures are logged, never returned.
    pub async fn close(mut self) {
        self.closed = true;

        if self.retain {
            info!(conversation_id = %self.context.id, "Conversation retained for inspection");
            return;
        }

        match self.provider.close_conversation(&self.context).await {
            Ok(()) => debug!(conversation_id = %self.context.id, "Conversation closed"),
            Err(e) => warn!(
                conversation_id = %self.context.id,
                error = %e,
                "Failed to close conversation"
            ),
        }
    }
}

impl Drop for Conversation {
    fn drop(&mut self) {
        if self.closed || self.retain {
            return;
        }

        let provider = Arc::clone(&self.provider);
        let context = self.context.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = provider.close_conversation(&context).await {
                        warn!(
                            conversation_id = %context.id,
                            error = %e,
                            "Failed to close abandoned conversation"
                        );
                    }
                });
            }
            Err(_) => warn!(
                conversation_id = %context.id,
                "Conversation dropped outside a runtime, left open"
            ),
        }
    }
}
