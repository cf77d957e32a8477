//! Agent service adapter for assistants-style REST APIs.
//!
//! Skills map to assistants, conversations to threads and jobs to runs.
//! Every request carries the configured `api-version` query parameter and,
//! when present, an `api-key` header.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderSettings;
use crate::domain::{
    Capability, ConversationContext, Job, JobSnapshot, JobStatus, SkillDefinition, SkillHandle,
};

use super::SkillProvider;

/// HTTP client for an assistants-style agent service
pub struct AgentServiceAdapter {
    endpoint: String,
    api_version: String,
    api_key: Option<String>,
    request_timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CreateAssistantRequest<'a> {
    model: &'a str,
    name: &'a str,
    instructions: &'a str,
    tools: &'a [serde_json::Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_resources: Option<&'a serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    id: String,
    status: String,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    role: String,
    #[serde(default)]
    content: serde_json::Value,
}

impl AgentServiceAdapter {
    /// Create an adapter from resolved provider settings
    pub fn new(settings: &ProviderSettings) -> Self {
        Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_version: settings.api_version.clone(),
            api_key: settings.api_key.clone(),
            request_timeout: settings.request_timeout,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .query(&[("api-version", self.api_version.as_str())])
            .timeout(self.request_timeout);
        if let Some(ref key) = self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    /// Send a request and fail on non-success status codes
    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to {}", what))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Agent service error ({}) while trying to {}: {}", status, what, text);
        }
        Ok(response)
    }
}

/// Map a remote run status onto the job state machine
fn map_run_status(status: &str) -> JobStatus {
    match status {
        "queued" => JobStatus::Submitted,
        "in_progress" | "cancelling" => JobStatus::Running,
        "requires_action" => JobStatus::WaitingOnTool,
        "completed" => JobStatus::Succeeded,
        // failed, cancelled, expired, incomplete and anything unknown
        _ => JobStatus::Failed,
    }
}

fn snapshot_from_run(run: RunResponse) -> JobSnapshot {
    let status = map_run_status(&run.status);
    if status != JobStatus::Failed {
        return JobSnapshot::new(status);
    }

    let reason = match run.last_error {
        Some(RunError {
            message: Some(message),
            ..
        }) => message,
        Some(RunError {
            code: Some(code), ..
        }) => code,
        _ => format!("run ended with status '{}'", run.status),
    };
    JobSnapshot::failed(reason)
}

/// Pick the newest skill-authored message from a newest-first listing
fn latest_assistant_content(messages: MessageList) -> Option<serde_json::Value> {
    messages
        .data
        .into_iter()
        .find(|m| m.role == "assistant")
        .map(|m| m.content)
}

#[async_trait]
impl SkillProvider for AgentServiceAdapter {
    fn name(&self) -> &str {
        "agent_service"
    }

    async fn provision(
        &self,
        capability: Capability,
        definition: &SkillDefinition,
    ) -> Result<SkillHandle> {
        let body = CreateAssistantRequest {
            model: &definition.model,
            name: &definition.name,
            instructions: &definition.instructions,
            tools: &definition.tools,
            tool_resources: definition.tool_resources.as_ref(),
        };

        let response = self
            .send(
                self.request(Method::POST, "assistants").json(&body),
                &format!("create assistant '{}'", definition.name),
            )
            .await?;
        let created: IdResponse = response
            .json()
            .await
            .context("Invalid create assistant response")?;

        debug!(assistant_id = %created.id, name = %definition.name, "Assistant created");

        Ok(SkillHandle::new(created.id, capability, definition.name.clone()))
    }

    async fn open_conversation(&self) -> Result<ConversationContext> {
        let response = self
            .send(
                self.request(Method::POST, "threads")
                    .json(&serde_json::json!({})),
                "create thread",
            )
            .await?;
        let created: IdResponse = response
            .json()
            .await
            .context("Invalid create thread response")?;
        Ok(ConversationContext::new(created.id))
    }

    async fn submit(
        &self,
        conversation: &ConversationContext,
        skill: &SkillHandle,
        prompt: &str,
    ) -> Result<Job> {
        let message = CreateMessageRequest {
            role: "user",
            content: prompt,
        };
        self.send(
            self.request(Method::POST, &format!("threads/{}/messages", conversation.id))
                .json(&message),
            "post message",
        )
        .await?;

        let run = CreateRunRequest {
            assistant_id: &skill.id,
        };
        let response = self
            .send(
                self.request(Method::POST, &format!("threads/{}/runs", conversation.id))
                    .json(&run),
                "start run",
            )
            .await?;
        let run: RunResponse = response.json().await.context("Invalid run response")?;

        Ok(Job::new(
            run.id,
            conversation.id.clone(),
            skill.id.clone(),
            map_run_status(&run.status),
        ))
    }

    async fn poll(&self, job: &Job) -> Result<JobSnapshot> {
        let response = self
            .send(
                self.request(
                    Method::GET,
                    &format!("threads/{}/runs/{}", job.conversation_id, job.id),
                ),
                "retrieve run",
            )
            .await?;
        let run: RunResponse = response.json().await.context("Invalid run response")?;
        Ok(snapshot_from_run(run))
    }

    async fn latest_reply(
        &self,
        conversation: &ConversationContext,
    ) -> Result<Option<serde_json::Value>> {
        let response = self
            .send(
                self.request(Method::GET, &format!("threads/{}/messages", conversation.id))
                    .query(&[("order", "desc")]),
                "list messages",
            )
            .await?;
        let messages: MessageList = response
            .json()
            .await
            .context("Invalid message list response")?;
        Ok(latest_assistant_content(messages))
    }

    async fn close_conversation(&self, conversation: &ConversationContext) -> Result<()> {
        self.send(
            self.request(Method::DELETE, &format!("threads/{}", conversation.id)),
            "delete thread",
        )
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.send(
            self.request(Method::GET, "assistants").query(&[("limit", "1")]),
            "list assistants",
        )
        .await?;
        Ok(())
    }
}
