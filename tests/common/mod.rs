//! Scripted in-memory skill provider shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use skillflow::adapters::SkillProvider;
use skillflow::config::{OrchestratorSettings, PollingSettings};
use skillflow::domain::{
    Capability, ConversationContext, Job, JobSnapshot, JobStatus, SkillDefinition, SkillHandle,
};

/// How a capability's jobs behave
#[derive(Debug, Clone)]
pub enum Script {
    /// Report `polls` non-terminal states, then succeed with `reply`
    Reply { polls: usize, reply: Value },
    /// Report `polls` non-terminal states, then fail with `reason`
    Fail { polls: usize, reason: String },
    /// Succeed without ever posting a reply
    Silent,
    /// Never reach a terminal state
    Hang,
    /// Status requests never return
    Stall,
    /// Refuse the submission
    Reject(String),
}

impl Script {
    pub fn reply(text: &str) -> Self {
        Script::Reply {
            polls: 2,
            reply: serde_json::json!([{ "type": "text", "text": { "value": text } }]),
        }
    }

    pub fn fail(reason: &str) -> Self {
        Script::Fail {
            polls: 1,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug)]
struct JobState {
    capability: Capability,
    conversation_id: String,
    remaining: usize,
    finished: Option<JobSnapshot>,
}

/// Provider whose behaviour is scripted per capability
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<Capability, Script>>,
    provision_failures: Mutex<HashMap<Capability, usize>>,
    provision_delay: Duration,
    jobs: Mutex<HashMap<String, JobState>>,
    replies: Mutex<HashMap<String, Value>>,
    prompts: Mutex<Vec<(Capability, String)>>,
    provisions: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    polls: AtomicUsize,
    next_id: AtomicUsize,
}

impl ScriptedProvider {
    /// Every capability succeeds with a short reply
    pub fn new() -> Self {
        let scripts = [
            (Capability::Retrieval, Script::reply("retrieved documents")),
            (Capability::Analysis, Script::reply("analysis insights")),
            (Capability::Synthesis, Script::reply("friendly answer")),
        ]
        .into_iter()
        .collect();

        Self {
            scripts: Mutex::new(scripts),
            provision_failures: Mutex::new(HashMap::new()),
            provision_delay: Duration::ZERO,
            jobs: Mutex::new(HashMap::new()),
            replies: Mutex::new(HashMap::new()),
            prompts: Mutex::new(Vec::new()),
            provisions: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn with_script(self, capability: Capability, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(capability, script);
        self
    }

    /// Fail the first `times` provisioning attempts for `capability`
    pub fn with_provision_failures(self, capability: Capability, times: usize) -> Self {
        self.provision_failures
            .lock()
            .unwrap()
            .insert(capability, times);
        self
    }

    pub fn with_provision_delay(mut self, delay: Duration) -> Self {
        self.provision_delay = delay;
        self
    }

    pub fn provisions(&self) -> usize {
        self.provisions.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Prompts submitted for a capability, in order
    pub fn prompts_for(&self, capability: Capability) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == capability)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn finish(&self, state: &mut JobState, snapshot: JobSnapshot) -> JobSnapshot {
        if state.finished.is_none() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            state.finished = Some(snapshot.clone());
        }
        snapshot
    }
}

#[async_trait]
impl SkillProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn provision(
        &self,
        capability: Capability,
        definition: &SkillDefinition,
    ) -> Result<SkillHandle> {
        self.provisions.fetch_add(1, Ordering::SeqCst);
        if !self.provision_delay.is_zero() {
            tokio::time::sleep(self.provision_delay).await;
        }

        {
            let mut failures = self.provision_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&capability) {
                if *remaining > 0 {
                    *remaining -= 1;
                    anyhow::bail!("quota exceeded for {}", definition.name);
                }
            }
        }

        Ok(SkillHandle::new(
            self.next_id(&format!("skill_{}", capability)),
            capability,
            definition.name.clone(),
        ))
    }

    async fn open_conversation(&self) -> Result<ConversationContext> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ConversationContext::new(self.next_id("thread")))
    }

    async fn submit(
        &self,
        conversation: &ConversationContext,
        skill: &SkillHandle,
        prompt: &str,
    ) -> Result<Job> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&skill.capability)
            .cloned()
            .unwrap_or(Script::Hang);

        if let Script::Reject(reason) = script {
            anyhow::bail!("{}", reason);
        }

        self.prompts
            .lock()
            .unwrap()
            .push((skill.capability, prompt.to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let remaining = match script {
            Script::Reply { polls, .. } | Script::Fail { polls, .. } => polls,
            _ => 0,
        };

        let job_id = self.next_id("run");
        self.jobs.lock().unwrap().insert(
            job_id.clone(),
            JobState {
                capability: skill.capability,
                conversation_id: conversation.id.clone(),
                remaining,
                finished: None,
            },
        );

        Ok(Job::new(
            job_id,
            conversation.id.clone(),
            skill.id.clone(),
            JobStatus::Submitted,
        ))
    }

    async fn poll(&self, job: &Job) -> Result<JobSnapshot> {
        self.polls.fetch_add(1, Ordering::SeqCst);

        let stalled = {
            let capability = self.jobs.lock().unwrap().get(&job.id).map(|s| s.capability);
            capability
                .and_then(|c| self.scripts.lock().unwrap().get(&c).cloned())
                .map_or(false, |script| matches!(script, Script::Stall))
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut jobs = self.jobs.lock().unwrap();
        let state = jobs
            .get_mut(&job.id)
            .ok_or_else(|| anyhow::anyhow!("unknown job {}", job.id))?;

        if let Some(ref finished) = state.finished {
            return Ok(finished.clone());
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&state.capability)
            .cloned()
            .unwrap_or(Script::Hang);

        if let Script::Hang = script {
            return Ok(JobSnapshot::new(JobStatus::Running));
        }

        if state.remaining > 0 {
            state.remaining -= 1;
            let status = if state.remaining % 2 == 0 {
                JobStatus::Running
            } else {
                JobStatus::WaitingOnTool
            };
            return Ok(JobSnapshot::new(status));
        }

        let snapshot = match script {
            Script::Reply { reply, .. } => {
                self.replies
                    .lock()
                    .unwrap()
                    .insert(state.conversation_id.clone(), reply);
                JobSnapshot::new(JobStatus::Succeeded)
            }
            Script::Fail { reason, .. } => JobSnapshot::failed(reason),
            _ => JobSnapshot::new(JobStatus::Succeeded),
        };
        Ok(self.finish(state, snapshot))
    }

    async fn latest_reply(&self, conversation: &ConversationContext) -> Result<Option<Value>> {
        Ok(self.replies.lock().unwrap().get(&conversation.id).cloned())
    }

    async fn close_conversation(&self, conversation: &ConversationContext) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.replies.lock().unwrap().remove(&conversation.id);
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Orchestrator settings with fast polling
pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        polling: PollingSettings {
            interval: Duration::from_millis(5),
            max_wait: Duration::from_secs(5),
        },
        ..Default::default()
    }
}
