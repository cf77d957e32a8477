//! Main orchestrator for the three-stage workflow.
//!
//! Runs retrieval first, then analysis and synthesis concurrently over the
//! retrieval output, and aggregates the three stage results into one
//! [`WorkflowResult`]. Remote failures never escape as errors: they are
//! recorded in the stage results.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{AgentServiceAdapter, SkillProvider};
use crate::config::{OrchestratorSettings, PromptTemplates, ResolvedConfig};
use crate::domain::{
    Capability, ProgressEvent, ProgressKind, SkillHandle, StageError, StageResult, Summary,
    WorkflowResult,
};

use super::channel::Conversation;
use super::metrics::{MetricsAccumulator, MetricsState};
use super::normalizer::NormalizedReply;
use super::poller::RunPoller;
use super::pool::{PoolError, StagePool};
use super::registry::SkillRegistry;

/// Progress callback; receives every workflow transition.
///
/// Called inline from the stage that emits the event, so it should return
/// quickly: a slow callback delays that stage's polling. Events from the two
/// fan-out stages may interleave. A panicking callback is logged and the
/// workflow carries on.
pub type ProgressCallback<'a> = &'a (dyn Fn(&ProgressEvent) + Send + Sync);

/// Internal faults. Remote failures are never reported this way.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Workflow coordinator
pub struct Orchestrator {
    provider: Arc<dyn SkillProvider>,
    registry: SkillRegistry,
    poller: RunPoller,
    pool: StagePool,
    metrics: MetricsAccumulator,
    prompts: PromptTemplates,
    retain_conversations: bool,
}

impl Orchestrator {
    /// Create an orchestrator over `provider`
    pub fn new(provider: Arc<dyn SkillProvider>, settings: OrchestratorSettings) -> Self {
        let OrchestratorSettings {
            polling,
            workers,
            retain_conversations,
            skills,
            prompts,
        } = settings;

        Self {
            registry: SkillRegistry::new(Arc::clone(&provider), skills),
            provider,
            poller: RunPoller::new(polling),
            pool: StagePool::new(workers),
            metrics: MetricsAccumulator::new(),
            prompts,
            retain_conversations,
        }
    }

    /// Create an orchestrator backed by the configured agent service
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let provider = Arc::new(AgentServiceAdapter::new(&config.provider));
        Self::new(provider, config.orchestrator.clone())
    }

    pub fn provider(&self) -> &dyn SkillProvider {
        self.provider.as_ref()
    }

    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// Running totals across every workflow this orchestrator has run
    pub fn metrics(&self) -> MetricsState {
        self.metrics.snapshot()
    }

    /// Stop accepting work. Later runs fail with [`OrchestratorError::Pool`]
    /// before any remote call is made.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Run the workflow for `query`
    pub async fn run(
        &self,
        query: &str,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<WorkflowResult, OrchestratorError> {
        self.run_with_cancel(query, on_progress, &CancellationToken::new())
            .await
    }

    /// Run the workflow for `query`, abandoning any pending job wait when
    /// `cancel` fires. Abandoned stages, and stages not yet started when it
    /// fires, are reported as failed.
    #[instrument(skip_all, fields(query_len = query.len()))]
    pub async fn run_with_cancel(
        &self,
        query: &str,
        on_progress: Option<ProgressCallback<'_>>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowResult, OrchestratorError> {
        if self.pool.is_closed() {
            return Err(PoolError::Closed.into());
        }

        let workflow_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let progress = Progress::new(on_progress);

        info!(%workflow_id, "Starting workflow");
        progress.emit(ProgressEvent::new(
            ProgressKind::WorkflowStarted,
            "Starting workflow",
        ));

        let retrieval_skill = self.resolve(Capability::Retrieval, cancel).await;
        let analysis_skill = self.resolve(Capability::Analysis, cancel).await;
        let synthesis_skill = self.resolve(Capability::Synthesis, cancel).await;

        // Stage 1: retrieval gates everything else
        let research = self
            .run_stage(Capability::Retrieval, retrieval_skill, query, cancel, &progress)
            .await;

        let (analysis, synthesis) = if research.is_completed() {
            progress.emit(ProgressEvent::new(
                ProgressKind::FanOutStarted,
                "Running analysis and synthesis in parallel",
            ));

            let analysis_prompt = self.prompts.render(Capability::Analysis, &research.text);
            let synthesis_prompt = self.prompts.render(Capability::Synthesis, &research.text);

            let (analysis, synthesis) = tokio::join!(
                self.pool.execute(self.run_stage(
                    Capability::Analysis,
                    analysis_skill,
                    &analysis_prompt,
                    cancel,
                    &progress,
                )),
                self.pool.execute(self.run_stage(
                    Capability::Synthesis,
                    synthesis_skill,
                    &synthesis_prompt,
                    cancel,
                    &progress,
                )),
            );
            let (analysis, synthesis) = (analysis?, synthesis?);

            progress.emit(ProgressEvent::new(
                ProgressKind::FanInCompleted,
                format!(
                    "Analysis {}, synthesis {}",
                    status_word(&analysis),
                    status_word(&synthesis)
                ),
            ));
            (analysis, synthesis)
        } else {
            warn!(%workflow_id, "Retrieval failed, skipping analysis and synthesis");
            for capability in [Capability::Analysis, Capability::Synthesis] {
                progress.emit(ProgressEvent::for_stage(
                    ProgressKind::StageSkipped,
                    capability,
                    format!("{} skipped: retrieval failed", stage_title(capability)),
                ));
            }
            (StageResult::skipped(), StageResult::skipped())
        };

        let execution_time = clock.elapsed();
        let summary = Summary::from_stages(query, &research, &analysis, &synthesis, execution_time);
        self.metrics.record(execution_time);

        info!(
            %workflow_id,
            status = ?summary.overall_status,
            successful = summary.successful_stage_count,
            elapsed_ms = execution_time.as_millis() as u64,
            "Workflow finished"
        );
        progress.emit(ProgressEvent::new(
            ProgressKind::WorkflowCompleted,
            format!(
                "Workflow {:?}: {}/{} stages succeeded in {:.2}s",
                summary.overall_status,
                summary.successful_stage_count,
                summary.total_stage_count,
                execution_time.as_secs_f64()
            )
            .to_lowercase(),
        ));

        Ok(WorkflowResult {
            workflow_id,
            research,
            analysis,
            synthesis,
            summary,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Run one stage to a StageResult, converting every failure
    async fn run_stage(
        &self,
        capability: Capability,
        skill: Result<Arc<SkillHandle>, StageError>,
        prompt: &str,
        cancel: &CancellationToken,
        progress: &Progress<'_>,
    ) -> StageResult {
        let title = stage_title(capability);
        let clock = Instant::now();

        progress.emit(ProgressEvent::for_stage(
            ProgressKind::StageStarted,
            capability,
            format!("{} started", title),
        ));

        let (skill_id, outcome) = match skill {
            Ok(handle) if cancel.is_cancelled() => (handle.id.clone(), Err(StageError::Cancelled)),
            Ok(handle) => {
                let outcome = self.execute_stage(&handle, prompt, cancel).await;
                (handle.id.clone(), outcome)
            }
            Err(e) => (String::new(), Err(e)),
        };
        let elapsed = clock.elapsed();

        match outcome {
            Ok(reply) => {
                debug!(%capability, chars = reply.text.len(), "Stage completed");
                progress.emit(ProgressEvent::for_stage(
                    ProgressKind::StageCompleted,
                    capability,
                    format!("{} completed: {} characters", title, reply.text.chars().count()),
                ));
                StageResult::completed(skill_id, reply.text, reply.attachments)
                    .with_elapsed(elapsed)
            }
            Err(e) => {
                error!(%capability, error = %e, "Stage failed");
                progress.emit(ProgressEvent::for_stage(
                    ProgressKind::StageFailed,
                    capability,
                    format!("{} failed: {}", title, e),
                ));
                StageResult::failed(skill_id, &e).with_elapsed(elapsed)
            }
        }
    }

    /// Resolve a skill unless the workflow is already cancelled
    async fn resolve(
        &self,
        capability: Capability,
        cancel: &CancellationToken,
    ) -> Result<Arc<SkillHandle>, StageError> {
        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }
        self.registry.resolve(capability).await
    }

    /// Open a conversation, submit, wait, and always release the conversation
    async fn execute_stage(
        &self,
        skill: &SkillHandle,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<NormalizedReply, StageError> {
        let conversation =
            Conversation::open(Arc::clone(&self.provider), self.retain_conversations).await?;

        let outcome = match conversation.submit(skill, prompt).await {
            Ok(job) => self.poller.await_job(&conversation, job, cancel).await,
            Err(e) => Err(e),
        };

        conversation.close().await;
        outcome
    }
}

/// Optional progress sink
struct Progress<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> Progress<'a> {
    fn new(callback: Option<ProgressCallback<'a>>) -> Self {
        Self { callback }
    }

    fn emit(&self, event: ProgressEvent) {
        debug!(kind = ?event.kind, message = %event.message, "Progress");
        if let Some(callback) = self.callback {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                warn!(kind = ?event.kind, "Progress callback panicked");
            }
        }
    }
}

fn stage_title(capability: Capability) -> &'static str {
    match capability {
        Capability::Retrieval => "Retrieval",
        Capability::Analysis => "Analysis",
        Capability::Synthesis => "Synthesis",
    }
}

fn status_word(result: &StageResult) -> &'static str {
    if result.is_completed() {
        "completed"
    } else {
        "failed"
    }
}
