//! Run poller: waits for a remote job to reach a terminal state.
//!
//! Polling is fixed-interval. Every remote call and every wait between
//! polls races the `max_wait` deadline and the caller's cancellation
//! token, so a stalled request cannot hold a stage past either.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::PollingSettings;
use crate::domain::{Job, JobStatus, StageError};

use super::channel::Conversation;
use super::normalizer::{normalize_reply, NormalizedReply};

/// Shortest accepted interval between polls
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polls jobs until they finish
#[derive(Debug, Clone, Copy)]
pub struct RunPoller {
    interval: Duration,
    max_wait: Duration,
}

impl Default for RunPoller {
    fn default() -> Self {
        Self::new(PollingSettings::default())
    }
}

impl RunPoller {
    pub fn new(settings: PollingSettings) -> Self {
        Self {
            interval: settings.interval.max(MIN_POLL_INTERVAL),
            max_wait: settings.max_wait,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Wait for `job` to finish and return its normalized reply.
    ///
    /// A remote failure is returned with the remote reason verbatim.
    #[instrument(skip(self, conversation, job, cancel), fields(job_id = %job.id))]
    pub async fn await_job(
        &self,
        conversation: &Conversation,
        mut job: Job,
        cancel: &CancellationToken,
    ) -> Result<NormalizedReply, StageError> {
        let started = Instant::now();
        let deadline = started + self.max_wait;
        let mut polls = 0u32;

        while !job.is_terminal() {
            let snapshot = bounded(conversation.poll(&job), started, deadline, cancel).await?;
            polls += 1;
            job.observe(snapshot);

            if job.is_terminal() {
                break;
            }

            if Instant::now() >= deadline {
                warn!(polls, status = ?job.status(), "Job did not finish in time");
                return Err(StageError::Timeout {
                    waited: started.elapsed(),
                });
            }

            let wait = self
                .interval
                .min(deadline.saturating_duration_since(Instant::now()));
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(polls, "Polling cancelled");
                    return Err(StageError::Cancelled);
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        debug!(polls, status = ?job.status(), elapsed_ms = started.elapsed().as_millis() as u64, "Job finished");

        match job.status() {
            JobStatus::Succeeded => {
                let reply = bounded(conversation.latest_reply(), started, deadline, cancel)
                    .await?
                    .ok_or(StageError::EmptyReply)?;
                Ok(normalize_reply(&reply))
            }
            _ => Err(StageError::RemoteExecution(
                job.error()
                    .map(str::to_string)
                    .unwrap_or_else(|| "job failed without a reason".to_string()),
            )),
        }
    }
}

/// Run one remote call, giving up at `deadline` or on cancellation
async fn bounded<T>(
    call: impl Future<Output = Result<T, StageError>>,
    started: Instant,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<T, StageError> {
    tokio::select! {
        _ = cancel.cancelled() => {
            debug!("Remote call cancelled");
            Err(StageError::Cancelled)
        }
        outcome = tokio::time::timeout_at(deadline, call) => match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!("Remote call did not return before the deadline");
                Err(StageError::Timeout {
                    waited: started.elapsed(),
                })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_is_clamped() {
        let poller = RunPoller::new(PollingSettings {
            interval: Duration::ZERO,
            max_wait: Duration::from_secs(1),
        });
        assert_eq!(poller.interval(), MIN_POLL_INTERVAL);
        assert_eq!(poller.max_wait(), Duration::from_secs(1));
    }

    #[test]
    fn test_default_timing() {
        let poller = RunPoller::default();
        assert_eq!(poller.interval(), Duration::from_millis(500));
        assert_eq!(poller.max_wait(), Duration::from_secs(300));
    }
}
