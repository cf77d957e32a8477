//! Aggregated workflow outcome.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::{StageResult, StageStatus};

/// Number of stages in every workflow
pub const TOTAL_STAGES: usize = 3;

/// Overall outcome of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Every stage completed
    Completed,

    /// Retrieval completed, at least one later stage failed
    Partial,

    /// Retrieval failed
    Failed,
}

/// Headline numbers for a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub query: String,
    pub successful_stage_count: usize,
    pub total_stage_count: usize,
    pub overall_status: OverallStatus,
    #[serde(with = "duration_secs")]
    pub execution_time: Duration,
}

impl Summary {
    /// Derive the summary from the three stage results
    pub fn from_stages(
        query: &str,
        research: &StageResult,
        analysis: &StageResult,
        synthesis: &StageResult,
        execution_time: Duration,
    ) -> Self {
        let stages = [research, analysis, synthesis];
        let successful_stage_count = stages.iter().filter(|s| s.is_completed()).count();

        let overall_status = if research.status != StageStatus::Completed {
            OverallStatus::Failed
        } else if successful_stage_count == TOTAL_STAGES {
            OverallStatus::Completed
        } else {
            OverallStatus::Partial
        };

        Self {
            query: query.to_string(),
            successful_stage_count,
            total_stage_count: TOTAL_STAGES,
            overall_status,
            execution_time,
        }
    }
}

/// Everything a caller learns from one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: Uuid,
    pub research: StageResult,
    pub analysis: StageResult,
    pub synthesis: StageResult,
    pub summary: Summary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Serialize a `Duration` as fractional seconds
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stage::StageError;

    fn completed() -> StageResult {
        StageResult::completed("skill", "text".to_string(), Vec::new())
    }

    fn failed() -> StageResult {
        StageResult::failed("skill", &StageError::RemoteExecution("boom".to_string()))
    }

    #[test]
    fn test_all_completed() {
        let summary = Summary::from_stages(
            "q",
            &completed(),
            &completed(),
            &completed(),
            Duration::from_secs(1),
        );
        assert_eq!(summary.overall_status, OverallStatus::Completed);
        assert_eq!(summary.successful_stage_count, 3);
        assert_eq!(summary.total_stage_count, 3);
    }

    #[test]
    fn test_research_failure_is_failed() {
        let summary = Summary::from_stages(
            "q",
            &failed(),
            &StageResult::skipped(),
            &StageResult::skipped(),
            Duration::ZERO,
        );
        assert_eq!(summary.overall_status, OverallStatus::Failed);
        assert_eq!(summary.successful_stage_count, 0);
    }

    #[test]
    fn test_later_failure_is_partial() {
        let summary =
            Summary::from_stages("q", &completed(), &failed(), &completed(), Duration::ZERO);
        assert_eq!(summary.overall_status, OverallStatus::Partial);
        assert_eq!(summary.successful_stage_count, 2);

        let summary =
            Summary::from_stages("q", &completed(), &failed(), &failed(), Duration::ZERO);
        assert_eq!(summary.overall_status, OverallStatus::Partial);
        assert_eq!(summary.successful_stage_count, 1);
    }

    #[test]
    fn test_execution_time_serializes_as_seconds() {
        let summary = Summary::from_stages(
            "q",
            &completed(),
            &completed(),
            &completed(),
            Duration::from_millis(2500),
        );
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["execution_time"], 2.5);
        assert_eq!(json["overall_status"], "completed");

        let parsed: Summary = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.execution_time, Duration::from_millis(2500));
    }
}
