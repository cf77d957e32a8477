//! Running workflow metrics.
//!
//! Keeps a query count and an incrementally updated mean latency. No
//! per-query history is retained.

use std::sync::RwLock;
use std::time::Duration;

use serde::Serialize;

use crate::domain::workflow::duration_secs;

/// Snapshot of the running totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsState {
    pub total_queries: u64,
    #[serde(with = "duration_secs")]
    pub average_latency: Duration,
}

/// Accumulates workflow execution times
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    state: RwLock<(u64, f64)>,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one workflow's execution time into the mean
    pub fn record(&self, execution_time: Duration) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let (count, mean) = &mut *state;
        *count += 1;
        *mean += (execution_time.as_secs_f64() - *mean) / *count as f64;
    }

    pub fn snapshot(&self) -> MetricsState {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let (total_queries, mean) = *state;
        MetricsState {
            total_queries,
            average_latency: Duration::from_secs_f64(mean.max(0.0)),
        }
    }
}
