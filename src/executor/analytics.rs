// src/executor/analytics.rs
//! Per-agent reliability analytics
//!
//! Pure read-side fold over the task store's terminal records for one agent
//! within a trailing window. The reliability score is volume-aware: the raw
//! success rate is shrunk toward a neutral 50 when there are few samples,
//! so an agent with one lucky task does not outrank one with a thousand.

use crate::executor::task_store::{TaskStatus, TaskStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Prior sample weight in the reliability score; higher values require more
/// volume before the observed success rate dominates
const RELIABILITY_PRIOR_WEIGHT: f64 = 5.0;

/// Windowed analytics for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub agent_id: String,
    pub period_days: i64,

    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub timed_out_tasks: u64,

    /// Completed fraction of terminal tasks; 0.0 when there are none
    pub success_rate: f64,

    /// Mean execution time over terminal tasks with a recorded duration
    pub avg_duration_ms: f64,

    /// Volume-aware composite in 0..=100; exactly 50 for zero tasks
    pub reliability_score: f64,

    /// Terminal task counts per UTC day, oldest first
    pub daily: Vec<DailyCount>,
}

/// Task counts for one UTC day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: String,
    pub tasks: u64,
    pub completed: u64,
}

/// Folds terminal task records into per-agent summaries
pub struct AnalyticsAggregator {
    store: Arc<TaskStore>,
}

impl AnalyticsAggregator {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }

    /// Summarize an agent's terminal tasks created in the last `window_days`
    pub fn summarize(&self, agent_id: &str, window_days: i64) -> AnalyticsSummary {
        let cutoff = Utc::now() - Duration::days(window_days);
        self.summarize_since(agent_id, window_days, cutoff)
    }

    fn summarize_since(
        &self,
        agent_id: &str,
        window_days: i64,
        cutoff: DateTime<Utc>,
    ) -> AnalyticsSummary {
        let mut total = 0u64;
        let mut completed = 0u64;
        let mut failed = 0u64;
        let mut timed_out = 0u64;
        let mut duration_sum = 0u64;
        let mut duration_count = 0u64;
        let mut daily: BTreeMap<String, (u64, u64)> = BTreeMap::new();

        for record in self.store.list_by_agent(agent_id) {
            if !record.status.is_terminal() || record.created_at < cutoff {
                continue;
            }

            total += 1;
            match record.status {
                TaskStatus::Completed => completed += 1,
                TaskStatus::Failed => failed += 1,
                TaskStatus::TimedOut => timed_out += 1,
                _ => unreachable!("terminal filter"),
            }

            if let Some(duration) = record.duration_ms {
                duration_sum += duration;
                duration_count += 1;
            }

            let day = record.created_at.format("%Y-%m-%d").to_string();
            let entry = daily.entry(day).or_insert((0, 0));
            entry.0 += 1;
            if record.status == TaskStatus::Completed {
                entry.1 += 1;
            }
        }

        let success_rate = if total > 0 {
            completed as f64 / total as f64
        } else {
            0.0
        };

        let avg_duration_ms = if duration_count > 0 {
            duration_sum as f64 / duration_count as f64
        } else {
            0.0
        };

        AnalyticsSummary {
            agent_id: agent_id.to_string(),
            period_days: window_days,
            total_tasks: total,
            completed_tasks: completed,
            failed_tasks: failed,
            timed_out_tasks: timed_out,
            success_rate,
            avg_duration_ms,
            reliability_score: reliability_score(completed, total),
            daily: daily
                .into_iter()
                .map(|(date, (tasks, done))| DailyCount {
                    date,
                    tasks,
                    completed: done,
                })
                .collect(),
        }
    }
}

/// Shrink the observed success rate toward the neutral 50 for low volume:
/// `100 * (completed + w/2) / (total + w)`. Monotonic in the success rate
/// at fixed volume, and exactly 50 when there are no samples.
fn reliability_score(completed: u64, total: u64) -> f64 {
    let w = RELIABILITY_PRIOR_WEIGHT;
    100.0 * (completed as f64 + w / 2.0) / (total as f64 + w)
}
