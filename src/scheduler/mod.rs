//! Predictive pass scheduler.
//!
//! Periodically asks the predictor for upcoming passes. When the next AOS
//! falls inside the horizon it prepares the passage on the router and arms a
//! one-shot job that ends it shortly after LOS.

mod jobs;
mod plan;
mod runner;

use std::time::Duration;

use serde::Deserialize;

pub use jobs::{JobKind, JobQueue};
pub use plan::{plan_scan, PlanError};
pub use runner::Scheduler;

/// What a scan does when the predictor hands back nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidCandidatePolicy {
    /// Stop scanning until restarted.
    Stall,
    /// Log and try again after the default re-scan delay.
    #[default]
    Reschedule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub candidates: usize,
    pub horizon: Duration,
    pub end_delay: Duration,
    pub fetch_retry: Duration,
    pub default_rescan: Duration,
    pub min_rescan: Duration,
    /// Added to the time until AOS so the next scan lands after the pass
    pub settle: Duration,
    pub poll_interval: Duration,
    pub on_invalid_candidates: InvalidCandidatePolicy,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            candidates: 10,
            horizon: Duration::from_secs(3600),
            end_delay: Duration::from_secs(60),
            fetch_retry: Duration::from_secs(10),
            default_rescan: Duration::from_secs(60 * 60),
            min_rescan: Duration::from_secs(60 * 60),
            settle: Duration::from_secs(20 * 60),
            poll_interval: Duration::from_secs(1),
            on_invalid_candidates: InvalidCandidatePolicy::default(),
        }
    }
}
