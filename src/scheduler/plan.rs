use thiserror::Error;

use super::SchedulerSettings;
use crate::predict::PassDescriptor;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("predictor returned no passes")]
    NoCandidates,
    #[error("candidate {index} is invalid: {reason}")]
    InvalidCandidate { index: usize, reason: String },
}

/// Outcome of one scan, computed from the clock and the candidates alone.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    /// Pass to prepare now and when to end it, if AOS is within the horizon
    pub prepare: Option<(PassDescriptor, f64)>,
    pub next_scan_at: f64,
    /// Seconds from `now` until the earliest AOS
    pub until_aos: f64,
}

pub fn plan_scan(
    now: f64,
    candidates: Vec<PassDescriptor>,
    settings: &SchedulerSettings,
) -> Result<ScanPlan, PlanError> {
    for (index, pass) in candidates.iter().enumerate() {
        pass.validate()
            .map_err(|reason| PlanError::InvalidCandidate { index, reason })?;
    }

    // Candidates should already be sorted by AOS, but do not rely on it
    let next = candidates
        .into_iter()
        .min_by(|a, b| a.aos.total_cmp(&b.aos))
        .ok_or(PlanError::NoCandidates)?;

    let until_aos = next.aos - now;
    if until_aos < settings.horizon.as_secs_f64() {
        let end_at = next.los + settings.end_delay.as_secs_f64();
        let delay = settings
            .min_rescan
            .as_secs_f64()
            .max(until_aos + settings.settle.as_secs_f64());
        Ok(ScanPlan {
            prepare: Some((next, end_at)),
            next_scan_at: now + delay,
            until_aos,
        })
    } else {
        Ok(ScanPlan {
            prepare: None,
            next_scan_at: now + settings.default_rescan.as_secs_f64(),
            until_aos,
        })
    }
}
