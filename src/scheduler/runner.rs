use log::{debug, error, info, warn};

use super::{plan_scan, InvalidCandidatePolicy, JobKind, JobQueue, PlanError, SchedulerSettings};
use crate::epoch::{now_epoch, utc_display};
use crate::rpc::{Predictor, RouterApi};
use crate::shutdown::Shutdown;

/// What a single scan ended up doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanOutcome {
    /// Pass prepared, end job armed.
    Armed { end_at: f64, next_scan_at: f64 },
    /// The router refused the pass. No end job.
    PrepareFailed { next_scan_at: f64 },
    /// Next AOS is beyond the horizon.
    Idle { next_scan_at: f64 },
    /// The predictor could not be reached.
    Retry { at: f64 },
    /// Nothing usable came back and scanning stopped.
    Stalled,
}

pub struct Scheduler<P, R> {
    predictor: P,
    router: R,
    settings: SchedulerSettings,
    jobs: JobQueue,
}

impl<P: Predictor, R: RouterApi> Scheduler<P, R> {
    pub fn new(predictor: P, router: R, settings: SchedulerSettings) -> Self {
        Self {
            predictor,
            router,
            settings,
            jobs: JobQueue::new(),
        }
    }

    #[cfg(test)]
    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    /// Runs the first scan immediately, then polls the job queue until
    /// shutdown.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!("Scheduler started");
        self.jobs.push(now_epoch(), JobKind::Scan);
        loop {
            self.run_due(now_epoch()).await;
            if self.jobs.is_empty() {
                warn!("No scan pending, scheduler idle until shutdown");
                shutdown.wait().await;
                break;
            }
            if !shutdown.sleep(self.settings.poll_interval).await {
                break;
            }
        }
        info!("Scheduler stopped");
    }

    /// Runs every job due at `now`, one at a time. Returns how many ran.
    pub async fn run_due(&mut self, now: f64) -> usize {
        let mut ran = 0;
        while let Some(job) = self.jobs.pop_due(now) {
            match job.kind {
                JobKind::Scan => {
                    self.scan(now).await;
                }
                JobKind::EndPass => self.end_pass().await,
            }
            ran += 1;
        }
        ran
    }

    pub async fn scan(&mut self, now: f64) -> ScanOutcome {
        let candidates = match self.predictor.next_passes(self.settings.candidates).await {
            Ok(candidates) => candidates,
            Err(e) => {
                let at = now + self.settings.fetch_retry.as_secs_f64();
                error!(
                    "Cannot get next passes: {}, retrying in {:?}",
                    e, self.settings.fetch_retry
                );
                self.jobs.push(at, JobKind::Scan);
                return ScanOutcome::Retry { at };
            }
        };
        for pass in &candidates {
            debug!(
                "Candidate: aos {} los {} max elevation {:.1} azimuth {:.1} -> {:.1}",
                display(pass.aos),
                display(pass.los),
                pass.max_elevation,
                pass.start_azimuth,
                pass.end_azimuth
            );
        }

        let plan = match plan_scan(now, candidates, &self.settings) {
            Ok(plan) => plan,
            Err(e) => return self.give_up(now, e),
        };
        debug!("{:.0} s until next AOS", plan.until_aos);

        let outcome = match plan.prepare {
            Some((pass, end_at)) => {
                info!("Pass at {} is imminent, preparing it", display(pass.aos));
                match self.router.prepare_pass(pass).await {
                    Ok(()) => {
                        info!("Pass ends at {}", display(end_at));
                        self.jobs.push(end_at, JobKind::EndPass);
                        ScanOutcome::Armed {
                            end_at,
                            next_scan_at: plan.next_scan_at,
                        }
                    }
                    Err(e) => {
                        error!("Cannot prepare pass: {}", e);
                        ScanOutcome::PrepareFailed {
                            next_scan_at: plan.next_scan_at,
                        }
                    }
                }
            }
            None => ScanOutcome::Idle {
                next_scan_at: plan.next_scan_at,
            },
        };

        info!("Next scan at {}", display(plan.next_scan_at));
        self.jobs.push(plan.next_scan_at, JobKind::Scan);
        outcome
    }

    async fn end_pass(&self) {
        info!("Pass finished");
        if let Err(e) = self.router.end_pass().await {
            error!("Cannot end pass: {}", e);
        }
    }

    fn give_up(&mut self, now: f64, err: PlanError) -> ScanOutcome {
        match self.settings.on_invalid_candidates {
            InvalidCandidatePolicy::Stall => {
                error!("{}, scanning stopped", err);
                ScanOutcome::Stalled
            }
            InvalidCandidatePolicy::Reschedule => {
                let next_scan_at = now + self.settings.default_rescan.as_secs_f64();
                warn!("{}, next scan at {}", err, display(next_scan_at));
                self.jobs.push(next_scan_at, JobKind::Scan);
                ScanOutcome::Idle { next_scan_at }
            }
        }
    }
}

fn display(epoch: f64) -> String {
    utc_display(epoch).unwrap_or_else(|| format!("{:.0}", epoch))
}
