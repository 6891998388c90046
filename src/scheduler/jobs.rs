/// One-shot scheduler actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Scan,
    EndPass,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Job {
    /// Epoch seconds
    pub due: f64,
    pub kind: JobKind,
}

/// Pending jobs, kept in due order. Jobs with the same due time run in
/// insertion order.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Vec<Job>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, due: f64, kind: JobKind) {
        let at = self.jobs.partition_point(|job| job.due <= due);
        self.jobs.insert(at, Job { due, kind });
    }

    /// Removes and returns the earliest job if it is due at `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<Job> {
        match self.jobs.first() {
            Some(job) if job.due <= now => Some(self.jobs.remove(0)),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
