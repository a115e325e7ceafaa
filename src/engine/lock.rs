use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Terminal claim on a job: either a driver won the race or the dispatcher
/// timed the job out. Once settled, a job never changes hands.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Claim {
    Assigned(String),
    Abandoned,
}

/// Cluster-wide mutually exclusive claim on the right to assign a job.
///
/// The vacant-entry insert is atomic with respect to all concurrent
/// callers, so exactly one `try_claim` per job returns true. A store-backed
/// implementation (conditional `UPDATE ... WHERE assigned_driver IS NULL`
/// or a SETNX) slots behind the same interface.
#[derive(Debug, Default)]
pub struct JobLock {
    claims: DashMap<String, Claim>,
}

impl JobLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// First caller wins; every later call for the same job returns false
    /// regardless of driver.
    pub fn try_claim(&self, job_id: &str, driver_id: &str) -> bool {
        match self.claims.entry(job_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Claim::Assigned(driver_id.to_string()));
                true
            }
        }
    }

    /// Settle the job as abandoned unless a driver already claimed it.
    /// Returns true when the abandonment won.
    pub fn try_abandon(&self, job_id: &str) -> bool {
        match self.claims.entry(job_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Claim::Abandoned);
                true
            }
        }
    }

    /// The winning driver, if any.
    pub fn holder(&self, job_id: &str) -> Option<String> {
        self.claims.get(job_id).and_then(|entry| match entry.value() {
            Claim::Assigned(driver) => Some(driver.clone()),
            Claim::Abandoned => None,
        })
    }

    /// Whether the job has reached a terminal claim (assigned or abandoned).
    pub fn is_settled(&self, job_id: &str) -> bool {
        self.claims.contains_key(job_id)
    }

    /// Drop the claim, e.g. when an external abandon-queue consumer
    /// requeues the job.
    pub fn release(&self, job_id: &str) {
        self.claims.remove(job_id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn exactly_one_concurrent_claim_wins() {
        let lock = Arc::new(JobLock::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let lock = lock.clone();
                thread::spawn(move || lock.try_claim("job-1", &format!("driver-{i}")))
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&w| w)
            .count();

        assert_eq!(wins, 1);
        assert!(lock.holder("job-1").is_some());
    }

    #[test]
    fn abandon_loses_to_an_existing_claim() {
        let lock = JobLock::new();

        assert!(lock.try_claim("job-1", "d1"));
        assert!(!lock.try_abandon("job-1"));
        assert_eq!(lock.holder("job-1"), Some("d1".to_string()));
    }

    #[test]
    fn claim_loses_to_an_abandoned_job() {
        let lock = JobLock::new();

        assert!(lock.try_abandon("job-1"));
        assert!(!lock.try_claim("job-1", "d1"));
        assert!(lock.holder("job-1").is_none());
        assert!(lock.is_settled("job-1"));
    }

    #[test]
    fn release_reopens_the_job() {
        let lock = JobLock::new();

        assert!(lock.try_claim("job-1", "d1"));
        lock.release("job-1");
        assert!(!lock.is_settled("job-1"));
        assert!(lock.try_claim("job-1", "d2"));
    }

    #[test]
    fn wins_count_across_threads_matches_holder() {
        let lock = Arc::new(JobLock::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let lock = lock.clone();
                thread::spawn(move || {
                    let id = format!("driver-{i}");
                    if lock.try_claim("job-2", &id) {
                        Some(id)
                    } else {
                        None
                    }
                })
            })
            .collect();

        let winners: Vec<String> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(winners.len(), 1);
        assert_eq!(lock.holder("job-2"), Some(winners[0].clone()));
    }
}
