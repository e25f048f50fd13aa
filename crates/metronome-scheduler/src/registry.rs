use chrono::NaiveDateTime;
use metronome_core::{Job, JobStatus, StatusUpdate};

/// In-memory collection of in-flight jobs, keyed by token.
///
/// Owned exclusively by the scheduler loop; dispatched tasks never touch it.
/// Invariants: a token appears at most once, and an entry leaves the
/// registry only when its status becomes `Done`.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Vec<Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a discovered job unless its token is already tracked.
    /// Admitted jobs enter with status `Received`. Returns whether the job
    /// was admitted.
    pub fn admit(&mut self, mut job: Job) -> bool {
        if self.jobs.iter().any(|j| j.token == job.token) {
            return false;
        }
        job.status = JobStatus::Received;
        self.jobs.push(job);
        true
    }

    /// Clones of every dispatchable job whose run time is due at `now`.
    ///
    /// Dispatchable means `Received`, or `Error` from a previous failed
    /// attempt: errored jobs are retried every tick, with no backoff, until
    /// the backend finally reports `Done`.
    pub fn due(&self, now: NaiveDateTime) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|j| {
                matches!(j.status, JobStatus::Received | JobStatus::Error(_))
                    && j.run_time <= now
            })
            .cloned()
            .collect()
    }

    /// Apply a status event from a dispatched task.
    ///
    /// Unknown tokens are a no-op. `Done` removes the entry — the registry's
    /// only removal path. Anything else overwrites the status in place.
    pub fn apply(&mut self, update: StatusUpdate) {
        let Some(idx) = self.jobs.iter().position(|j| j.token == update.token) else {
            return;
        };
        if update.status == JobStatus::Done {
            self.jobs.remove(idx);
        } else {
            self.jobs[idx].status = update.status;
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.jobs.iter().any(|j| j.token == token)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Current status of a tracked job.
    pub fn status(&self, token: &str) -> Option<&JobStatus> {
        self.jobs
            .iter()
            .find(|j| j.token == token)
            .map(|j| &j.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn job(token: &str, run_time: NaiveDateTime) -> Job {
        Job {
            token: token.into(),
            job_name: String::new(),
            run_time,
            url_path: String::new(),
            frequency: 2,
            active: true,
            payload: None,
            status: JobStatus::Unset,
        }
    }

    #[test]
    fn admit_sets_received_and_dedups_by_token() {
        let mut registry = JobRegistry::new();
        assert!(registry.admit(job("A", ts(10, 9, 15))));
        assert_eq!(registry.status("A"), Some(&JobStatus::Received));

        // Same token again is rejected, a new token is admitted.
        assert!(!registry.admit(job("A", ts(10, 9, 20))));
        assert!(registry.admit(job("B", ts(10, 9, 15))));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn done_removes_the_entry() {
        let mut registry = JobRegistry::new();
        registry.admit(job("A", ts(10, 9, 15)));

        registry.apply(StatusUpdate::new("A", JobStatus::Done));
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_token_update_is_a_noop() {
        let mut registry = JobRegistry::new();
        registry.admit(job("A", ts(10, 9, 15)));

        registry.apply(StatusUpdate::new("X", JobStatus::Done));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.status("A"), Some(&JobStatus::Received));
    }

    #[test]
    fn non_done_updates_overwrite_in_place() {
        let mut registry = JobRegistry::new();
        registry.admit(job("A", ts(10, 9, 15)));

        registry.apply(StatusUpdate::new("A", JobStatus::InProcess));
        assert_eq!(registry.status("A"), Some(&JobStatus::InProcess));

        registry.apply(StatusUpdate::new("A", JobStatus::Error("boom".into())));
        assert_eq!(
            registry.status("A"),
            Some(&JobStatus::Error("boom".into()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn due_requires_received_status_and_elapsed_run_time() {
        let mut registry = JobRegistry::new();
        registry.admit(job("PAST", ts(10, 9, 0)));
        registry.admit(job("NOW", ts(10, 9, 15)));
        registry.admit(job("FUTURE", ts(10, 9, 16)));
        registry.admit(job("RUNNING", ts(10, 9, 0)));
        registry.apply(StatusUpdate::new("RUNNING", JobStatus::InProcess));

        let due = registry.due(ts(10, 9, 15));
        let tokens: Vec<_> = due.iter().map(|j| j.token.as_str()).collect();
        assert_eq!(tokens, vec!["PAST", "NOW"]);
    }

    #[test]
    fn errored_jobs_are_due_again() {
        let mut registry = JobRegistry::new();
        registry.admit(job("A", ts(10, 9, 0)));
        registry.apply(StatusUpdate::new("A", JobStatus::Error("boom".into())));

        let due = registry.due(ts(10, 9, 15));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].token, "A");
    }
}
