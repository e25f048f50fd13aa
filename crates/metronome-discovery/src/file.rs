use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use metronome_core::config::LOOKAHEAD_MINUTES;
use metronome_core::{clock, frequency, Clock, Job, JobStatus, StatusUpdate};
use metronome_runner::RunnerAdapter;
use tokio::sync::{mpsc, Mutex};

use crate::error::{DiscoveryError, Result};
use crate::{report_status, DiscoveryAdapter};

/// Flat-file backend: the schedule is a JSON array of job records on disk.
///
/// Sample file content:
/// ```json
/// [
///   {
///     "token": "unique-id-like-uuid",
///     "run_time": "2024-01-10T09:15:00",
///     "url_path": "http://tasks.internal/report",
///     "frequency": 4,
///     "active": true
///   }
/// ]
/// ```
///
/// Several in-flight completion tasks may rewrite the file concurrently, so
/// the read-modify-write in `complete_job` holds `write_lock` throughout.
pub struct FileDiscovery {
    path: String,
    runner: Box<dyn RunnerAdapter>,
    clock: Clock,
    write_lock: Mutex<()>,
}

impl FileDiscovery {
    pub fn new(path: impl Into<String>, runner: Box<dyn RunnerAdapter>, clock: Clock) -> Self {
        Self {
            path: path.into(),
            runner,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<Job>> {
        let content = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&content)?)
    }
}

#[async_trait]
impl DiscoveryAdapter for FileDiscovery {
    fn which_discovery(&self) -> String {
        format!("File with runner: {}", self.runner.which_runner())
    }

    async fn get_jobs(&self, as_of: NaiveDateTime) -> Result<Vec<Job>> {
        if clock::is_zero(as_of) {
            return Err(DiscoveryError::ZeroTime);
        }
        let window_end = as_of + Duration::minutes(LOOKAHEAD_MINUTES);
        let jobs = self.load().await?;
        Ok(jobs
            .into_iter()
            .filter(|j| j.run_time <= window_end && j.active)
            .collect())
    }

    async fn start_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()> {
        report_status(update_tx, job, JobStatus::InProcess).await;
        self.runner.run_job(job).await?;
        Ok(())
    }

    async fn complete_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut jobs = self.load().await?;
        for stored in jobs.iter_mut() {
            if stored.token == job.token {
                frequency::advance(stored, self.clock.now())?;
            }
        }
        let content = serde_json::to_vec(&jobs)?;
        tokio::fs::write(&self.path, content).await?;

        report_status(update_tx, job, JobStatus::Done).await;
        Ok(())
    }
}
