use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use metronome_core::{clock, Frequency, Job, JobStatus, StatusUpdate};
use metronome_runner::RunnerAdapter;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{DiscoveryError, Result};
use crate::{report_status, DiscoveryAdapter};

/// Failsafe backend for running the scheduler with nothing configured:
/// every poll discovers the same job due one minute out, and completion
/// persists nothing.
pub struct MockDiscovery {
    runner: Box<dyn RunnerAdapter>,
}

impl MockDiscovery {
    pub fn new(runner: Box<dyn RunnerAdapter>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl DiscoveryAdapter for MockDiscovery {
    fn which_discovery(&self) -> String {
        format!("Mock with runner: {}", self.runner.which_runner())
    }

    async fn get_jobs(&self, as_of: NaiveDateTime) -> Result<Vec<Job>> {
        debug!("mock discovery polled");
        if clock::is_zero(as_of) {
            return Err(DiscoveryError::ZeroTime);
        }
        Ok(vec![Job {
            token: "MOCKTOKEN".to_string(),
            job_name: String::new(),
            run_time: as_of + Duration::minutes(1),
            url_path: String::new(),
            frequency: Frequency::Minute.code(),
            active: true,
            payload: None,
            status: JobStatus::Unset,
        }])
    }

    async fn start_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()> {
        debug!(token = %job.token, "mock discovery start");
        report_status(update_tx, job, JobStatus::InProcess).await;
        self.runner.run_job(job).await?;
        Ok(())
    }

    async fn complete_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()> {
        debug!(token = %job.token, "mock discovery complete");
        report_status(update_tx, job, JobStatus::Done).await;
        Ok(())
    }
}
