use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use metronome_core::config::LOOKAHEAD_MINUTES;
use metronome_core::{clock, frequency, Clock, Job, JobStatus, StatusUpdate};
use metronome_runner::RunnerAdapter;
use tokio::sync::mpsc;

use crate::error::{DiscoveryError, Result};
use crate::{report_status, DiscoveryAdapter};

/// HTTP backend: due jobs come from `GET {get_url}/{unix_ts}` (the window
/// end as a unix timestamp), completions POST the advanced job to
/// `complete_url`.
pub struct ApiDiscovery {
    client: reqwest::Client,
    get_url: String,
    complete_url: String,
    runner: Box<dyn RunnerAdapter>,
    clock: Clock,
}

impl ApiDiscovery {
    pub fn new(
        get_url: impl Into<String>,
        complete_url: impl Into<String>,
        runner: Box<dyn RunnerAdapter>,
        clock: Clock,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            get_url: get_url.into(),
            complete_url: complete_url.into(),
            runner,
            clock,
        }
    }
}

#[async_trait]
impl DiscoveryAdapter for ApiDiscovery {
    fn which_discovery(&self) -> String {
        format!("API with runner: {}", self.runner.which_runner())
    }

    async fn get_jobs(&self, as_of: NaiveDateTime) -> Result<Vec<Job>> {
        if clock::is_zero(as_of) {
            return Err(DiscoveryError::ZeroTime);
        }
        let window_end = as_of + Duration::minutes(LOOKAHEAD_MINUTES);
        let url = format!("{}/{}", self.get_url, window_end.and_utc().timestamp());

        let resp = self.client.get(&url).send().await?;
        let got = resp.status().as_u16();
        if got != 200 {
            return Err(DiscoveryError::UnexpectedStatus { got, want: 200 });
        }
        Ok(resp.json().await?)
    }

    async fn start_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()> {
        report_status(update_tx, job, JobStatus::InProcess).await;
        self.runner.run_job(job).await?;
        Ok(())
    }

    async fn complete_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()> {
        let mut advanced = job.clone();
        frequency::advance(&mut advanced, self.clock.now())?;

        let resp = self
            .client
            .post(&self.complete_url)
            .json(&advanced)
            .send()
            .await?;
        let got = resp.status().as_u16();
        if got != 200 {
            return Err(DiscoveryError::UnexpectedStatus { got, want: 200 });
        }

        report_status(update_tx, job, JobStatus::Done).await;
        Ok(())
    }
}
