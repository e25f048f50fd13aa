use async_trait::async_trait;
use metronome_core::Job;

use crate::error::{Result, RunnerError};
use crate::RunnerAdapter;

/// Triggers a job by POSTing its record as JSON to `url_path`.
///
/// The receiving service owns the work from there; a 204 acknowledges the
/// trigger, anything else is a runner failure.
pub struct ApiRunner {
    client: reqwest::Client,
}

impl ApiRunner {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ApiRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunnerAdapter for ApiRunner {
    fn which_runner(&self) -> &str {
        "API"
    }

    async fn run_job(&self, job: &Job) -> Result<()> {
        let resp = self.client.post(&job.url_path).json(job).send().await?;
        let got = resp.status().as_u16();
        if got != 204 {
            return Err(RunnerError::UnexpectedStatus { got, want: 204 });
        }
        Ok(())
    }
}
