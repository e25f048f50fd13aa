use async_trait::async_trait;
use metronome_core::Job;
use tracing::info;

use crate::error::Result;
use crate::RunnerAdapter;

/// Failsafe runner: logs the trigger and succeeds without doing anything.
pub struct MockRunner;

#[async_trait]
impl RunnerAdapter for MockRunner {
    fn which_runner(&self) -> &str {
        "Mock"
    }

    async fn run_job(&self, job: &Job) -> Result<()> {
        info!(token = %job.token, url = %job.url_path, "mock runner triggered");
        Ok(())
    }
}
