use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use futures_util::{SinkExt, StreamExt};
use metronome_core::config::LOOKAHEAD_MINUTES;
use metronome_core::{clock, frequency, Clock, Job, JobStatus, StatusUpdate};
use metronome_proto::{methods, ReqFrame, ResFrame};
use metronome_runner::RunnerAdapter;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};

use crate::error::{DiscoveryError, Result};
use crate::{report_status, DiscoveryAdapter};

/// RPC backend: one newline-delimited JSON request per call to the job
/// service at `url`, one response frame back.
pub struct RpcDiscovery {
    url: String,
    runner: Box<dyn RunnerAdapter>,
    clock: Clock,
}

impl RpcDiscovery {
    pub fn new(url: impl Into<String>, runner: Box<dyn RunnerAdapter>, clock: Clock) -> Self {
        Self {
            url: url.into(),
            runner,
            clock,
        }
    }

    async fn call(&self, method: &str, params: Option<Value>) -> Result<ResFrame> {
        let stream = TcpStream::connect(&self.url).await?;
        let mut framed = Framed::new(stream, LinesCodec::new());

        let req = ReqFrame::new(method, params);
        framed
            .send(serde_json::to_string(&req)?)
            .await
            .map_err(|e| DiscoveryError::Rpc(e.to_string()))?;

        let line = framed
            .next()
            .await
            .ok_or_else(|| DiscoveryError::Rpc("connection closed before response".to_string()))?
            .map_err(|e| DiscoveryError::Rpc(e.to_string()))?;
        let res: ResFrame = serde_json::from_str(&line)?;
        if !res.ok {
            return Err(DiscoveryError::Rpc(res.error_message()));
        }
        Ok(res)
    }
}

#[async_trait]
impl DiscoveryAdapter for RpcDiscovery {
    fn which_discovery(&self) -> String {
        format!("RPC with runner: {}", self.runner.which_runner())
    }

    async fn get_jobs(&self, as_of: NaiveDateTime) -> Result<Vec<Job>> {
        if clock::is_zero(as_of) {
            return Err(DiscoveryError::ZeroTime);
        }
        let window_end = as_of + Duration::minutes(LOOKAHEAD_MINUTES);
        let res = self
            .call(
                methods::JOB_GET,
                Some(serde_json::json!({ "run_time": window_end })),
            )
            .await?;

        match res.payload {
            Some(payload) => Ok(serde_json::from_value(payload)?),
            None => Ok(Vec::new()),
        }
    }

    async fn start_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()> {
        report_status(update_tx, job, JobStatus::InProcess).await;
        self.runner.run_job(job).await?;
        Ok(())
    }

    async fn complete_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()> {
        let mut advanced = job.clone();
        frequency::advance(&mut advanced, self.clock.now())?;

        self.call(methods::JOB_COMPLETE, Some(serde_json::to_value(&advanced)?))
            .await?;

        report_status(update_tx, job, JobStatus::Done).await;
        Ok(())
    }
}
