use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use metronome_core::Job;
use metronome_proto::{methods, ReqFrame, ResFrame};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

use crate::error::{Result, RunnerError};
use crate::RunnerAdapter;

/// Triggers a job over the newline-delimited JSON wire: one `job.run`
/// request to the service at `url_path`, one response back.
pub struct RpcRunner;

#[async_trait]
impl RunnerAdapter for RpcRunner {
    fn which_runner(&self) -> &str {
        "RPC"
    }

    async fn run_job(&self, job: &Job) -> Result<()> {
        let stream = TcpStream::connect(&job.url_path).await?;
        let mut framed = Framed::new(stream, LinesCodec::new());

        let req = ReqFrame::new(methods::JOB_RUN, Some(serde_json::to_value(job)?));
        framed
            .send(serde_json::to_string(&req)?)
            .await
            .map_err(|e| RunnerError::Rpc(e.to_string()))?;

        let line = framed
            .next()
            .await
            .ok_or_else(|| RunnerError::Rpc("connection closed before response".to_string()))?
            .map_err(|e| RunnerError::Rpc(e.to_string()))?;
        let res: ResFrame = serde_json::from_str(&line)?;
        if !res.ok {
            return Err(RunnerError::Rpc(res.error_message()));
        }
        Ok(())
    }
}
