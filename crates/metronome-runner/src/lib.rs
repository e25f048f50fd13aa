//! `metronome-runner` — backends that trigger a job's target action.
//!
//! A runner is invoked by a discovery backend during `start_job`; it never
//! talks to the scheduler loop itself. The job's `url_path` tells the runner
//! where the action lives: an HTTP endpoint for [`ApiRunner`], a host:port
//! job service for [`RpcRunner`], or nothing at all for [`MockRunner`].

pub mod api;
pub mod error;
pub mod mock;
pub mod rpc;

use async_trait::async_trait;
use metronome_core::Job;

pub use api::ApiRunner;
pub use error::{Result, RunnerError};
pub use mock::MockRunner;
pub use rpc::RpcRunner;

/// Executes a job's external action.
#[async_trait]
pub trait RunnerAdapter: Send + Sync {
    /// Diagnostic name.
    fn which_runner(&self) -> &str;

    /// Trigger the job's target action; the job record is passed through
    /// opaquely (payload included).
    async fn run_job(&self, job: &Job) -> Result<()>;
}
