//! `metronome-discovery` — backends that supply due jobs and persist their
//! next schedule.
//!
//! Each adapter implements the same contract: `get_jobs` returns active jobs
//! due within the 3-minute look-ahead window, `start_job` reports
//! `InProcess` and triggers the configured runner, and `complete_job`
//! advances the schedule through the recurrence engine, persists it, and
//! reports `Done`. Status reports travel over the shared mpsc channel back
//! to the scheduler loop; a backend whose store can be hit by several
//! in-flight tasks at once serializes its own read-modify-write access.

pub mod api;
pub mod db;
pub mod error;
pub mod file;
pub mod mock;
pub mod rpc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use metronome_core::{Job, JobStatus, StatusUpdate};
use tokio::sync::mpsc;
use tracing::warn;

pub use api::ApiDiscovery;
pub use db::DbDiscovery;
pub use error::{DiscoveryError, Result};
pub use file::FileDiscovery;
pub use mock::MockDiscovery;
pub use rpc::RpcDiscovery;

/// A backend integration supplying due jobs and persisting their schedule.
#[async_trait]
pub trait DiscoveryAdapter: Send + Sync {
    /// Diagnostic name, including the active runner's.
    fn which_discovery(&self) -> String;

    /// Jobs whose run time falls within the look-ahead window from `as_of`
    /// and whose active flag is set. Fails with `ZeroTime` on the
    /// uninitialized timestamp sentinel.
    async fn get_jobs(&self, as_of: NaiveDateTime) -> Result<Vec<Job>>;

    /// Report `InProcess` on `update_tx`, then trigger execution via the
    /// configured runner.
    async fn start_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()>;

    /// Advance the job's schedule, persist the new run time and active flag,
    /// then report `Done`. On failure the caller reports `Error` instead.
    async fn complete_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()>;
}

/// Send a status report for `job`; a closed channel means the scheduler loop
/// is gone, so the update is dropped with a warning.
pub(crate) async fn report_status(
    update_tx: &mpsc::Sender<StatusUpdate>,
    job: &Job,
    status: JobStatus,
) {
    if update_tx
        .send(StatusUpdate::new(job.token.clone(), status))
        .await
        .is_err()
    {
        warn!(token = %job.token, "status channel closed, update dropped");
    }
}
