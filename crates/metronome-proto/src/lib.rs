//! `metronome-proto` — wire frames for the RPC job service.
//!
//! The RPC discovery and runner backends speak newline-delimited JSON over
//! TCP: one request frame out, one response frame back per call. Frame
//! shapes live here so both sides of the connection (and external job
//! services) agree on the format.

pub mod frames;

pub use frames::{ErrorShape, ReqFrame, ResFrame};

/// Method names understood by a job service.
pub mod methods {
    /// Fetch jobs due within the look-ahead window. Params: `{ "run_time": .. }`.
    pub const JOB_GET: &str = "job.get";
    /// Persist a job's advanced schedule. Params: the job record.
    pub const JOB_COMPLETE: &str = "job.complete";
    /// Trigger a job's target action. Params: the job record.
    pub const JOB_RUN: &str = "job.run";
}
