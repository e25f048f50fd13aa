//! `metronome-core` — shared types for the metronome scheduler.
//!
//! Holds the job data model, the recurrence engine that advances a job's
//! run time after each completion, the process-wide time policy, the
//! configuration layer, and the diagnostic log sinks. Everything here is
//! I/O-free apart from the sinks; the discovery and runner backends live in
//! their own crates.

pub mod clock;
pub mod config;
pub mod error;
pub mod frequency;
pub mod job;
pub mod sink;

pub use clock::Clock;
pub use config::MetronomeConfig;
pub use error::{CoreError, Result};
pub use frequency::Frequency;
pub use job::{Job, JobStatus, StatusUpdate};
