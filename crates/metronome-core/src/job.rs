use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The unit of scheduled work.
///
/// A `Job` is born when a discovery backend returns it from `get_jobs`; the
/// registry holds a transient in-flight projection of it while the backend's
/// own record stays the system of record. `frequency` is carried as the raw
/// persisted code and only validated when the recurrence engine runs, so an
/// unknown code surfaces as a completion failure rather than a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Globally unique identifier — the registry's primary key.
    pub token: String,
    /// Descriptive label, optional.
    #[serde(default)]
    pub job_name: String,
    /// The next instant this job should fire. Minute granularity is the only
    /// precision scheduling decisions care about.
    pub run_time: NaiveDateTime,
    /// Opaque destination string interpreted by the runner backend.
    #[serde(default)]
    pub url_path: String,
    /// Raw recurrence code, see [`crate::frequency::Frequency`].
    pub frequency: i32,
    /// When false the job is no longer rediscovered (used by `Once`).
    #[serde(default)]
    pub active: bool,
    /// Opaque blob passed through to execution, uninterpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Registry-local lifecycle state — never persisted by backends.
    #[serde(skip)]
    pub status: JobStatus,
}

/// Registry-local lifecycle state of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JobStatus {
    /// Fresh from a backend, not yet admitted into the registry.
    #[default]
    Unset,
    /// Admitted into the registry, waiting to be dispatched.
    Received,
    /// A dispatched task has started execution.
    InProcess,
    /// Execution and schedule persistence finished; removes the entry.
    Done,
    /// The last start or completion attempt failed; retried next tick.
    Error(String),
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Unset => write!(f, ""),
            JobStatus::Received => write!(f, "Received"),
            JobStatus::InProcess => write!(f, "In Process"),
            JobStatus::Done => write!(f, "Done"),
            JobStatus::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Status event sent from a dispatched task back to the scheduler loop.
///
/// Tasks never touch the registry directly; every mutation funnels through
/// the loop as one of these.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub token: String,
    pub status: JobStatus,
}

impl StatusUpdate {
    pub fn new(token: impl Into<String>, status: JobStatus) -> Self {
        Self {
            token: token.into(),
            status,
        }
    }
}
