//! `metronome-scheduler` — the per-minute poll/dispatch loop and its
//! in-memory job registry.
//!
//! # Overview
//!
//! [`SchedulerEngine`] blocks on whichever comes first: the one-minute timer
//! tick or an inbound status update from a dispatched task. Each tick asks
//! the discovery backend for due jobs, admits the ones it isn't already
//! tracking, and spawns one task per due job. Tasks report their lifecycle
//! (`InProcess`, `Done`, `Error`) back over a channel; the loop is the only
//! writer of the [`JobRegistry`], so the registry needs no lock.

pub mod engine;
pub mod registry;

pub use engine::SchedulerEngine;
pub use registry::JobRegistry;
