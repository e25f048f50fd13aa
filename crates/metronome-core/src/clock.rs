use chrono::{Duration, Local, NaiveDateTime, Timelike, Utc};

/// Process-wide time policy: every "now" and every truncation goes through
/// here so the whole scheduler agrees on one zone.
///
/// Times are handled as naive wall-clock values in the configured zone. When
/// mixing backends (database, API, RPC) make sure their stored timestamps use
/// the same zone as the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    use_utc: bool,
}

impl Clock {
    pub fn new(use_utc: bool) -> Self {
        Self { use_utc }
    }

    pub fn utc() -> Self {
        Self { use_utc: true }
    }

    /// Wall-clock now in the configured zone.
    pub fn now(&self) -> NaiveDateTime {
        if self.use_utc {
            Utc::now().naive_utc()
        } else {
            Local::now().naive_local()
        }
    }
}

/// Drop seconds and sub-second precision; scheduling decisions are made at
/// minute granularity.
pub fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t - Duration::seconds(i64::from(t.second())) - Duration::nanoseconds(i64::from(t.nanosecond()))
}

/// The uninitialized-timestamp sentinel rejected by `get_jobs`.
///
/// `NaiveDateTime::default()` is the Unix epoch; no real schedule
/// legitimately carries it.
pub fn is_zero(t: NaiveDateTime) -> bool {
    t == NaiveDateTime::default()
}
