use chrono::{Datelike, Days, Duration, Months, NaiveDateTime, Timelike};

use crate::clock::truncate_to_minute;
use crate::error::{CoreError, Result};
use crate::job::Job;

/// How a job's run time advances after each completion.
///
/// The discriminants are the integer codes every discovery backend persists.
///
/// | Code | Name      | Effect                          |
/// |------|-----------|---------------------------------|
/// | 1    | Once      | deactivate, run time unchanged  |
/// | 2    | Minute    | +1 minute                       |
/// | 3    | Hourly    | +60 minutes                     |
/// | 4    | Daily     | +1 calendar day                 |
/// | 5    | Weekly    | +7 calendar days                |
/// | 6    | Monthly   | +1 calendar month               |
/// | 7    | Quarterly | +3 calendar years               |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Frequency {
    Once = 1,
    Minute = 2,
    Hourly = 3,
    Daily = 4,
    Weekly = 5,
    Monthly = 6,
    Quarterly = 7,
}

impl Frequency {
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for Frequency {
    type Error = CoreError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(Frequency::Once),
            2 => Ok(Frequency::Minute),
            3 => Ok(Frequency::Hourly),
            4 => Ok(Frequency::Daily),
            5 => Ok(Frequency::Weekly),
            6 => Ok(Frequency::Monthly),
            7 => Ok(Frequency::Quarterly),
            other => Err(CoreError::InvalidFrequency(other)),
        }
    }
}

/// Advance `job.run_time` (and possibly `job.active`) to its next occurrence
/// relative to `now`.
///
/// When the stored schedule has fallen behind the wall clock the run time is
/// first rebased onto today before the interval is applied: `Minute` takes
/// now's hour and minute, `Hourly` takes now's hour but keeps the original
/// minute-of-hour, every other frequency keeps the original hour and minute.
///
/// Deterministic given its inputs, no side effects beyond the job mutation.
/// Fails with `InvalidFrequency` (run time untouched) on an unknown code.
/// Calendar steps add date components rather than fixed durations, so
/// time-of-day survives month-length differences; a day-of-month the target
/// month lacks renormalizes into the following month.
pub fn advance(job: &mut Job, now: NaiveDateTime) -> Result<()> {
    let freq = Frequency::try_from(job.frequency)?;

    let trunc_now = truncate_to_minute(now);
    let trunc_run = truncate_to_minute(job.run_time);
    if trunc_now > trunc_run {
        job.run_time = match freq {
            Frequency::Minute => trunc_now,
            Frequency::Hourly => {
                trunc_now - Duration::minutes(i64::from(trunc_now.minute()))
                    + Duration::minutes(i64::from(trunc_run.minute()))
            }
            _ => trunc_now.date().and_time(trunc_run.time()),
        };
    }

    match freq {
        Frequency::Once => job.active = false,
        Frequency::Minute => job.run_time += Duration::minutes(1),
        Frequency::Hourly => job.run_time += Duration::minutes(60),
        Frequency::Daily => job.run_time = job.run_time + Days::new(1),
        Frequency::Weekly => job.run_time = job.run_time + Days::new(7),
        Frequency::Monthly => job.run_time = add_months(job.run_time, 1),
        // Three years, not three months: stored schedules were written
        // against this behavior, so it stays. See DESIGN.md.
        Frequency::Quarterly => job.run_time = add_months(job.run_time, 36),
    }
    Ok(())
}

/// Add calendar months component-wise: the day-of-month is kept, and when
/// the target month is shorter it overflows into the following month
/// (Jan 31 + 1 month = Mar 2) instead of clamping.
fn add_months(t: NaiveDateTime, months: u32) -> NaiveDateTime {
    let day0 = u64::from(t.day0());
    t - Days::new(day0) + Months::new(months) + Days::new(day0)
}
