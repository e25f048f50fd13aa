use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use metronome_core::config::LOOKAHEAD_MINUTES;
use metronome_core::{clock, frequency, Clock, Job, JobStatus, StatusUpdate};
use metronome_runner::RunnerAdapter;
use rusqlite::Connection;
use tokio::sync::mpsc;

use crate::error::{DiscoveryError, Result};
use crate::{report_status, DiscoveryAdapter};

/// Stored timestamp format; lexicographic order matches chronological order
/// so the window comparison can happen in SQL.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// SQLite backend: jobs live in a `schedule` table and the advanced run time
/// is written back on completion.
pub struct DbDiscovery {
    conn: Arc<Mutex<Connection>>,
    runner: Box<dyn RunnerAdapter>,
    clock: Clock,
}

impl DbDiscovery {
    /// Open the schedule store at `path`. The daemon treats a failure here
    /// as fatal: the scheduler must not run against an unreachable store.
    pub fn open(path: &str, runner: Box<dyn RunnerAdapter>, clock: Clock) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, runner, clock)
    }

    /// Build the adapter around an existing connection (in-memory in tests).
    pub fn with_connection(
        conn: Connection,
        runner: Box<dyn RunnerAdapter>,
        clock: Clock,
    ) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            runner,
            clock,
        })
    }
}

/// Initialise the schedule schema in `conn` (idempotent), with an index on
/// `run_time` so the per-minute window query stays cheap.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schedule (
            token       TEXT    NOT NULL PRIMARY KEY,
            job_name    TEXT    NOT NULL DEFAULT '',
            run_time    TEXT    NOT NULL,   -- ISO-8601, minute precision matters
            url_path    TEXT    NOT NULL DEFAULT '',
            frequency   INTEGER NOT NULL,
            payload     TEXT,               -- opaque JSON or NULL
            active      INTEGER NOT NULL DEFAULT 1
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_schedule_run_time ON schedule (run_time);
        ",
    )?;
    Ok(())
}

fn parse_run_time(s: &str) -> Result<NaiveDateTime> {
    Ok(NaiveDateTime::parse_from_str(s, TIME_FORMAT)?)
}

#[async_trait]
impl DiscoveryAdapter for DbDiscovery {
    fn which_discovery(&self) -> String {
        format!("DB with runner: {}", self.runner.which_runner())
    }

    async fn get_jobs(&self, as_of: NaiveDateTime) -> Result<Vec<Job>> {
        if clock::is_zero(as_of) {
            return Err(DiscoveryError::ZeroTime);
        }
        let window_end = (as_of + Duration::minutes(LOOKAHEAD_MINUTES))
            .format(TIME_FORMAT)
            .to_string();

        let rows: Vec<(String, String, String, String, i32, Option<String>)> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare_cached(
                "SELECT token, job_name, run_time, url_path, frequency, payload
                 FROM schedule WHERE run_time <= ?1 AND active = 1",
            )?;
            let rows = stmt
                .query_map([&window_end], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i32>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut jobs = Vec::with_capacity(rows.len());
        for (token, job_name, run_time, url_path, frequency, payload) in rows {
            jobs.push(Job {
                token,
                job_name,
                run_time: parse_run_time(&run_time)?,
                url_path,
                frequency,
                active: true,
                payload: payload.map(|p| serde_json::from_str(&p)).transpose()?,
                status: JobStatus::Unset,
            });
        }
        Ok(jobs)
    }

    async fn start_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()> {
        report_status(update_tx, job, JobStatus::InProcess).await;
        self.runner.run_job(job).await?;
        Ok(())
    }

    async fn complete_job(&self, job: &Job, update_tx: &mpsc::Sender<StatusUpdate>) -> Result<()> {
        let mut advanced = job.clone();
        frequency::advance(&mut advanced, self.clock.now())?;

        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE schedule SET run_time = ?1, active = ?2 WHERE token = ?3",
                rusqlite::params![
                    advanced.run_time.format(TIME_FORMAT).to_string(),
                    advanced.active,
                    advanced.token,
                ],
            )?;
        }

        report_status(update_tx, job, JobStatus::Done).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metronome_runner::MockRunner;

    fn adapter_with(rows: &[(&str, &str, i32, bool)]) -> DbDiscovery {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        for (token, run_time, frequency, active) in rows {
            conn.execute(
                "INSERT INTO schedule (token, run_time, frequency, active)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![token, run_time, frequency, active],
            )
            .unwrap();
        }
        DbDiscovery::with_connection(conn, Box::new(MockRunner), Clock::utc()).unwrap()
    }

    #[tokio::test]
    async fn get_jobs_filters_window_and_active() {
        let adapter = adapter_with(&[
            ("DUE", "2020-01-01T00:00:00", 2, true),
            ("INACTIVE", "2020-01-01T00:00:00", 2, false),
            ("FUTURE", "2999-01-01T00:00:00", 2, true),
        ]);

        let jobs = adapter.get_jobs(Clock::utc().now()).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].token, "DUE");
        assert_eq!(jobs[0].frequency, 2);
        assert!(jobs[0].active);
    }

    #[tokio::test]
    async fn get_jobs_rejects_zero_time() {
        let adapter = adapter_with(&[]);
        let err = adapter.get_jobs(NaiveDateTime::default()).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::ZeroTime));
    }

    #[tokio::test]
    async fn get_jobs_honors_lookahead_window() {
        let soon = (Clock::utc().now() + Duration::minutes(2))
            .format(TIME_FORMAT)
            .to_string();
        let later = (Clock::utc().now() + Duration::minutes(10))
            .format(TIME_FORMAT)
            .to_string();
        let adapter = adapter_with(&[("SOON", &soon, 2, true), ("LATER", &later, 2, true)]);

        let jobs = adapter.get_jobs(Clock::utc().now()).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].token, "SOON");
    }

    #[tokio::test]
    async fn complete_job_persists_advanced_schedule() {
        let adapter = adapter_with(&[("DUE", "2020-01-01T00:00:00", 2, true)]);
        let jobs = adapter.get_jobs(Clock::utc().now()).await.unwrap();
        let (tx, mut rx) = mpsc::channel(4);

        adapter.complete_job(&jobs[0], &tx).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().status, JobStatus::Done);

        // The stored run time caught up past now; the job fell out of the window.
        let remaining = adapter.get_jobs(Clock::utc().now()).await.unwrap();
        assert!(remaining.iter().all(|j| j.token != "DUE" || j.run_time > Clock::utc().now()));
    }

    #[tokio::test]
    async fn complete_job_deactivates_once_jobs() {
        let adapter = adapter_with(&[("ONCE", "2020-01-01T00:00:00", 1, true)]);
        let jobs = adapter.get_jobs(Clock::utc().now()).await.unwrap();
        let (tx, _rx) = mpsc::channel(4);

        adapter.complete_job(&jobs[0], &tx).await.unwrap();

        // Deactivated: no longer discovered.
        let remaining = adapter.get_jobs(Clock::utc().now()).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn complete_job_with_invalid_frequency_fails_without_done() {
        let adapter = adapter_with(&[("BAD", "2020-01-01T00:00:00", 10, true)]);
        let jobs = adapter.get_jobs(Clock::utc().now()).await.unwrap();
        let (tx, mut rx) = mpsc::channel(4);

        let err = adapter.complete_job(&jobs[0], &tx).await.unwrap_err();
        assert!(err.to_string().contains("Invalid frequency"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn start_job_reports_in_process() {
        let adapter = adapter_with(&[("DUE", "2020-01-01T00:00:00", 2, true)]);
        let jobs = adapter.get_jobs(Clock::utc().now()).await.unwrap();
        let (tx, mut rx) = mpsc::channel(4);

        adapter.start_job(&jobs[0], &tx).await.unwrap();
        let update = rx.recv().await.unwrap();
        assert_eq!(update.status, JobStatus::InProcess);
    }
}
