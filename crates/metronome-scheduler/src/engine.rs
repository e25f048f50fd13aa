use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use metronome_core::clock::truncate_to_minute;
use metronome_core::config::{TICK_INTERVAL_SECS, UPDATE_CHANNEL_CAPACITY};
use metronome_core::sink::LogSink;
use metronome_core::{Clock, JobStatus, StatusUpdate};
use metronome_discovery::DiscoveryAdapter;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::registry::JobRegistry;

/// The scheduling orchestrator: one control loop reconciling the minute
/// timer with the inbound status-update stream.
///
/// The engine owns the registry outright. Dispatched tasks get a clone of
/// the job and a sender half of the update channel; every registry mutation
/// happens in the loop when their reports arrive, so there is a single
/// writer and no lock.
pub struct SchedulerEngine {
    registry: JobRegistry,
    discovery: Arc<dyn DiscoveryAdapter>,
    sink: Arc<dyn LogSink>,
    clock: Clock,
    update_tx: mpsc::Sender<StatusUpdate>,
    update_rx: mpsc::Receiver<StatusUpdate>,
}

impl SchedulerEngine {
    pub fn new(
        discovery: Arc<dyn DiscoveryAdapter>,
        sink: Arc<dyn LogSink>,
        clock: Clock,
    ) -> Self {
        let (update_tx, update_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            registry: JobRegistry::new(),
            discovery,
            sink,
            clock,
            update_tx,
            update_rx,
        }
    }

    /// Main event loop. Reacts to the minute tick and to status updates,
    /// with no priority between them, until `shutdown` flips to true.
    ///
    /// Shutdown is abrupt: in-flight tasks are not drained.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.sink
            .set_message(&format!("Using discovery: {}", self.discovery.which_discovery()));
        info!(discovery = %self.discovery.which_discovery(), "scheduler engine started");

        let tick = Duration::from_secs(TICK_INTERVAL_SECS);
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
        loop {
            tokio::select! {
                Some(update) = self.update_rx.recv() => {
                    self.apply_update(update);
                }
                _ = interval.tick() => {
                    let now = truncate_to_minute(self.clock.now());
                    self.process_minute(now).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One tick: admit newly discovered jobs, then dispatch everything due.
    /// `now` must already be truncated to the minute.
    pub async fn process_minute(&mut self, now: NaiveDateTime) {
        self.check_for_jobs(now).await;
        self.dispatch_due(now);
    }

    /// Receive and apply the next status update. Returns false once the
    /// channel is closed. The run loop drives this via `select!`; callers
    /// stepping the engine manually (tests, embedders) use it directly.
    pub async fn pump_update(&mut self) -> bool {
        match self.update_rx.recv().await {
            Some(update) => {
                self.apply_update(update);
                true
            }
            None => false,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Poll discovery and admit whatever the registry isn't tracking yet.
    /// A discovery failure is logged and the tick proceeds with zero
    /// admissions.
    async fn check_for_jobs(&mut self, now: NaiveDateTime) {
        let found = match self.discovery.get_jobs(now).await {
            Ok(found) => found,
            Err(e) => {
                error!(err = %e, "job discovery failed");
                self.sink.set_message(&format!("CheckForJobs: {e}"));
                return;
            }
        };
        for job in found {
            let token = job.token.clone();
            if self.registry.admit(job) {
                debug!(token = %token, "job admitted");
            }
        }
    }

    /// Spawn one task per due job: no concurrency limit, no queueing.
    /// A start failure is reported but does not stop the completion attempt.
    fn dispatch_due(&self, now: NaiveDateTime) {
        for job in self.registry.due(now) {
            debug!(token = %job.token, run_time = %job.run_time, "dispatching job");
            let discovery = Arc::clone(&self.discovery);
            let sink = Arc::clone(&self.sink);
            let update_tx = self.update_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = discovery.start_job(&job, &update_tx).await {
                    warn!(token = %job.token, err = %e, "job start failed");
                    sink.set_message(&format!("RunJobs: {e}"));
                    report(&update_tx, &job.token, JobStatus::Error(e.to_string())).await;
                }
                if let Err(e) = discovery.complete_job(&job, &update_tx).await {
                    warn!(token = %job.token, err = %e, "job completion failed");
                    sink.set_message(&format!("CompleteJobs: {e}"));
                    report(&update_tx, &job.token, JobStatus::Error(e.to_string())).await;
                }
            });
        }
    }

    fn apply_update(&mut self, update: StatusUpdate) {
        debug!(token = %update.token, status = %update.status, "status update");
        self.registry.apply(update);
    }
}

/// Send a status event to the loop; a closed channel means shutdown is in
/// progress, so the update is dropped with a warning.
async fn report(update_tx: &mpsc::Sender<StatusUpdate>, token: &str, status: JobStatus) {
    if update_tx
        .send(StatusUpdate::new(token, status))
        .await
        .is_err()
    {
        warn!(token = %token, "status channel closed, update dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use metronome_core::{Job, StatusUpdate};
    use metronome_discovery::{DiscoveryError, Result as DiscoveryResult};

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn job(token: &str, run_time: NaiveDateTime) -> Job {
        Job {
            token: token.into(),
            job_name: String::new(),
            run_time,
            url_path: String::new(),
            frequency: 2,
            active: true,
            payload: None,
            status: metronome_core::JobStatus::Unset,
        }
    }

    /// Scripted backend: serves a fixed job list and counts adapter calls.
    struct ScriptedDiscovery {
        jobs: Mutex<Vec<Job>>,
        fail_get: bool,
        fail_start: bool,
        fail_complete: bool,
        start_calls: AtomicUsize,
        complete_calls: AtomicUsize,
    }

    impl ScriptedDiscovery {
        fn serving(jobs: Vec<Job>) -> Self {
            Self {
                jobs: Mutex::new(jobs),
                fail_get: false,
                fail_start: false,
                fail_complete: false,
                start_calls: AtomicUsize::new(0),
                complete_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DiscoveryAdapter for ScriptedDiscovery {
        fn which_discovery(&self) -> String {
            "Scripted with runner: none".to_string()
        }

        async fn get_jobs(&self, _as_of: NaiveDateTime) -> DiscoveryResult<Vec<Job>> {
            if self.fail_get {
                return Err(DiscoveryError::Rpc("backend unreachable".to_string()));
            }
            Ok(self.jobs.lock().unwrap().clone())
        }

        async fn start_job(
            &self,
            job: &Job,
            update_tx: &mpsc::Sender<StatusUpdate>,
        ) -> DiscoveryResult<()> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(DiscoveryError::Rpc("start refused".to_string()));
            }
            let _ = update_tx
                .send(StatusUpdate::new(job.token.clone(), JobStatus::InProcess))
                .await;
            Ok(())
        }

        async fn complete_job(
            &self,
            job: &Job,
            update_tx: &mpsc::Sender<StatusUpdate>,
        ) -> DiscoveryResult<()> {
            self.complete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_complete {
                return Err(DiscoveryError::Rpc("persist refused".to_string()));
            }
            let _ = update_tx
                .send(StatusUpdate::new(job.token.clone(), JobStatus::Done))
                .await;
            Ok(())
        }
    }

    struct NullSink;
    impl LogSink for NullSink {
        fn set_message(&self, _msg: &str) {}
    }

    fn engine(discovery: Arc<ScriptedDiscovery>) -> SchedulerEngine {
        SchedulerEngine::new(discovery, Arc::new(NullSink), Clock::utc())
    }

    #[tokio::test]
    async fn due_job_runs_to_done_and_leaves_the_registry() {
        let discovery = Arc::new(ScriptedDiscovery::serving(vec![job("A", ts(9, 0))]));
        let mut engine = engine(Arc::clone(&discovery));

        engine.process_minute(ts(9, 15)).await;
        assert_eq!(engine.registry().len(), 1);

        // InProcess, then Done.
        assert!(engine.pump_update().await);
        assert_eq!(
            engine.registry().status("A"),
            Some(&JobStatus::InProcess)
        );
        assert!(engine.pump_update().await);
        assert!(engine.registry().is_empty());

        assert_eq!(discovery.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(discovery.complete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn job_is_dispatched_exactly_once_per_tick() {
        let discovery = Arc::new(ScriptedDiscovery::serving(vec![job("A", ts(9, 0))]));
        let mut engine = engine(Arc::clone(&discovery));

        engine.process_minute(ts(9, 15)).await;
        engine.pump_update().await;
        engine.pump_update().await;

        // Next tick rediscovers and readmits the token, then dispatches again.
        engine.process_minute(ts(9, 16)).await;
        engine.pump_update().await;
        engine.pump_update().await;
        assert_eq!(discovery.start_calls.load(Ordering::SeqCst), 2);
        assert!(engine.registry().is_empty());
    }

    #[tokio::test]
    async fn not_yet_due_job_is_admitted_but_not_dispatched() {
        let discovery = Arc::new(ScriptedDiscovery::serving(vec![job("A", ts(9, 17))]));
        let mut engine = engine(Arc::clone(&discovery));

        engine.process_minute(ts(9, 15)).await;
        assert_eq!(engine.registry().status("A"), Some(&JobStatus::Received));
        assert_eq!(discovery.start_calls.load(Ordering::SeqCst), 0);

        // Awaiting the dispatched task's updates forces it to run.
        engine.process_minute(ts(9, 17)).await;
        engine.pump_update().await;
        engine.pump_update().await;
        assert_eq!(discovery.start_calls.load(Ordering::SeqCst), 1);
        assert!(engine.registry().is_empty());
    }

    #[tokio::test]
    async fn failed_completion_keeps_the_job_and_retries_next_tick() {
        let mut discovery = ScriptedDiscovery::serving(vec![job("A", ts(9, 0))]);
        discovery.fail_complete = true;
        let discovery = Arc::new(discovery);
        let mut engine = engine(Arc::clone(&discovery));

        engine.process_minute(ts(9, 15)).await;
        // InProcess from start, then the engine's Error report.
        engine.pump_update().await;
        engine.pump_update().await;

        assert_eq!(engine.registry().len(), 1);
        assert!(matches!(
            engine.registry().status("A"),
            Some(JobStatus::Error(_))
        ));

        // Backoff-free retry on the following tick.
        engine.process_minute(ts(9, 16)).await;
        engine.pump_update().await;
        engine.pump_update().await;
        assert_eq!(discovery.start_calls.load(Ordering::SeqCst), 2);
        assert_eq!(discovery.complete_calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.registry().len(), 1);
    }

    #[tokio::test]
    async fn failed_start_still_attempts_completion() {
        let mut discovery = ScriptedDiscovery::serving(vec![job("A", ts(9, 0))]);
        discovery.fail_start = true;
        let discovery = Arc::new(discovery);
        let mut engine = engine(Arc::clone(&discovery));

        engine.process_minute(ts(9, 15)).await;
        // Error from the failed start, then Done from completion.
        engine.pump_update().await;
        engine.pump_update().await;

        assert_eq!(discovery.complete_calls.load(Ordering::SeqCst), 1);
        assert!(engine.registry().is_empty());
    }

    #[tokio::test]
    async fn discovery_failure_is_not_fatal() {
        let mut discovery = ScriptedDiscovery::serving(vec![job("A", ts(9, 0))]);
        discovery.fail_get = true;
        let discovery = Arc::new(discovery);
        let mut engine = engine(Arc::clone(&discovery));

        engine.process_minute(ts(9, 15)).await;
        assert!(engine.registry().is_empty());
        assert_eq!(discovery.start_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn report_on_closed_channel_is_dropped_without_panic() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        report(&tx, "A", JobStatus::Done).await;
    }

    #[tokio::test]
    async fn rediscovered_token_is_not_duplicated() {
        let discovery = Arc::new(ScriptedDiscovery::serving(vec![job("A", ts(9, 17))]));
        let mut engine = engine(Arc::clone(&discovery));

        engine.process_minute(ts(9, 15)).await;
        engine.process_minute(ts(9, 16)).await;
        assert_eq!(engine.registry().len(), 1);
    }
}
