//! Polling job watcher: fixed-interval status refresh per watched job.
//!
//! [`JobWatcher`] is the substitution seam: the baseline
//! [`PollingJobWatcher`] polls the store on a fixed period, but a
//! push-based implementation (e.g. a change-feed) can replace it without
//! changing caller contracts.
//!
//! Each watch is its own session object owning its own cancellation
//! handle. The watch task is torn down exactly once, by whichever comes
//! first: a terminal status is observed, the [`JobWatch`] is dropped, or
//! [`JobWatch::stop`] is called — all three converge on the same handle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use colloquy_core::{
    defaults, AnalysisJob, Error, EventBus, JobStatus, JobStore, PipelineEvent, Result,
};

/// Seam for watching a job converge on a terminal state.
pub trait JobWatcher: Send + Sync {
    /// Begin watching a job. The returned watch owns its own teardown.
    fn watch(&self, job_id: Uuid) -> JobWatch;
}

/// Baseline watcher: one timer per watched job at a fixed period; each
/// tick performs one fetch-and-compare against the store.
pub struct PollingJobWatcher {
    store: Arc<dyn JobStore>,
    bus: Arc<EventBus>,
    interval: Duration,
}

impl PollingJobWatcher {
    /// Create a watcher with the default 2000 ms poll period.
    pub fn new(store: Arc<dyn JobStore>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            interval: Duration::from_millis(defaults::JOB_POLL_INTERVAL_MS),
        }
    }

    /// Override the poll period.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl JobWatcher for PollingJobWatcher {
    fn watch(&self, job_id: Uuid) -> JobWatch {
        let (update_tx, update_rx) = mpsc::channel(16);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let store = self.store.clone();
        let bus = self.bus.clone();
        let period = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last: Option<(JobStatus, i32)> = None;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!(%job_id, "Job watch cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let job = match store.get(job_id).await {
                            Ok(Some(job)) => job,
                            Ok(None) => {
                                warn!(%job_id, "Watched job not found; ending watch");
                                break;
                            }
                            Err(e) => {
                                // Transient fetch failure: keep the timer running.
                                warn!(%job_id, error = ?e, "Job poll failed");
                                continue;
                            }
                        };

                        let snapshot = (job.status, job.progress);
                        if last == Some(snapshot) {
                            continue;
                        }
                        last = Some(snapshot);

                        bus.emit(PipelineEvent::JobStatusChanged {
                            job_id,
                            kind: job.kind,
                            status: job.status,
                            progress: job.progress,
                            subject_id: job.subject_id.clone(),
                        });

                        let terminal = job.status.is_terminal();
                        if terminal {
                            // The terminal snapshot must reach the consumer.
                            let _ = update_tx.send(job).await;
                            debug!(%job_id, "Terminal status observed; ending watch");
                            break;
                        }
                        // Intermediate snapshots may be dropped if the
                        // consumer lags; freshness over completeness.
                        let _ = update_tx.try_send(job);
                    }
                }
            }
        });

        JobWatch {
            job_id,
            updates: update_rx,
            shutdown_tx,
            task: Some(task),
        }
    }
}

/// An active watch on one job, owning its cancellation handle.
pub struct JobWatch {
    job_id: Uuid,
    updates: mpsc::Receiver<AnalysisJob>,
    shutdown_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl JobWatch {
    /// The job being watched.
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Receive the next observed status change. Returns `None` once the
    /// watch has ended.
    pub async fn recv(&mut self) -> Option<AnalysisJob> {
        self.updates.recv().await
    }

    /// Wait for the first terminal observation and return it.
    ///
    /// The watch ends with that observation, so the caller applies the
    /// result exactly once even when later polls would re-observe the same
    /// terminal state.
    pub async fn wait_terminal(mut self) -> Result<AnalysisJob> {
        while let Some(job) = self.updates.recv().await {
            if job.status.is_terminal() {
                return Ok(job);
            }
        }
        Err(Error::Internal(format!(
            "Watch on job {} ended before a terminal status was observed",
            self.job_id
        )))
    }

    /// Explicitly cancel the watch and wait for the task to wind down.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for JobWatch {
    fn drop(&mut self) {
        // Watching context discarded: tear the task down if still running.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watch_handle_exposes_job_id() {
        // A watcher over an empty stub store still hands back a watch bound
        // to the requested id.
        struct EmptyStore;

        #[async_trait::async_trait]
        impl JobStore for EmptyStore {
            async fn submit(
                &self,
                _req: colloquy_core::SubmitJobRequest,
            ) -> Result<Uuid> {
                Err(Error::Internal("unused".into()))
            }
            async fn record_terminal(&self, _job: AnalysisJob) -> Result<Uuid> {
                Err(Error::Internal("unused".into()))
            }
            async fn get(&self, _job_id: Uuid) -> Result<Option<AnalysisJob>> {
                Ok(None)
            }
            async fn claim_next(
                &self,
                _kinds: &[colloquy_core::JobKind],
            ) -> Result<Option<AnalysisJob>> {
                Ok(None)
            }
            async fn update_progress(&self, _job_id: Uuid, _percent: i32) -> Result<()> {
                Ok(())
            }
            async fn complete(
                &self,
                _job_id: Uuid,
                _result: Option<serde_json::Value>,
            ) -> Result<()> {
                Ok(())
            }
            async fn fail(&self, _job_id: Uuid, _error: &str) -> Result<()> {
                Ok(())
            }
            async fn list_for_subject(&self, _subject_id: &str) -> Result<Vec<AnalysisJob>> {
                Ok(Vec::new())
            }
            async fn pending_count(&self) -> Result<i64> {
                Ok(0)
            }
        }

        let watcher = PollingJobWatcher::new(
            Arc::new(EmptyStore),
            Arc::new(EventBus::new(8)),
        )
        .with_interval(Duration::from_millis(5));

        let job_id = Uuid::new_v4();
        let watch = watcher.watch(job_id);
        assert_eq!(watch.job_id(), job_id);
        watch.stop().await;
    }
}
