//! Job execution strategies behind one submission contract.
//!
//! Two interchangeable strategies exist:
//!
//! - [`QueuedRunner`] inserts a pending row; a separate [`JobWorker`]
//!   claims and executes it, updating progress over time.
//! - [`InlineRunner`] performs the work synchronously and records a job
//!   already in a terminal state — no persisted pending/running row ever
//!   exists.
//!
//! Callers treat both identically: submit, poll until terminal, apply the
//! result or error exactly once.
//!
//! [`JobWorker`]: crate::worker::JobWorker

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use colloquy_core::{
    new_v7, AnalysisJob, EventBus, JobKind, JobStatus, JobStore, PipelineEvent, Result,
    SubmitJobRequest,
};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Common submission contract over both execution strategies.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Submit a job and return its id. Submission is idempotent per
    /// `(subject_id, kind, owner_id)` while a prior job is non-terminal.
    async fn submit(&self, req: SubmitJobRequest) -> Result<Uuid>;
}

/// Deferred strategy: enqueue a pending row for the worker.
pub struct QueuedRunner {
    store: Arc<dyn JobStore>,
}

impl QueuedRunner {
    /// Create a runner submitting against the given store.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobRunner for QueuedRunner {
    async fn submit(&self, req: SubmitJobRequest) -> Result<Uuid> {
        self.store.submit(req).await
    }
}

/// Inline strategy: run the handler now, persist only the terminal row.
pub struct InlineRunner {
    store: Arc<dyn JobStore>,
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
    bus: Arc<EventBus>,
}

impl InlineRunner {
    /// Create a runner with no handlers registered.
    pub fn new(store: Arc<dyn JobStore>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            bus,
        }
    }

    /// Register a handler for its job kind.
    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.insert(handler.kind(), Arc::new(handler));
        self
    }
}

#[async_trait]
impl JobRunner for InlineRunner {
    async fn submit(&self, req: SubmitJobRequest) -> Result<Uuid> {
        let handler = self
            .handlers
            .get(&req.kind)
            .cloned()
            .ok_or_else(|| {
                colloquy_core::Error::Internal(format!(
                    "No handler registered for job kind: {:?}",
                    req.kind
                ))
            })?;

        let now = Utc::now();
        let mut job = AnalysisJob {
            id: new_v7(),
            kind: req.kind,
            status: JobStatus::Pending,
            progress: 0,
            subject_id: req.subject_id,
            owner_id: req.owner_id,
            metadata: req.metadata,
            result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        // Progress from an inline run is observable on the bus only; the
        // store never sees a non-terminal row.
        let bus = self.bus.clone();
        let (job_id, kind, subject_id) = (job.id, job.kind, job.subject_id.clone());
        let ctx = JobContext::new(job.clone()).with_progress_callback(move |percent| {
            bus.emit(PipelineEvent::JobStatusChanged {
                job_id,
                kind,
                status: JobStatus::Running,
                progress: percent,
                subject_id: subject_id.clone(),
            });
        });

        match handler.execute(ctx).await {
            JobResult::Success(result) => {
                job.status = JobStatus::Completed;
                job.progress = 100;
                job.result = result;
                info!(
                    subsystem = "jobs",
                    component = "inline",
                    job_id = %job.id,
                    job_kind = ?job.kind,
                    "Inline job completed"
                );
            }
            JobResult::Failed(error) => {
                job.status = JobStatus::Failed;
                job.error_message = Some(error.clone());
                warn!(
                    subsystem = "jobs",
                    component = "inline",
                    job_id = %job.id,
                    job_kind = ?job.kind,
                    error = %error,
                    "Inline job failed"
                );
            }
        }
        job.updated_at = Utc::now();

        self.bus.emit(PipelineEvent::JobStatusChanged {
            job_id: job.id,
            kind: job.kind,
            status: job.status,
            progress: job.progress,
            subject_id: job.subject_id.clone(),
        });

        self.store.record_terminal(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::NoOpHandler;

    struct FailingHandler;

    #[async_trait]
    impl JobHandler for FailingHandler {
        fn kind(&self) -> JobKind {
            JobKind::Diarization
        }

        async fn execute(&self, _ctx: JobContext) -> JobResult {
            JobResult::Failed("diarization model unavailable".to_string())
        }
    }

    // The memory store lives in colloquy-db, which would be a circular dev
    // dependency from here; a minimal store stub is enough for these tests.
    #[derive(Default)]
    struct StubStore {
        recorded: std::sync::Mutex<Vec<AnalysisJob>>,
    }

    #[async_trait]
    impl JobStore for StubStore {
        async fn submit(&self, _req: SubmitJobRequest) -> Result<Uuid> {
            unreachable!("inline runner never calls submit")
        }

        async fn record_terminal(&self, job: AnalysisJob) -> Result<Uuid> {
            let id = job.id;
            self.recorded.lock().unwrap().push(job);
            Ok(id)
        }

        async fn get(&self, job_id: Uuid) -> Result<Option<AnalysisJob>> {
            Ok(self
                .recorded
                .lock()
                .unwrap()
                .iter()
                .find(|j| j.id == job_id)
                .cloned())
        }

        async fn claim_next(&self, _kinds: &[JobKind]) -> Result<Option<AnalysisJob>> {
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

    #[tokio::test]
    async fn test_inline_runner_records_completed_terminal_row() {
        let store = Arc::new(StubStore::default());
        let bus = Arc::new(EventBus::new(32));
        let runner = InlineRunner::new(store.clone(), bus)
            .with_handler(NoOpHandler::new(JobKind::Transcription));

        let id = runner
            .submit(SubmitJobRequest::new(JobKind::Transcription, "m", "u"))
            .await
            .unwrap();

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        // The store saw exactly one row, already terminal.
        assert_eq!(store.recorded.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inline_runner_records_failed_terminal_row() {
        let store = Arc::new(StubStore::default());
        let bus = Arc::new(EventBus::new(32));
        let runner = InlineRunner::new(store.clone(), bus).with_handler(FailingHandler);

        let id = runner
            .submit(SubmitJobRequest::new(JobKind::Diarization, "m", "u"))
            .await
            .unwrap();

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("diarization model unavailable")
        );
    }

    #[tokio::test]
    async fn test_inline_runner_unknown_kind_is_error() {
        let store = Arc::new(StubStore::default());
        let bus = Arc::new(EventBus::new(32));
        let runner = InlineRunner::new(store.clone(), bus);

        let result = runner
            .submit(SubmitJobRequest::new(JobKind::Summarization, "m", "u"))
            .await;
        assert!(result.is_err());
        assert!(store.recorded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inline_runner_emits_terminal_status_event() {
        let store = Arc::new(StubStore::default());
        let bus = Arc::new(EventBus::new(32));
        let mut rx = bus.subscribe();
        let runner = InlineRunner::new(store, bus)
            .with_handler(NoOpHandler::new(JobKind::Transcription));

        runner
            .submit(SubmitJobRequest::new(JobKind::Transcription, "m", "u"))
            .await
            .unwrap();

        // Progress events (50, 100) precede the terminal event.
        let mut saw_terminal = false;
        while let Ok(event) = rx.try_recv() {
            if let PipelineEvent::JobStatusChanged { status, .. } = event {
                if status == JobStatus::Completed {
                    saw_terminal = true;
                }
            }
        }
        assert!(saw_terminal);
    }
}
