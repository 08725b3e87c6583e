//! Job state machine, watcher, worker, and execution strategy tests over
//! the in-memory job store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::sleep;

use colloquy_core::{EventBus, JobKind, JobStatus, JobStore, SubmitJobRequest};
use colloquy_db::MemoryJobStore;
use colloquy_jobs::{
    InlineRunner, JobContext, JobHandler, JobResult, JobRunner, JobWatcher, NoOpHandler,
    PollingJobWatcher, QueuedRunner, WorkerBuilder, WorkerConfig,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn fast_watcher(store: &MemoryJobStore, bus: &Arc<EventBus>) -> PollingJobWatcher {
    PollingJobWatcher::new(Arc::new(store.clone()), bus.clone())
        .with_interval(Duration::from_millis(5))
}

#[tokio::test]
async fn scenario_c_double_submit_returns_identical_id() {
    init_tracing();
    let store = MemoryJobStore::new();
    let runner = QueuedRunner::new(Arc::new(store.clone()));

    let first = runner
        .submit(SubmitJobRequest::new(JobKind::Diarization, "X", "U"))
        .await
        .unwrap();
    let second = runner
        .submit(SubmitJobRequest::new(JobKind::Diarization, "X", "U"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(store.len(), 1, "no duplicate row was created");
}

#[tokio::test]
async fn poll_on_terminal_job_is_stable() {
    init_tracing();
    let store = MemoryJobStore::new();
    let id = store
        .submit(SubmitJobRequest::new(JobKind::Transcription, "m", "u"))
        .await
        .unwrap();
    store
        .complete(id, Some(json!({"transcript": "hello"})))
        .await
        .unwrap();

    let first = store.get(id).await.unwrap().unwrap();
    let second = store.get(id).await.unwrap().unwrap();

    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(first.result, second.result);
    // Repeated polling performed no mutation.
    assert_eq!(first.updated_at, second.updated_at);
}

#[tokio::test]
async fn scenario_d_result_applied_exactly_once() {
    init_tracing();
    let store = MemoryJobStore::new();
    let bus = Arc::new(EventBus::new(64));

    let id = store
        .submit(SubmitJobRequest::new(JobKind::Transcription, "meeting-1", "user-1"))
        .await
        .unwrap();

    let watch = fast_watcher(&store, &bus).watch(id);

    // Drive pending(0%) → running(10..90%) → completed(100%) while the
    // watcher polls on its fixed interval.
    let driver = {
        let store = store.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            store.claim_next(&[JobKind::Transcription]).await.unwrap();
            for percent in [10, 50, 90] {
                store.update_progress(id, percent).await.unwrap();
                sleep(Duration::from_millis(10)).await;
            }
            store
                .complete(id, Some(json!({"transcript": "done"})))
                .await
                .unwrap();
        })
    };

    let applications = AtomicUsize::new(0);
    let job = watch.wait_terminal().await.unwrap();
    applications.fetch_add(1, Ordering::SeqCst);

    driver.await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.result, Some(json!({"transcript": "done"})));
    assert_eq!(applications.load(Ordering::SeqCst), 1);

    // Two consecutive polls after the fact both re-observe the same
    // terminal state; the watch has already ended and cannot re-deliver.
    let again = store.get(id).await.unwrap().unwrap();
    assert_eq!(again.status, JobStatus::Completed);
    assert_eq!(again.updated_at, job.updated_at);
}

#[tokio::test]
async fn watcher_observes_failed_job_with_verbatim_message() {
    init_tracing();
    let store = MemoryJobStore::new();
    let bus = Arc::new(EventBus::new(64));

    let id = store
        .submit(SubmitJobRequest::new(JobKind::Diarization, "m", "u"))
        .await
        .unwrap();
    let watch = fast_watcher(&store, &bus).watch(id);

    store.fail(id, "speaker model crashed: OOM").await.unwrap();

    let job = watch.wait_terminal().await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("speaker model crashed: OOM")
    );

    // The failed row is retained as history; resubmission creates a new job.
    let resubmitted = store
        .submit(SubmitJobRequest::new(JobKind::Diarization, "m", "u"))
        .await
        .unwrap();
    assert_ne!(resubmitted, id);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn watch_stop_tears_down_before_terminal() {
    init_tracing();
    let store = MemoryJobStore::new();
    let bus = Arc::new(EventBus::new(64));

    let id = store
        .submit(SubmitJobRequest::new(JobKind::Summarization, "m", "u"))
        .await
        .unwrap();

    // The job never progresses; explicit cancellation ends the watch.
    let watch = fast_watcher(&store, &bus).watch(id);
    sleep(Duration::from_millis(20)).await;
    watch.stop().await;

    let job = store.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test]
async fn worker_executes_queued_job_to_completion() {
    init_tracing();
    let store = MemoryJobStore::new();
    let bus = Arc::new(EventBus::new(64));

    let worker = WorkerBuilder::new(Arc::new(store.clone()), bus.clone())
        .with_config(WorkerConfig::default().with_poll_interval(10))
        .with_handler(NoOpHandler::new(JobKind::Transcription))
        .build()
        .await;
    let handle = worker.start();

    let runner = QueuedRunner::new(Arc::new(store.clone()));
    let id = runner
        .submit(SubmitJobRequest::new(JobKind::Transcription, "meeting-1", "user-1"))
        .await
        .unwrap();

    let job = fast_watcher(&store, &bus).watch(id).wait_terminal().await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn worker_marks_failed_job_with_handler_message() {
    init_tracing();

    struct BrokenHandler;

    #[async_trait]
    impl JobHandler for BrokenHandler {
        fn kind(&self) -> JobKind {
            JobKind::Diarization
        }

        async fn execute(&self, _ctx: JobContext) -> JobResult {
            JobResult::Failed("no speakers detected".to_string())
        }
    }

    let store = MemoryJobStore::new();
    let bus = Arc::new(EventBus::new(64));

    let worker = WorkerBuilder::new(Arc::new(store.clone()), bus.clone())
        .with_config(WorkerConfig::default().with_poll_interval(10))
        .with_handler(BrokenHandler)
        .build()
        .await;
    let handle = worker.start();

    let id = store
        .submit(SubmitJobRequest::new(JobKind::Diarization, "m", "u"))
        .await
        .unwrap();

    let job = fast_watcher(&store, &bus).watch(id).wait_terminal().await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("no speakers detected"));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn worker_ignores_kinds_without_handlers() {
    init_tracing();
    let store = MemoryJobStore::new();
    let bus = Arc::new(EventBus::new(64));

    let worker = WorkerBuilder::new(Arc::new(store.clone()), bus.clone())
        .with_config(WorkerConfig::default().with_poll_interval(5))
        .with_handler(NoOpHandler::new(JobKind::Transcription))
        .build()
        .await;
    let handle = worker.start();

    let id = store
        .submit(SubmitJobRequest::new(JobKind::Summarization, "m", "u"))
        .await
        .unwrap();

    sleep(Duration::from_millis(50)).await;
    let job = store.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending, "unclaimed without a handler");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn inline_runner_yields_immediately_terminal_job() {
    init_tracing();
    let store = MemoryJobStore::new();
    let bus = Arc::new(EventBus::new(64));

    let runner = InlineRunner::new(Arc::new(store.clone()), bus.clone())
        .with_handler(NoOpHandler::new(JobKind::Summarization));

    let id = runner
        .submit(SubmitJobRequest::new(JobKind::Summarization, "meeting-1", "user-1"))
        .await
        .unwrap();

    // The very first poll observes a terminal state: no pending/running
    // row was ever persisted.
    let job = store.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    // The same poll-until-terminal contract works unchanged.
    let watched = fast_watcher(&store, &bus).watch(id).wait_terminal().await.unwrap();
    assert_eq!(watched.id, id);
    assert_eq!(watched.status, JobStatus::Completed);
}

#[tokio::test]
async fn submit_distinct_kinds_run_in_parallel_rows() {
    init_tracing();
    let store = MemoryJobStore::new();
    let runner = QueuedRunner::new(Arc::new(store.clone()));

    let a = runner
        .submit(SubmitJobRequest::new(JobKind::Diarization, "X", "U"))
        .await
        .unwrap();
    let b = runner
        .submit(SubmitJobRequest::new(JobKind::Transcription, "X", "U"))
        .await
        .unwrap();

    assert_ne!(a, b, "dedup keys on (subject, kind, owner), not subject alone");
    assert_eq!(store.pending_count().await.unwrap(), 2);
}
