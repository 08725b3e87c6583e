//! # colloquy-jobs
//!
//! Analysis job execution and the insight-extraction pipeline for colloquy.
//!
//! This crate provides:
//! - Job handlers and the two execution strategies (inline and deferred)
//! - The deferred [`JobWorker`] with concurrent claim-and-execute
//! - The polling [`JobWatcher`] converging each watched job on a terminal
//!   state with exactly-once teardown
//! - The extraction trigger, per-subject sessions, dedup/merge, and the
//!   persistence coordinator behind [`ExtractionPipeline`]
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use colloquy_core::{EventBus, JobKind, SubmitJobRequest};
//! use colloquy_db::Database;
//! use colloquy_jobs::{JobRunner, JobWatcher, PollingJobWatcher, QueuedRunner, WorkerBuilder};
//!
//! let db = Database::connect("postgres://...").await?;
//! let store = Arc::new(db.jobs);
//! let bus = Arc::new(EventBus::default());
//!
//! // Deferred strategy: worker executes, callers poll.
//! let worker = WorkerBuilder::new(store.clone(), bus.clone()).build().await;
//! let handle = worker.start();
//!
//! let runner = QueuedRunner::new(store.clone());
//! let job_id = runner
//!     .submit(SubmitJobRequest::new(JobKind::Transcription, "meeting-42", "user-7"))
//!     .await?;
//!
//! let watcher = PollingJobWatcher::new(store, bus);
//! let job = watcher.watch(job_id).wait_terminal().await?;
//!
//! handle.shutdown().await?;
//! ```

pub mod handler;
pub mod merge;
pub mod persist;
pub mod pipeline;
pub mod runner;
pub mod trigger;
pub mod watcher;
pub mod worker;

// Re-export core types
pub use colloquy_core::*;

pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use merge::{merge, MergeResult};
pub use persist::{PersistedInsight, PersistenceCoordinator};
pub use pipeline::{ExtractionPipeline, RunOutcome, SkipReason};
pub use runner::{InlineRunner, JobRunner, QueuedRunner};
pub use trigger::{should_trigger, ExtractionState, SessionInsight, SubjectSession};
pub use watcher::{JobWatch, JobWatcher, PollingJobWatcher};
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerHandle};

/// Default polling interval for job status watches (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = colloquy_core::defaults::JOB_POLL_INTERVAL_MS;
