//! Job handlers for analysis job kinds.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use colloquy_core::{AnalysisJob, JobKind};

/// Progress callback type for job handlers.
pub type ProgressCallback = Box<dyn Fn(i32) + Send + Sync>;

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: AnalysisJob,
    /// Progress callback for updating job progress.
    progress_callback: Option<ProgressCallback>,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job: AnalysisJob) -> Self {
        Self {
            job,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Report progress to the callback.
    pub fn report_progress(&self, percent: i32) {
        if let Some(ref callback) = self.progress_callback {
            callback(percent);
        }
    }

    /// Get the subject this job is scoped to.
    pub fn subject_id(&self) -> &str {
        &self.job.subject_id
    }

    /// Get the job metadata blob.
    pub fn metadata(&self) -> &JsonValue {
        &self.job.metadata
    }
}

/// Result of job execution.
///
/// There is no retry variant: a failed job stays failed with its message,
/// and resubmission requires a fresh `submit`.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed with an error message, surfaced verbatim.
    Failed(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kind this handler processes.
    fn kind(&self) -> JobKind;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;

    /// Check if this handler can process the given job kind.
    fn can_handle(&self, kind: JobKind) -> bool {
        self.kind() == kind
    }
}

/// No-op handler for testing.
pub struct NoOpHandler {
    kind: JobKind,
}

impl NoOpHandler {
    /// Create a new no-op handler for the given job kind.
    pub fn new(kind: JobKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        ctx.report_progress(50);
        ctx.report_progress(100);
        JobResult::Success(None)
    }
}
