//! Deferred job worker: claims pending analysis jobs and executes them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use colloquy_core::{
    defaults, AnalysisJob, EventBus, JobKind, JobStatus, JobStore, PipelineEvent, Result,
};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::WORKER_POLL_INTERVAL_MS,
            max_concurrent_jobs: defaults::WORKER_MAX_CONCURRENT,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `COLLOQUY_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `COLLOQUY_WORKER_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    /// | `COLLOQUY_WORKER_POLL_INTERVAL_MS` | `500` | Polling interval when queue is empty |
    pub fn from_env() -> Self {
        let enabled = std::env::var("COLLOQUY_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("COLLOQUY_WORKER_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("COLLOQUY_WORKER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::WORKER_POLL_INTERVAL_MS);

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            enabled,
        }
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| colloquy_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }
}

/// Job worker that processes pending jobs from the store.
///
/// Job status changes are emitted on the shared [`EventBus`] as
/// [`PipelineEvent::JobStatusChanged`].
pub struct JobWorker {
    store: Arc<dyn JobStore>,
    config: WorkerConfig,
    handlers: Arc<RwLock<HashMap<JobKind, Arc<dyn JobHandler>>>>,
    bus: Arc<EventBus>,
}

impl JobWorker {
    /// Create a new job worker.
    pub fn new(store: Arc<dyn JobStore>, config: WorkerConfig, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            bus,
        }
    }

    /// Register a handler for a job kind.
    pub async fn register_handler<H: JobHandler + 'static>(&self, handler: H) {
        let kind = handler.kind();
        let mut handlers = self.handlers.write().await;
        handlers.insert(kind, Arc::new(handler));
        debug!(?kind, "Registered job handler");
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let worker = Arc::new(self);
        tokio::spawn(async move {
            worker.run(&mut shutdown_rx).await;
        });

        WorkerHandle { shutdown_tx }
    }

    /// Run the worker loop with concurrent job processing.
    ///
    /// Claims up to `max_concurrent_jobs` at a time and processes them
    /// concurrently. Only sleeps when the queue is empty.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_jobs,
            "Job worker started"
        );

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let max_concurrent = self.config.max_concurrent_jobs;

        loop {
            // Check for shutdown before claiming jobs
            if shutdown_rx.try_recv().is_ok() {
                info!("Job worker received shutdown signal");
                break;
            }

            // Claim up to max_concurrent jobs
            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..max_concurrent {
                match self.claim_job().await {
                    Some(job) => {
                        claimed += 1;
                        let worker = self.clone_refs();
                        tasks.spawn(async move {
                            worker.execute_job(job).await;
                        });
                    }
                    None => break,
                }
            }

            if claimed == 0 {
                // Queue empty — sleep before polling again
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Job worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Processing concurrent job batch");
                // Wait for all claimed jobs to complete
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Job task panicked");
                    }
                }
                // No sleep — immediately try to claim more jobs
            }
        }

        info!("Job worker stopped");
    }

    /// Claim the next available job without processing it.
    async fn claim_job(&self) -> Option<AnalysisJob> {
        let kinds: Vec<JobKind> = {
            let handlers = self.handlers.read().await;
            handlers.keys().copied().collect()
        };

        if kinds.is_empty() {
            return None;
        }

        match self.store.claim_next(&kinds).await {
            Ok(job) => job,
            Err(e) => {
                error!(error = ?e, "Failed to claim job");
                None
            }
        }
    }

    /// Clone references needed for spawned job tasks.
    fn clone_refs(&self) -> JobWorkerRef {
        JobWorkerRef {
            store: self.store.clone(),
            handlers: self.handlers.clone(),
            bus: self.bus.clone(),
        }
    }

    /// Get the pending job count.
    pub async fn pending_count(&self) -> Result<i64> {
        self.store.pending_count().await
    }
}

/// Lightweight reference bundle for executing a single job in a spawned task.
struct JobWorkerRef {
    store: Arc<dyn JobStore>,
    handlers: Arc<RwLock<HashMap<JobKind, Arc<dyn JobHandler>>>>,
    bus: Arc<EventBus>,
}

impl JobWorkerRef {
    /// Execute a single claimed job.
    async fn execute_job(self, job: AnalysisJob) {
        let start = Instant::now();
        let job_id = job.id;
        let kind = job.kind;
        let subject_id = job.subject_id.clone();

        info!(%job_id, ?kind, subject_id = %subject_id, "Processing job");

        self.bus.emit(PipelineEvent::JobStatusChanged {
            job_id,
            kind,
            status: JobStatus::Running,
            progress: job.progress,
            subject_id: subject_id.clone(),
        });

        // Find a handler for this job kind
        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&kind).cloned()
        };

        let result = match handler {
            Some(handler) => {
                let store = self.store.clone();
                let bus = self.bus.clone();
                let progress_subject = subject_id.clone();
                let ctx = JobContext::new(job).with_progress_callback(move |percent| {
                    let store = store.clone();
                    let bus = bus.clone();
                    let subject_id = progress_subject.clone();
                    tokio::spawn(async move {
                        if let Err(e) = store.update_progress(job_id, percent).await {
                            warn!(%job_id, error = ?e, "Failed to persist job progress");
                        }
                        bus.emit(PipelineEvent::JobStatusChanged {
                            job_id,
                            kind,
                            status: JobStatus::Running,
                            progress: percent,
                            subject_id,
                        });
                    });
                });

                handler.execute(ctx).await
            }
            None => {
                warn!(?kind, "No handler registered for job kind");
                JobResult::Failed(format!("No handler for job kind: {:?}", kind))
            }
        };

        match result {
            JobResult::Success(result_data) => {
                if let Err(e) = self.store.complete(job_id, result_data).await {
                    error!(error = ?e, %job_id, "Failed to mark job as completed");
                } else {
                    info!(
                        %job_id,
                        ?kind,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job completed successfully"
                    );
                    self.bus.emit(PipelineEvent::JobStatusChanged {
                        job_id,
                        kind,
                        status: JobStatus::Completed,
                        progress: 100,
                        subject_id,
                    });
                }
            }
            JobResult::Failed(error) => {
                if let Err(e) = self.store.fail(job_id, &error).await {
                    error!(error = ?e, %job_id, "Failed to mark job as failed");
                } else {
                    warn!(
                        %job_id,
                        ?kind,
                        %error,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job failed"
                    );
                    self.bus.emit(PipelineEvent::JobStatusChanged {
                        job_id,
                        kind,
                        status: JobStatus::Failed,
                        progress: 0,
                        subject_id,
                    });
                }
            }
        }
    }
}

/// Builder for creating a job worker with handlers.
pub struct WorkerBuilder {
    store: Arc<dyn JobStore>,
    config: WorkerConfig,
    handlers: Vec<Box<dyn JobHandler>>,
    bus: Arc<EventBus>,
}

impl WorkerBuilder {
    /// Create a new worker builder.
    pub fn new(store: Arc<dyn JobStore>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            config: WorkerConfig::default(),
            handlers: Vec::new(),
            bus,
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a handler.
    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Build and return the worker.
    pub async fn build(self) -> JobWorker {
        let worker = JobWorker::new(self.store, self.config, self.bus);

        for handler in self.handlers {
            let kind = handler.kind();
            let mut handlers = worker.handlers.write().await;
            handlers.insert(kind, Arc::from(handler));
        }

        worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval_ms, defaults::WORKER_POLL_INTERVAL_MS);
        assert_eq!(config.max_concurrent_jobs, defaults::WORKER_MAX_CONCURRENT);
        assert!(config.enabled);
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::default()
            .with_poll_interval(1000)
            .with_max_concurrent(8)
            .with_enabled(false);

        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.max_concurrent_jobs, 8);
        assert!(!config.enabled);
    }

    #[test]
    fn test_worker_config_chaining_order_independence() {
        let config1 = WorkerConfig::default()
            .with_enabled(false)
            .with_max_concurrent(10)
            .with_poll_interval(3000);

        let config2 = WorkerConfig::default()
            .with_poll_interval(3000)
            .with_enabled(false)
            .with_max_concurrent(10);

        assert_eq!(config1.poll_interval_ms, config2.poll_interval_ms);
        assert_eq!(config1.max_concurrent_jobs, config2.max_concurrent_jobs);
        assert_eq!(config1.enabled, config2.enabled);
    }

    #[test]
    fn test_worker_config_clone() {
        let config1 = WorkerConfig::default()
            .with_poll_interval(1500)
            .with_max_concurrent(6);

        let config2 = config1.clone();

        assert_eq!(config1.poll_interval_ms, config2.poll_interval_ms);
        assert_eq!(config1.max_concurrent_jobs, config2.max_concurrent_jobs);
        assert_eq!(config1.enabled, config2.enabled);
    }

    #[test]
    fn test_worker_config_debug() {
        let config = WorkerConfig::default();
        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("WorkerConfig"));
        assert!(debug_str.contains("poll_interval_ms"));
        assert!(debug_str.contains("max_concurrent_jobs"));
    }
}
