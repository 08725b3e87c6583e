//! Store traits for colloquy abstractions.
//!
//! These traits define the narrow interfaces this core consumes from its
//! collaborators, enabling pluggable backends and testability. The durable
//! store's schema and query language live entirely behind them.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// JOB STORE
// =============================================================================

/// Request for submitting a new analysis job.
#[derive(Debug, Clone)]
pub struct SubmitJobRequest {
    pub kind: JobKind,
    pub subject_id: String,
    pub owner_id: String,
    /// Opaque provider/model/params blob stored with the job.
    pub metadata: JsonValue,
}

impl SubmitJobRequest {
    /// Convenience constructor with empty metadata.
    pub fn new(kind: JobKind, subject_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            kind,
            subject_id: subject_id.into(),
            owner_id: owner_id.into(),
            metadata: JsonValue::Null,
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

/// CRUD over analysis job rows; no business logic beyond submission dedup.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Submit a job, deduplicated against non-terminal jobs with the same
    /// `(subject_id, kind, owner_id)`.
    ///
    /// When such a job exists its id is returned unchanged and no new row is
    /// created; otherwise a `pending` row at 0% progress is inserted.
    async fn submit(&self, req: SubmitJobRequest) -> Result<Uuid>;

    /// Insert a fully-formed job row already in a terminal state.
    ///
    /// Used by the inline execution strategy, which never persists a
    /// pending/running intermediate.
    async fn record_terminal(&self, job: AnalysisJob) -> Result<Uuid>;

    /// Fetch a job by id.
    async fn get(&self, job_id: Uuid) -> Result<Option<AnalysisJob>>;

    /// Claim the oldest pending job whose kind is in `kinds`, transitioning
    /// it to `running`. An empty slice claims any kind.
    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<AnalysisJob>>;

    /// Update job progress (clamped to [0, 100] by implementations).
    async fn update_progress(&self, job_id: Uuid, percent: i32) -> Result<()>;

    /// Mark a job completed with an optional result payload.
    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Mark a job failed, storing the message verbatim. No retry follows;
    /// resubmission requires a fresh `submit`.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// All jobs for a subject, newest first (terminal rows are history).
    async fn list_for_subject(&self, subject_id: &str) -> Result<Vec<AnalysisJob>>;

    /// Count of pending jobs.
    async fn pending_count(&self) -> Result<i64>;
}

// =============================================================================
// INSIGHT STORE
// =============================================================================

/// Store for persisted insight records.
#[async_trait]
pub trait InsightStore: Send + Sync {
    /// Insert all `insights` against a container in a single batch.
    ///
    /// All-or-nothing: on failure nothing is considered persisted. Returns
    /// the inserted records carrying store-assigned ids, timestamps, and
    /// order indexes, in input order.
    async fn insert_bulk(
        &self,
        container_id: Uuid,
        insights: Vec<NewInsight>,
    ) -> Result<Vec<InsightRecord>>;

    /// Replace the tag rows for a record.
    async fn set_tags(&self, record_id: Uuid, tags: &[String]) -> Result<()>;

    /// Attach a provenance source link to a record.
    async fn link_source(&self, record_id: Uuid, source_id: Uuid) -> Result<()>;

    /// Archive a record (never hard-deleted).
    async fn archive(&self, record_id: Uuid) -> Result<()>;

    /// All non-archived records for a container, in order-index order.
    async fn list_for_container(&self, container_id: Uuid) -> Result<Vec<InsightRecord>>;
}

// =============================================================================
// PROVENANCE STORE
// =============================================================================

/// Store for provenance sources.
#[async_trait]
pub trait ProvenanceStore: Send + Sync {
    /// Record a new provenance source and return it with assigned identity.
    async fn create(&self, source: NewProvenanceSource) -> Result<ProvenanceSource>;

    /// Fetch a source by id.
    async fn get(&self, source_id: Uuid) -> Result<Option<ProvenanceSource>>;
}

// =============================================================================
// CONVERSATION STORE
// =============================================================================

/// Read-only view of a subject's accumulated conversational input.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Total number of input units recorded for a subject.
    async fn unit_count(&self, subject_id: &str) -> Result<usize>;

    /// The most recent `limit` units for a subject, oldest first.
    async fn recent_units(&self, subject_id: &str, limit: usize) -> Result<Vec<ChatUnit>>;
}
