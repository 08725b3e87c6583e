//! In-memory store implementations.
//!
//! Used by test suites and by embedded setups that run without a durable
//! store. Failure injection is deterministic (explicit arm-next-failure
//! switches) so assertions are reproducible.
//!
//! The job store's submission dedup here is check-then-set under one lock —
//! the cooperative single-process guarantee the pipeline is specified
//! against. Cross-process races are a documented gap of the design, not of
//! this implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use colloquy_core::{
    new_v7, AnalysisJob, ChatUnit, ConversationStore, Error, InsightRecord, InsightStore,
    JobKind, JobStatus, JobStore, NewInsight, NewProvenanceSource, ProvenanceSource,
    ProvenanceStore, Result, SubmitJobRequest,
};

// =============================================================================
// JOB STORE
// =============================================================================

/// In-memory JobStore.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<Mutex<HashMap<Uuid, AnalysisJob>>>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored job rows (any status).
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Whether the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn submit(&self, req: SubmitJobRequest) -> Result<Uuid> {
        let mut jobs = self.jobs.lock().unwrap();

        // Check-then-set under the store lock: one non-terminal job per
        // (subject, kind, owner).
        if let Some(existing) = jobs.values().find(|j| {
            !j.status.is_terminal()
                && j.subject_id == req.subject_id
                && j.kind == req.kind
                && j.owner_id == req.owner_id
        }) {
            return Ok(existing.id);
        }

        let now = Utc::now();
        let job = AnalysisJob {
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
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    async fn record_terminal(&self, job: AnalysisJob) -> Result<Uuid> {
        if !job.status.is_terminal() {
            return Err(Error::Internal(format!(
                "record_terminal called with non-terminal status {:?}",
                job.status
            )));
        }
        let id = job.id;
        self.jobs.lock().unwrap().insert(id, job);
        Ok(id)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<AnalysisJob>> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<AnalysisJob>> {
        let mut jobs = self.jobs.lock().unwrap();

        let next_id = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .filter(|j| kinds.is_empty() || kinds.contains(&j.kind))
            .min_by_key(|j| j.created_at)
            .map(|j| j.id);

        Ok(next_id.map(|id| {
            let job = jobs.get_mut(&id).unwrap();
            job.status = JobStatus::Running;
            job.updated_at = Utc::now();
            job.clone()
        }))
    }

    async fn update_progress(&self, job_id: Uuid, percent: i32) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&job_id) {
            if !job.status.is_terminal() {
                job.progress = percent.clamp(0, 100);
                job.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&job_id) {
            if !job.status.is_terminal() {
                job.status = JobStatus::Completed;
                job.progress = 100;
                job.result = result;
                job.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&job_id) {
            if !job.status.is_terminal() {
                job.status = JobStatus::Failed;
                job.error_message = Some(error.to_string());
                job.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn list_for_subject(&self, subject_id: &str) -> Result<Vec<AnalysisJob>> {
        let jobs = self.jobs.lock().unwrap();
        let mut out: Vec<AnalysisJob> = jobs
            .values()
            .filter(|j| j.subject_id == subject_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn pending_count(&self) -> Result<i64> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .count() as i64)
    }
}

// =============================================================================
// INSIGHT STORE
// =============================================================================

/// In-memory InsightStore with deterministic failure injection.
#[derive(Clone, Default)]
pub struct MemoryInsightStore {
    records: Arc<Mutex<HashMap<Uuid, InsightRecord>>>,
    source_links: Arc<Mutex<Vec<(Uuid, Uuid)>>>,
    fail_next_bulk_insert: Arc<AtomicBool>,
    fail_next_set_tags: Arc<AtomicBool>,
    bulk_insert_calls: Arc<AtomicUsize>,
}

impl MemoryInsightStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the next `insert_bulk` call to fail with a database error.
    pub fn fail_next_bulk_insert(&self) {
        self.fail_next_bulk_insert.store(true, Ordering::SeqCst);
    }

    /// Arm the next `set_tags` call to fail with a database error.
    pub fn fail_next_set_tags(&self) {
        self.fail_next_set_tags.store(true, Ordering::SeqCst);
    }

    /// Number of `insert_bulk` calls made.
    pub fn bulk_insert_calls(&self) -> usize {
        self.bulk_insert_calls.load(Ordering::SeqCst)
    }

    /// Recorded `(insight_id, source_id)` link rows.
    pub fn source_links(&self) -> Vec<(Uuid, Uuid)> {
        self.source_links.lock().unwrap().clone()
    }
}

#[async_trait]
impl InsightStore for MemoryInsightStore {
    async fn insert_bulk(
        &self,
        container_id: Uuid,
        insights: Vec<NewInsight>,
    ) -> Result<Vec<InsightRecord>> {
        self.bulk_insert_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_next_bulk_insert.swap(false, Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolClosed));
        }

        let mut records_map = self.records.lock().unwrap();
        let base_index = records_map
            .values()
            .filter(|r| r.container_id == container_id)
            .map(|r| r.order_index + 1)
            .max()
            .unwrap_or(0);

        let mut out = Vec::with_capacity(insights.len());
        for (i, insight) in insights.into_iter().enumerate() {
            let record = InsightRecord {
                id: new_v7(),
                container_id,
                title: insight.title,
                content: insight.content,
                tags: insight.tags,
                source_id: insight.source_id,
                created_by: insight.created_by,
                created_at: Utc::now(),
                order_index: base_index + i as i32,
                archived: false,
            };
            records_map.insert(record.id, record.clone());
            out.push(record);
        }
        Ok(out)
    }

    async fn set_tags(&self, record_id: Uuid, tags: &[String]) -> Result<()> {
        if self.fail_next_set_tags.swap(false, Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolClosed));
        }
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(&record_id) {
            record.tags = tags.to_vec();
        }
        Ok(())
    }

    async fn link_source(&self, record_id: Uuid, source_id: Uuid) -> Result<()> {
        self.source_links.lock().unwrap().push((record_id, source_id));
        Ok(())
    }

    async fn archive(&self, record_id: Uuid) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(&record_id) {
            record.archived = true;
        }
        Ok(())
    }

    async fn list_for_container(&self, container_id: Uuid) -> Result<Vec<InsightRecord>> {
        let records = self.records.lock().unwrap();
        let mut out: Vec<InsightRecord> = records
            .values()
            .filter(|r| r.container_id == container_id && !r.archived)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.order_index);
        Ok(out)
    }
}

// =============================================================================
// PROVENANCE STORE
// =============================================================================

/// In-memory ProvenanceStore with deterministic failure injection.
#[derive(Clone, Default)]
pub struct MemoryProvenanceStore {
    sources: Arc<Mutex<HashMap<Uuid, ProvenanceSource>>>,
    fail_next_create: Arc<AtomicBool>,
    create_calls: Arc<AtomicUsize>,
}

impl MemoryProvenanceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the next `create` call to fail with a database error.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Number of `create` calls made.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of sources recorded.
    pub fn len(&self) -> usize {
        self.sources.lock().unwrap().len()
    }

    /// Whether the store holds no sources.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProvenanceStore for MemoryProvenanceStore {
    async fn create(&self, source: NewProvenanceSource) -> Result<ProvenanceSource> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolClosed));
        }

        let created = ProvenanceSource {
            id: new_v7(),
            kind: source.kind,
            label: source.label,
            meta: source.meta,
            created_at: Utc::now(),
        };
        self.sources
            .lock()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, source_id: Uuid) -> Result<Option<ProvenanceSource>> {
        Ok(self.sources.lock().unwrap().get(&source_id).cloned())
    }
}

// =============================================================================
// CONVERSATION STORE
// =============================================================================

/// In-memory ConversationStore seeded by tests or an embedding application.
#[derive(Clone, Default)]
pub struct MemoryConversationStore {
    units: Arc<Mutex<HashMap<String, Vec<ChatUnit>>>>,
}

impl MemoryConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one unit to a subject's conversation.
    pub fn push_unit(&self, subject_id: &str, unit: ChatUnit) {
        self.units
            .lock()
            .unwrap()
            .entry(subject_id.to_string())
            .or_default()
            .push(unit);
    }

    /// Append `count` synthetic units to a subject's conversation.
    pub fn push_units(&self, subject_id: &str, count: usize) {
        let mut units = self.units.lock().unwrap();
        let list = units.entry(subject_id.to_string()).or_default();
        let base = list.len();
        for i in 0..count {
            list.push(ChatUnit {
                text: format!("message {}", base + i),
                author_name: "tester".to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn unit_count(&self, subject_id: &str) -> Result<usize> {
        Ok(self
            .units
            .lock()
            .unwrap()
            .get(subject_id)
            .map(|u| u.len())
            .unwrap_or(0))
    }

    async fn recent_units(&self, subject_id: &str, limit: usize) -> Result<Vec<ChatUnit>> {
        let units = self.units.lock().unwrap();
        let list = units.get(subject_id).cloned().unwrap_or_default();
        let start = list.len().saturating_sub(limit);
        Ok(list[start..].to_vec())
    }
}
