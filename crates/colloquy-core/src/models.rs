//! Core data model types for colloquy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// ANALYSIS JOB TYPES
// =============================================================================

/// Status of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this status is terminal (no further transition occurs).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Kind of external analysis work a job tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Separate speakers in recorded audio
    Diarization,
    /// Audio-to-text transcription
    Transcription,
    /// Condense a conversation into a summary
    Summarization,
    /// Extract structured insights from conversational text
    InsightExtraction,
}

impl JobKind {
    /// Default priority for this job kind (higher = more urgent).
    pub fn default_priority(&self) -> i32 {
        match self {
            // Transcription gates everything downstream of the audio
            JobKind::Transcription => 7,
            JobKind::Diarization => 6,
            JobKind::InsightExtraction => 5,
            // Summaries are a background nicety
            JobKind::Summarization => 2,
        }
    }
}

/// A long-running external analysis job, tracked as a polled background row.
///
/// At most one non-terminal job exists per `(subject_id, kind, owner_id)`;
/// terminal rows are retained as history and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Completion percentage in [0, 100].
    pub progress: i32,
    /// The channel/meeting this job is scoped to.
    pub subject_id: String,
    /// The user who submitted the job.
    pub owner_id: String,
    /// Opaque provider/model/params blob.
    pub metadata: JsonValue,
    /// Present only once the job completed.
    pub result: Option<JsonValue>,
    /// Present only once the job failed; surfaced verbatim.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// INSIGHT TYPES
// =============================================================================

/// An insight parsed out of a raw analysis payload, not yet persisted.
///
/// The id is synthetic (epoch millis + batch index) and only meaningful
/// within the extraction session that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightCandidate {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Fields for inserting a new insight row.
#[derive(Debug, Clone)]
pub struct NewInsight {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub source_id: Option<Uuid>,
    pub created_by: String,
}

/// A persisted insight with store-assigned identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRecord {
    pub id: Uuid,
    pub container_id: Uuid,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Provenance source this insight was derived from, when one was recorded.
    pub source_id: Option<Uuid>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub order_index: i32,
    /// Insights are archived rather than hard-deleted.
    pub archived: bool,
}

// =============================================================================
// PROVENANCE TYPES
// =============================================================================

/// Fields for recording a new provenance source.
#[derive(Debug, Clone)]
pub struct NewProvenanceSource {
    pub kind: String,
    pub label: String,
    pub meta: JsonValue,
}

/// A record of which raw input produced a set of insights.
///
/// Best-effort: its absence never blocks insight creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceSource {
    pub id: Uuid,
    pub kind: String,
    pub label: String,
    pub meta: JsonValue,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// CONVERSATION TYPES
// =============================================================================

/// One unit of conversational input for a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUnit {
    pub text: String,
    pub author_name: String,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// EXTRACTION STATE
// =============================================================================

/// Rolling statistics for a subject's extraction runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_runs: u64,
    pub total_insights: u64,
    /// Rolling average run latency in milliseconds.
    pub avg_latency_ms: f64,
    /// Message of the most recent failed run, if any.
    pub last_error: Option<String>,
}

impl ExtractionStats {
    /// Fold one completed run into the rolling stats.
    pub fn record_run(&mut self, insights: u64, latency_ms: u64) {
        let runs = self.total_runs as f64;
        self.avg_latency_ms = (self.avg_latency_ms * runs + latency_ms as f64) / (runs + 1.0);
        self.total_runs += 1;
        self.total_insights += insights;
    }
}
