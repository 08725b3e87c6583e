//! Pipeline event types and the broadcast event bus.
//!
//! The observer layer receives exactly three notification kinds: insights
//! persisted (with the final records), job status changed, and pipeline
//! error (with the classified kind and message). Downstream consumers
//! subscribe independently; emission with no subscribers is a no-op.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::models::{InsightRecord, JobKind, JobStatus};

/// Notification delivered to pipeline observers.
///
/// Serialized as JSON with a `type` tag field, e.g.
/// `{"type":"JobStatusChanged","job_id":"...","status":"running",...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// An extraction run persisted new insights. Carries the final records
    /// with store-assigned identity, never ephemeral candidates.
    InsightsPersisted {
        container_id: Uuid,
        subject_id: String,
        records: Vec<InsightRecord>,
    },
    /// An analysis job changed status or progress.
    JobStatusChanged {
        job_id: Uuid,
        kind: JobKind,
        status: JobStatus,
        progress: i32,
        subject_id: String,
    },
    /// A pipeline run failed with a classified error.
    PipelineError {
        subject_id: String,
        kind: ErrorKind,
        message: String,
    },
}

impl PipelineEvent {
    /// Returns the event type name (used for observer-side filtering).
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::InsightsPersisted { .. } => "InsightsPersisted",
            PipelineEvent::JobStatusChanged { .. } => "JobStatusChanged",
            PipelineEvent::PipelineError { .. } => "PipelineError",
        }
    }

    /// The subject this event is scoped to.
    pub fn subject_id(&self) -> &str {
        match self {
            PipelineEvent::InsightsPersisted { subject_id, .. }
            | PipelineEvent::JobStatusChanged { subject_id, .. }
            | PipelineEvent::PipelineError { subject_id, .. } => subject_id,
        }
    }
}

/// Broadcast-based event bus distributing pipeline events to observers.
///
/// Uses `tokio::sync::broadcast` with a configurable buffer size. Slow
/// receivers that fall behind receive a `Lagged` error and miss events —
/// freshness matters more than completeness for these streams.
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    ///
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers.
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub fn emit(&self, event: PipelineEvent) {
        tracing::debug!(
            event_type = event.event_type(),
            subject_id = event.subject_id(),
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to receive events. Each subscriber gets an independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}
