//! Persistence coordinator: provenance, bulk insert, enrichment, notify.
//!
//! Failure policy per step:
//! 1. Provenance creation is best-effort — a failure is logged and records
//!    proceed with `source_id = None`.
//! 2. The bulk insert is all-or-nothing — a failure fails the whole run as
//!    a database error and no enrichment runs.
//! 3. Per-record enrichment (tags, source link) failures are logged only;
//!    a persisted primary record is never retracted.
//! 4. Observers are notified with the final persisted records, carrying
//!    store-assigned identity — never ephemeral candidate ids.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use colloquy_core::{
    ChatUnit, EventBus, InsightCandidate, InsightRecord, InsightStore, NewInsight,
    NewProvenanceSource, PipelineEvent, ProvenanceStore, Result,
};

/// A persisted insight paired with the local id it was tracked under,
/// so sessions can promote `Pending` entries strictly by id.
#[derive(Debug, Clone)]
pub struct PersistedInsight {
    pub local_id: String,
    pub record: InsightRecord,
}

/// Coordinates the multi-step persistence of an accepted candidate batch.
pub struct PersistenceCoordinator {
    insights: Arc<dyn InsightStore>,
    provenance: Arc<dyn ProvenanceStore>,
    bus: Arc<EventBus>,
}

impl PersistenceCoordinator {
    /// Create a coordinator over the given stores and bus.
    pub fn new(
        insights: Arc<dyn InsightStore>,
        provenance: Arc<dyn ProvenanceStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            insights,
            provenance,
            bus,
        }
    }

    /// Persist `added` candidates for a container.
    pub async fn persist(
        &self,
        container_id: Uuid,
        subject_id: &str,
        created_by: &str,
        window: &[ChatUnit],
        added: &[InsightCandidate],
    ) -> Result<Vec<PersistedInsight>> {
        if added.is_empty() {
            return Ok(Vec::new());
        }

        // Step 1: provenance source for the raw input batch, best-effort.
        let source_id = match self
            .provenance
            .create(NewProvenanceSource {
                kind: "conversation_snapshot".to_string(),
                label: format!("{} units from {}", window.len(), subject_id),
                meta: json!({
                    "subject_id": subject_id,
                    "units": window,
                }),
            })
            .await
        {
            Ok(source) => Some(source.id),
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "persist",
                    subject_id,
                    error = %e,
                    "Provenance source creation failed; continuing without"
                );
                None
            }
        };

        // Step 2: bulk insert, all-or-nothing. A database error here fails
        // the run and nothing below executes.
        let rows: Vec<NewInsight> = added
            .iter()
            .map(|candidate| NewInsight {
                title: candidate.title.clone(),
                content: candidate.content.clone(),
                tags: candidate.tags.clone(),
                source_id,
                created_by: created_by.to_string(),
            })
            .collect();

        let records = self.insights.insert_bulk(container_id, rows).await?;

        // Step 3: per-record enrichment, independently and log-only.
        for record in &records {
            if !record.tags.is_empty() {
                if let Err(e) = self.insights.set_tags(record.id, &record.tags).await {
                    warn!(
                        subsystem = "pipeline",
                        component = "persist",
                        record_id = %record.id,
                        error = %e,
                        "Tag attachment failed; record kept"
                    );
                }
            }
            if let Some(source_id) = source_id {
                if let Err(e) = self.insights.link_source(record.id, source_id).await {
                    warn!(
                        subsystem = "pipeline",
                        component = "persist",
                        record_id = %record.id,
                        error = %e,
                        "Source link attachment failed; record kept"
                    );
                }
            }
        }

        info!(
            subsystem = "pipeline",
            component = "persist",
            subject_id,
            container_id = %container_id,
            insight_count = records.len(),
            "Insights persisted"
        );

        // Step 4: notify observers with store identity.
        self.bus.emit(PipelineEvent::InsightsPersisted {
            container_id,
            subject_id: subject_id.to_string(),
            records: records.clone(),
        });

        Ok(added
            .iter()
            .zip(records)
            .map(|(candidate, record)| PersistedInsight {
                local_id: candidate.id.clone(),
                record,
            })
            .collect())
    }
}
