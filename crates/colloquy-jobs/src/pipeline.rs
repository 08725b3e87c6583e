//! The end-to-end extraction pipeline.
//!
//! One run is fully sequential and awaited end-to-end: trigger gate →
//! window fetch → single provider invocation → parse → merge → persist →
//! busy-flag clear. There is no fire-and-forget step, and the busy flag is
//! released on every exit path. Errors never cross this boundary as `Err`:
//! they are classified, captured into the session's `last_error`, and
//! emitted to observers as [`PipelineEvent::PipelineError`].

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use colloquy_core::{
    defaults, ConversationStore, ErrorKind, EventBus, InsightRecord, PipelineEvent, Result,
};
use colloquy_inference::{parse, AnalysisProvider, AnalysisRequest};

use crate::merge::{merge, MergeResult};
use crate::persist::PersistenceCoordinator;
use crate::trigger::{BeginRun, SubjectSession};

/// Why a run did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Fewer than `threshold` new units and the run was not forced.
    BelowThreshold,
    /// Another run is in flight for this subject.
    AlreadyAnalyzing,
    /// The subject has no input units at all.
    NoInput,
}

/// Outcome of one pipeline run.
#[derive(Debug)]
pub enum RunOutcome {
    /// Analysis ran; `added` holds the newly persisted records (possibly
    /// empty when every candidate was a duplicate).
    Completed { added: Vec<InsightRecord> },
    /// The trigger policy declined to start.
    Skipped(SkipReason),
    /// A forced run with fewer than the hard minimum of input units; no
    /// provider invocation was spent.
    InsufficientData,
    /// Analysis was attempted and failed; already reported to observers.
    Failed { kind: ErrorKind, message: String },
}

impl RunOutcome {
    /// Whether the run completed and persisted its result.
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

/// Orchestrates extraction runs over per-subject sessions.
pub struct ExtractionPipeline {
    provider: Arc<dyn AnalysisProvider>,
    conversation: Arc<dyn ConversationStore>,
    coordinator: PersistenceCoordinator,
    bus: Arc<EventBus>,
}

impl ExtractionPipeline {
    /// Create a pipeline over the given collaborators.
    pub fn new(
        provider: Arc<dyn AnalysisProvider>,
        conversation: Arc<dyn ConversationStore>,
        coordinator: PersistenceCoordinator,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            conversation,
            coordinator,
            bus,
        }
    }

    /// Run the pipeline once for a subject session.
    pub async fn run(
        &self,
        session: &SubjectSession,
        invoker_id: &str,
        forced: bool,
    ) -> RunOutcome {
        let subject_id = session.subject_id().to_string();

        let total = match self.conversation.unit_count(&subject_id).await {
            Ok(total) => total,
            Err(e) => return self.fail_before_attempt(session, e),
        };
        let new_count = total.saturating_sub(session.last_analyzed_count());

        match session.try_begin_run(new_count, total, forced) {
            BeginRun::Started => {}
            BeginRun::AlreadyAnalyzing => {
                debug!(subject_id = %subject_id, "Extraction skipped: run already in flight");
                return RunOutcome::Skipped(SkipReason::AlreadyAnalyzing);
            }
            BeginRun::BelowThreshold => {
                debug!(
                    subject_id = %subject_id,
                    new_count,
                    threshold = session.threshold(),
                    "Extraction skipped: below threshold"
                );
                return RunOutcome::Skipped(SkipReason::BelowThreshold);
            }
            BeginRun::NoInput => return RunOutcome::Skipped(SkipReason::NoInput),
        }

        // The busy flag is held from here on; every path below releases it.

        if forced && total < defaults::HARD_MIN_UNITS {
            // Never spend a provider invocation on too little data. Not an
            // attempted analysis: last_analyzed_count stays untouched.
            session.finish_unattempted();
            return RunOutcome::InsufficientData;
        }

        let start = Instant::now();
        match self.attempt(session, invoker_id).await {
            Ok(added) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                session.finish_success(total, added.len() as u64, latency_ms);
                RunOutcome::Completed { added }
            }
            Err(e) => {
                let kind = e.kind_or_default();
                let message = e.to_string();
                session.finish_failure(total, message.clone());
                self.bus.emit(PipelineEvent::PipelineError {
                    subject_id,
                    kind,
                    message: message.clone(),
                });
                RunOutcome::Failed { kind, message }
            }
        }
    }

    /// One attempted analysis: invoke, parse, merge, persist.
    ///
    /// On a persistence failure the optimistically inserted pendings are
    /// discarded, leaving the session's insight set exactly as it was.
    async fn attempt(
        &self,
        session: &SubjectSession,
        invoker_id: &str,
    ) -> Result<Vec<InsightRecord>> {
        let window = self
            .conversation
            .recent_units(session.subject_id(), defaults::ANALYSIS_WINDOW_MAX_UNITS)
            .await?;

        // Exactly one provider attempt; re-invocation only via a new trigger.
        let response = self
            .provider
            .analyze(&AnalysisRequest {
                units: window.clone(),
                subject_id: session.subject_id().to_string(),
                invoker_id: invoker_id.to_string(),
            })
            .await?;

        let candidates = parse(&response.raw_text)?;

        let existing = session.local_candidates();
        let MergeResult { added, .. } = merge(&existing, &candidates);
        debug!(
            subject_id = session.subject_id(),
            parsed = candidates.len(),
            added = added.len(),
            "Merged parsed candidates"
        );

        if added.is_empty() {
            return Ok(Vec::new());
        }

        session.append_pending(&added);
        let local_ids: Vec<String> = added.iter().map(|c| c.id.clone()).collect();

        match self
            .coordinator
            .persist(
                session.container_id(),
                session.subject_id(),
                invoker_id,
                &window,
                &added,
            )
            .await
        {
            Ok(persisted) => {
                session.promote(&persisted);
                Ok(persisted.into_iter().map(|p| p.record).collect())
            }
            Err(e) => {
                session.discard_pending(&local_ids);
                Err(e)
            }
        }
    }

    /// Report an error raised before the busy flag was taken.
    fn fail_before_attempt(
        &self,
        session: &SubjectSession,
        error: colloquy_core::Error,
    ) -> RunOutcome {
        let kind = error.kind_or_default();
        let message = error.to_string();
        session.note_error(message.clone());
        self.bus.emit(PipelineEvent::PipelineError {
            subject_id: session.subject_id().to_string(),
            kind,
            message: message.clone(),
        });
        RunOutcome::Failed { kind, message }
    }
}
