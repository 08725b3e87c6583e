//! Extraction trigger policy and per-subject session state.
//!
//! Each subject (channel/meeting) gets its own [`SubjectSession`] created
//! and destroyed with the subject's active watch. Sessions share nothing,
//! so pipelines for different subjects run fully concurrently. Within a
//! subject, the `analyzing` flag enforces at most one run at a time,
//! cooperatively (check-then-set under the session lock).

use std::sync::Mutex;

use tracing::debug;
use uuid::Uuid;

use colloquy_core::{defaults, ExtractionStats, InsightCandidate, InsightRecord};

use crate::persist::PersistedInsight;

/// Per-subject extraction state.
#[derive(Debug, Clone, Default)]
pub struct ExtractionState {
    /// Input-unit count at the end of the last attempted analysis.
    pub last_analyzed_count: usize,
    /// True while a run is in flight for this subject.
    pub analyzing: bool,
    /// Rolling run statistics.
    pub stats: ExtractionStats,
}

/// Threshold/mutual-exclusion policy deciding whether a run may start.
///
/// True iff `(forced || new_count >= threshold)`, no run is already in
/// flight, and the subject has at least one input unit.
pub fn should_trigger(
    state: &ExtractionState,
    new_count: usize,
    total_units: usize,
    threshold: usize,
    forced: bool,
) -> bool {
    (forced || new_count >= threshold) && !state.analyzing && total_units >= 1
}

/// An insight as the session tracks it locally: optimistically inserted as
/// `Pending`, promoted to `Confirmed` once the store assigns identity.
/// Reconciliation is strictly by `local_id`, never by array position.
#[derive(Debug, Clone)]
pub enum SessionInsight {
    /// Parsed and merged, not yet persisted.
    Pending { candidate: InsightCandidate },
    /// Persisted; carries the store-assigned record.
    Confirmed {
        local_id: String,
        record: InsightRecord,
    },
}

impl SessionInsight {
    /// The batch-local id this insight is tracked under.
    pub fn local_id(&self) -> &str {
        match self {
            SessionInsight::Pending { candidate } => &candidate.id,
            SessionInsight::Confirmed { local_id, .. } => local_id,
        }
    }

    /// The persisted record, if this insight has been confirmed.
    pub fn record(&self) -> Option<&InsightRecord> {
        match self {
            SessionInsight::Pending { .. } => None,
            SessionInsight::Confirmed { record, .. } => Some(record),
        }
    }
}

/// Outcome of attempting to begin a run on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BeginRun {
    /// The busy flag is now held; the caller must finish the run.
    Started,
    /// Another run is in flight for this subject.
    AlreadyAnalyzing,
    /// Not enough new input and the run was not forced.
    BelowThreshold,
    /// The subject has no input units at all.
    NoInput,
}

struct SessionState {
    extraction: ExtractionState,
    insights: Vec<SessionInsight>,
}

/// Per-subject session owning extraction state and the local insight list.
pub struct SubjectSession {
    subject_id: String,
    container_id: Uuid,
    threshold: usize,
    state: Mutex<SessionState>,
}

impl SubjectSession {
    /// Create a session for a subject writing into the given container.
    pub fn new(subject_id: impl Into<String>, container_id: Uuid) -> Self {
        Self {
            subject_id: subject_id.into(),
            container_id,
            threshold: defaults::TRIGGER_THRESHOLD,
            state: Mutex::new(SessionState {
                extraction: ExtractionState::default(),
                insights: Vec::new(),
            }),
        }
    }

    /// Override the automatic-trigger threshold.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// The subject this session is scoped to.
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// The insight container this session writes into.
    pub fn container_id(&self) -> Uuid {
        self.container_id
    }

    /// The automatic-trigger threshold.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether a run is currently in flight.
    pub fn is_analyzing(&self) -> bool {
        self.state.lock().unwrap().extraction.analyzing
    }

    /// Input-unit count at the end of the last attempted analysis.
    pub fn last_analyzed_count(&self) -> usize {
        self.state.lock().unwrap().extraction.last_analyzed_count
    }

    /// Snapshot of the rolling run statistics.
    pub fn stats(&self) -> ExtractionStats {
        self.state.lock().unwrap().extraction.stats.clone()
    }

    /// Snapshot of the session's local insight list.
    pub fn insights(&self) -> Vec<SessionInsight> {
        self.state.lock().unwrap().insights.clone()
    }

    /// The local insight list viewed as candidates, for merge input.
    pub fn local_candidates(&self) -> Vec<InsightCandidate> {
        self.state
            .lock()
            .unwrap()
            .insights
            .iter()
            .map(|insight| match insight {
                SessionInsight::Pending { candidate } => candidate.clone(),
                SessionInsight::Confirmed { local_id, record } => InsightCandidate {
                    id: local_id.clone(),
                    title: record.title.clone(),
                    content: record.content.clone(),
                    tags: record.tags.clone(),
                },
            })
            .collect()
    }

    /// Evaluate the trigger policy and, if it passes, take the busy flag.
    pub(crate) fn try_begin_run(
        &self,
        new_count: usize,
        total_units: usize,
        forced: bool,
    ) -> BeginRun {
        let mut state = self.state.lock().unwrap();

        if state.extraction.analyzing {
            return BeginRun::AlreadyAnalyzing;
        }
        if total_units == 0 {
            return BeginRun::NoInput;
        }
        if !should_trigger(
            &state.extraction,
            new_count,
            total_units,
            self.threshold,
            forced,
        ) {
            return BeginRun::BelowThreshold;
        }

        state.extraction.analyzing = true;
        debug!(
            subject_id = %self.subject_id,
            new_count,
            total_units,
            forced,
            "Extraction run started"
        );
        BeginRun::Started
    }

    /// Optimistically insert merged candidates as pending insights.
    pub(crate) fn append_pending(&self, candidates: &[InsightCandidate]) {
        let mut state = self.state.lock().unwrap();
        state
            .insights
            .extend(candidates.iter().cloned().map(|candidate| {
                SessionInsight::Pending { candidate }
            }));
    }

    /// Promote pending insights to confirmed, matching strictly by local id.
    pub(crate) fn promote(&self, persisted: &[PersistedInsight]) {
        let mut state = self.state.lock().unwrap();
        for p in persisted {
            if let Some(slot) = state
                .insights
                .iter_mut()
                .find(|i| i.local_id() == p.local_id)
            {
                *slot = SessionInsight::Confirmed {
                    local_id: p.local_id.clone(),
                    record: p.record.clone(),
                };
            }
        }
    }

    /// Drop pending insights by local id (failed run rollback: the existing
    /// insight set is left completely untouched).
    pub(crate) fn discard_pending(&self, local_ids: &[String]) {
        let mut state = self.state.lock().unwrap();
        state.insights.retain(|insight| match insight {
            SessionInsight::Pending { candidate } => !local_ids.contains(&candidate.id),
            SessionInsight::Confirmed { .. } => true,
        });
    }

    /// Finish a run that attempted analysis successfully.
    pub(crate) fn finish_success(&self, total_units: usize, added: u64, latency_ms: u64) {
        let mut state = self.state.lock().unwrap();
        state.extraction.analyzing = false;
        state.extraction.last_analyzed_count = total_units;
        state.extraction.stats.record_run(added, latency_ms);
        state.extraction.stats.last_error = None;
    }

    /// Finish a run that attempted analysis and failed.
    pub(crate) fn finish_failure(&self, total_units: usize, message: String) {
        let mut state = self.state.lock().unwrap();
        state.extraction.analyzing = false;
        state.extraction.last_analyzed_count = total_units;
        state.extraction.stats.last_error = Some(message);
    }

    /// Finish a run that never attempted analysis (insufficient-data
    /// short-circuit): the busy flag is released and
    /// `last_analyzed_count` stays untouched.
    pub(crate) fn finish_unattempted(&self) {
        let mut state = self.state.lock().unwrap();
        state.extraction.analyzing = false;
    }

    /// Record an error raised before a run began (busy flag not held).
    pub(crate) fn note_error(&self, message: String) {
        let mut state = self.state.lock().unwrap();
        state.extraction.stats.last_error = Some(message);
    }
}
