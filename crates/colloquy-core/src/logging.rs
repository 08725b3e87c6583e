//! Structured logging schema and field name constants for colloquy.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, enrichment skipped or fallback applied |
//! | INFO  | Lifecycle events (worker start/stop), run completions |
//! | DEBUG | Decision points, trigger evaluations, poll ticks |
//! | TRACE | Per-item iteration (parsed blocks, tag rows) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "inference", "jobs", "pipeline"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "worker", "watcher", "pool", "ollama", "persist"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "submit", "claim_next", "analyze", "insert_bulk"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Subject (channel/meeting) id being operated on.
pub const SUBJECT_ID: &str = "subject_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job kind enum variant.
pub const JOB_KIND: &str = "job_kind";

/// Insight container UUID.
pub const CONTAINER_ID: &str = "container_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of input units sent to the analysis provider.
pub const UNIT_COUNT: &str = "unit_count";

/// Number of insights parsed or persisted.
pub const INSIGHT_COUNT: &str = "insight_count";

/// Byte length of a raw analysis payload.
pub const PAYLOAD_LEN: &str = "payload_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for analysis.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Classified error kind when a pipeline run fails.
pub const ERROR_KIND: &str = "error_kind";
