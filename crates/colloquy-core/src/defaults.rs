//! Centralized default constants for the colloquy system.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates should reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// EXTRACTION TRIGGER
// =============================================================================

/// New input units that must accumulate before an automatic extraction run.
pub const TRIGGER_THRESHOLD: usize = 5;

/// Hard minimum of total input units below which even a forced run
/// short-circuits with an insufficient-data result.
pub const HARD_MIN_UNITS: usize = 5;

/// Sliding-window cap on input units sent to the analysis provider.
/// Older context is dropped, not summarized.
pub const ANALYSIS_WINDOW_MAX_UNITS: usize = 30;

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Fixed period between job status polls (milliseconds).
pub const JOB_POLL_INTERVAL_MS: u64 = 2000;

/// Polling interval for the deferred worker when the queue is empty
/// (milliseconds).
pub const WORKER_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum concurrent jobs in the deferred worker.
pub const WORKER_MAX_CONCURRENT: usize = 4;

// =============================================================================
// EVENTS
// =============================================================================

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// ANALYSIS PROVIDER
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default analysis model name (Ollama).
pub const ANALYSIS_MODEL: &str = "gpt-oss:20b";

/// Env var overriding the Ollama base URL.
pub const ENV_OLLAMA_URL: &str = "COLLOQUY_OLLAMA_URL";

/// Env var overriding the analysis model.
pub const ENV_ANALYSIS_MODEL: &str = "COLLOQUY_ANALYSIS_MODEL";

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Delimiter line separating insight blocks in a raw analysis payload.
pub const INSIGHT_BLOCK_DELIMITER: &str = "---";

/// Label line introducing the tags subsection of an insight block.
pub const INSIGHT_TAGS_LABEL: &str = "Tags:";

/// Label line introducing the body subsection of an insight block.
pub const INSIGHT_CONTEXT_LABEL: &str = "Context:";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_floor_not_above_threshold() {
        // A forced run below HARD_MIN_UNITS never reaches the provider, so
        // the automatic threshold must not undercut the floor.
        assert!(TRIGGER_THRESHOLD >= HARD_MIN_UNITS);
    }

    #[test]
    fn test_window_holds_at_least_one_threshold_batch() {
        assert!(ANALYSIS_WINDOW_MAX_UNITS >= TRIGGER_THRESHOLD);
    }
}
