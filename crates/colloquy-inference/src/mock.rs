//! Mock analysis backend for deterministic testing.
//!
//! Provides a scripted [`AnalysisProvider`] with a per-call log and
//! explicit failure injection, so tests can assert exact call counts
//! (e.g. "the provider was never invoked below threshold").
//!
//! ## Usage
//!
//! ```rust
//! use colloquy_inference::mock::MockAnalysisBackend;
//! use colloquy_inference::{AnalysisProvider, AnalysisRequest};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let backend = MockAnalysisBackend::new()
//!     .with_response("# Insight\nContext:\nbody\nTags: a\n");
//!
//! let req = AnalysisRequest {
//!     units: vec![],
//!     subject_id: "meeting-1".to_string(),
//!     invoker_id: "user-1".to_string(),
//! };
//! let response = backend.analyze(&req).await.unwrap();
//! assert!(response.raw_text.starts_with("# Insight"));
//! assert_eq!(backend.analyze_call_count(), 1);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use colloquy_core::{Error, ErrorKind, Result};

use crate::provider::{AnalysisProvider, AnalysisRequest, AnalysisResponse};

/// Mock analysis backend.
#[derive(Clone)]
pub struct MockAnalysisBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone, Default)]
struct MockConfig {
    default_response: String,
    subject_responses: HashMap<String, String>,
    failure: Option<(ErrorKind, String)>,
}

/// One logged analysis invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub subject_id: String,
    pub invoker_id: String,
    pub unit_count: usize,
}

impl MockAnalysisBackend {
    /// Create a new mock backend with an empty default response payload.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig {
                default_response: "# Insight\nContext:\nmock insight body\nTags: mock\n"
                    .to_string(),
                ..MockConfig::default()
            }),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the payload returned for every analysis call.
    pub fn with_response(mut self, raw_text: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = raw_text.into();
        self
    }

    /// Set the payload returned for a specific subject.
    pub fn with_response_for_subject(
        mut self,
        subject_id: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .subject_responses
            .insert(subject_id.into(), raw_text.into());
        self
    }

    /// Make every analysis call fail with the given classified kind.
    pub fn with_failure(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failure = Some((kind, message.into()));
        self
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of analyze calls made.
    pub fn analyze_call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear()
    }

    fn failure_error(kind: ErrorKind, message: &str) -> Error {
        match kind {
            ErrorKind::ApiError => Error::Api(message.to_string()),
            ErrorKind::ValidationError => Error::Validation(message.to_string()),
            ErrorKind::ParseError => Error::Parse(message.to_string()),
            ErrorKind::NetworkError => Error::Network(message.to_string()),
            ErrorKind::DbError => Error::Internal(message.to_string()),
        }
    }
}

impl Default for MockAnalysisBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisProvider for MockAnalysisBackend {
    async fn analyze(&self, req: &AnalysisRequest) -> Result<AnalysisResponse> {
        self.call_log.lock().unwrap().push(MockCall {
            subject_id: req.subject_id.clone(),
            invoker_id: req.invoker_id.clone(),
            unit_count: req.units.len(),
        });

        if let Some((kind, message)) = &self.config.failure {
            return Err(Self::failure_error(*kind, message));
        }

        let raw_text = self
            .config
            .subject_responses
            .get(&req.subject_id)
            .unwrap_or(&self.config.default_response)
            .clone();

        Ok(AnalysisResponse { raw_text })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "mock-analysis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(subject: &str) -> AnalysisRequest {
        AnalysisRequest {
            units: vec![],
            subject_id: subject.to_string(),
            invoker_id: "user-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_default_response() {
        let backend = MockAnalysisBackend::new();
        let response = backend.analyze(&req("m")).await.unwrap();
        assert!(response.raw_text.contains("mock insight body"));
    }

    #[tokio::test]
    async fn test_mock_fixed_response() {
        let backend = MockAnalysisBackend::new().with_response("custom payload");
        let response = backend.analyze(&req("m")).await.unwrap();
        assert_eq!(response.raw_text, "custom payload");
    }

    #[tokio::test]
    async fn test_mock_subject_mapping() {
        let backend = MockAnalysisBackend::new()
            .with_response("default")
            .with_response_for_subject("special", "special payload");

        assert_eq!(backend.analyze(&req("m")).await.unwrap().raw_text, "default");
        assert_eq!(
            backend.analyze(&req("special")).await.unwrap().raw_text,
            "special payload"
        );
    }

    #[tokio::test]
    async fn test_mock_call_logging() {
        let backend = MockAnalysisBackend::new();
        backend.analyze(&req("a")).await.unwrap();
        backend.analyze(&req("b")).await.unwrap();

        assert_eq!(backend.analyze_call_count(), 2);
        let calls = backend.calls();
        assert_eq!(calls[0].subject_id, "a");
        assert_eq!(calls[1].subject_id, "b");

        backend.clear_calls();
        assert_eq!(backend.analyze_call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let backend =
            MockAnalysisBackend::new().with_failure(ErrorKind::NetworkError, "unreachable");

        let err = backend.analyze(&req("m")).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        // Failed calls are still logged.
        assert_eq!(backend.analyze_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_clones_share_call_log() {
        let backend = MockAnalysisBackend::new();
        let clone = backend.clone();
        clone.analyze(&req("m")).await.unwrap();
        assert_eq!(backend.analyze_call_count(), 1);
    }
}
