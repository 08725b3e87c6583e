//! Ollama analysis backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use colloquy_core::{defaults, Error, Result};

use crate::provider::{build_analysis_prompt, AnalysisProvider, AnalysisRequest, AnalysisResponse};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default analysis model.
pub const DEFAULT_ANALYSIS_MODEL: &str = defaults::ANALYSIS_MODEL;

/// Ollama-backed analysis provider.
///
/// Makes exactly one generate call per analysis; there is no retry or
/// backoff here, and no client-side timeout beyond the transport default.
pub struct OllamaAnalysisBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaAnalysisBackend {
    /// Create a new backend with explicit configuration.
    pub fn new(base_url: String, model: String) -> Self {
        info!(
            subsystem = "inference",
            component = "ollama",
            base_url = %base_url,
            model = %model,
            "Initializing Ollama analysis backend"
        );
        Self {
            client: Client::new(),
            base_url,
            model,
        }
    }

    /// Create from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let base_url = std::env::var(defaults::ENV_OLLAMA_URL)
            .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let model = std::env::var(defaults::ENV_ANALYSIS_MODEL)
            .unwrap_or_else(|_| DEFAULT_ANALYSIS_MODEL.to_string());
        Self::new(base_url, model)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl AnalysisProvider for OllamaAnalysisBackend {
    async fn analyze(&self, req: &AnalysisRequest) -> Result<AnalysisResponse> {
        let start = Instant::now();
        let url = format!("{}/api/generate", self.base_url);
        let prompt = build_analysis_prompt(req);

        debug!(
            subsystem = "inference",
            component = "ollama",
            op = "analyze",
            subject_id = %req.subject_id,
            model = %self.model,
            unit_count = req.units.len(),
            "Sending analysis request"
        );

        // From<reqwest::Error> classifies transport failures as Network
        // and the rest as Api.
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt: &prompt,
                stream: false,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let envelope: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Validation(format!("Malformed analysis envelope: {}", e)))?;

        if envelope.response.trim().is_empty() {
            return Err(Error::Validation(
                "Analysis response envelope was empty".to_string(),
            ));
        }

        debug!(
            subsystem = "inference",
            component = "ollama",
            op = "analyze",
            subject_id = %req.subject_id,
            payload_len = envelope.response.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis response received"
        );

        Ok(AnalysisResponse {
            raw_text: envelope.response,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_new() {
        let backend = OllamaAnalysisBackend::new(
            "http://localhost:11434".to_string(),
            "gpt-oss:20b".to_string(),
        );
        assert_eq!(backend.base_url, "http://localhost:11434");
        assert_eq!(backend.model_name(), "gpt-oss:20b");
    }

    #[test]
    fn test_generate_request_serialization() {
        let req = GenerateRequest {
            model: "gpt-oss:20b",
            prompt: "analyze this",
            stream: false,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "gpt-oss:20b");
        assert_eq!(json["prompt"], "analyze this");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_generate_response_deserialization() {
        let json = r##"{"response": "# Insight\nContext:\nbody\n", "done": true}"##;
        let envelope: GenerateResponse = serde_json::from_str(json).unwrap();
        assert!(envelope.response.starts_with("# Insight"));
    }

    #[test]
    fn test_generate_response_missing_field_is_error() {
        let json = r#"{"done": true}"#;
        assert!(serde_json::from_str::<GenerateResponse>(json).is_err());
    }
}
