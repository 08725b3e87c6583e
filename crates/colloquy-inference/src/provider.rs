//! Analysis provider trait and request/response types.

use async_trait::async_trait;

use colloquy_core::{ChatUnit, Result};

/// Input for one analysis invocation.
///
/// The caller caps `units` at the sliding-window maximum; older context is
/// dropped, not summarized.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// The most recent input units for the subject, oldest first.
    pub units: Vec<ChatUnit>,
    /// The channel/meeting the analysis is scoped to.
    pub subject_id: String,
    /// The user on whose behalf the analysis runs.
    pub invoker_id: String,
}

/// Successful analysis output: a raw textual payload for the parser.
#[derive(Debug, Clone)]
pub struct AnalysisResponse {
    pub raw_text: String,
}

/// Backend capable of extracting insights from conversational text.
///
/// Implementations make exactly one attempt per call; no retry or backoff
/// exists at this layer — re-invocation only happens via a new trigger.
/// Failures are classified at this boundary: `Api` for a faulted call,
/// `Validation` for an empty/malformed success envelope, `Network` for a
/// transport failure.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Run one analysis over the request's unit window.
    async fn analyze(&self, req: &AnalysisRequest) -> Result<AnalysisResponse>;

    /// Check if the provider is reachable.
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Build the extraction prompt for a unit window.
///
/// The instructions pin the wire format the parser consumes: blocks
/// separated by a `---` line, a `#` heading title, and `Context:`/`Tags:`
/// labelled subsections.
pub fn build_analysis_prompt(req: &AnalysisRequest) -> String {
    let mut transcript = String::new();
    for unit in &req.units {
        transcript.push_str(&format!(
            "[{}] {}: {}\n",
            unit.timestamp.format("%H:%M"),
            unit.author_name,
            unit.text
        ));
    }

    format!(
        "You are analyzing a conversation to extract durable insights \
         (decisions, action items, open questions, notable facts).\n\
         \n\
         Conversation:\n{transcript}\n\
         Write each insight as a block separated by a line containing only ---\n\
         Each block must have this shape:\n\
         # <short title>\n\
         Context:\n\
         <one or two sentences of supporting context>\n\
         Tags: <comma-separated tags, may be empty>\n\
         \n\
         Output only the blocks. If nothing is worth extracting, output nothing."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn unit(author: &str, text: &str) -> ChatUnit {
        ChatUnit {
            text: text.to_string(),
            author_name: author.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_includes_transcript() {
        let req = AnalysisRequest {
            units: vec![unit("ada", "we should ship friday"), unit("lin", "agreed")],
            subject_id: "meeting-1".to_string(),
            invoker_id: "user-1".to_string(),
        };

        let prompt = build_analysis_prompt(&req);
        assert!(prompt.contains("ada: we should ship friday"));
        assert!(prompt.contains("lin: agreed"));
    }

    #[test]
    fn test_prompt_pins_wire_format() {
        let req = AnalysisRequest {
            units: vec![],
            subject_id: "m".to_string(),
            invoker_id: "u".to_string(),
        };

        let prompt = build_analysis_prompt(&req);
        assert!(prompt.contains("---"));
        assert!(prompt.contains("Context:"));
        assert!(prompt.contains("Tags:"));
    }
}
