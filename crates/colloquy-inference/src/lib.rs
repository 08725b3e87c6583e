//! # colloquy-inference
//!
//! Remote analysis provider abstraction for colloquy.
//!
//! This crate provides:
//! - The pluggable [`AnalysisProvider`] trait
//! - An Ollama-backed implementation (default)
//! - The insight response parser (raw payload → typed candidates)
//! - A mock provider for tests (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use colloquy_inference::{AnalysisProvider, AnalysisRequest, OllamaAnalysisBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaAnalysisBackend::from_env();
//!     let req = AnalysisRequest {
//!         units: vec![],
//!         subject_id: "meeting-42".to_string(),
//!         invoker_id: "user-7".to_string(),
//!     };
//!     let response = backend.analyze(&req).await.unwrap();
//!     println!("{}", response.raw_text);
//! }
//! ```

pub mod ollama;
pub mod parser;
pub mod provider;

// Mock analysis backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use colloquy_core::*;

pub use ollama::OllamaAnalysisBackend;
pub use parser::parse;
pub use provider::{build_analysis_prompt, AnalysisProvider, AnalysisRequest, AnalysisResponse};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockAnalysisBackend;
