//! # colloquy-core
//!
//! Core types, traits, and abstractions for the colloquy analysis pipeline.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other colloquy crates depend on: analysis job models, insight
//! records, store traits, the error taxonomy, and the pipeline event bus.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, ErrorKind, Result};
pub use events::{EventBus, PipelineEvent};
pub use models::*;
pub use traits::*;
pub use uuid_utils::new_v7;
