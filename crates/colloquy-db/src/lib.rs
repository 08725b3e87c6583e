//! # colloquy-db
//!
//! PostgreSQL store layer for colloquy.
//!
//! This crate provides:
//! - Connection pool management
//! - Store implementations for analysis jobs, insights, and provenance
//! - In-memory store implementations for tests and embedded use
//!
//! Expected tables: `analysis_job`, `insight`, `insight_tag`,
//! `insight_source_link`, `provenance_source`. Schema management lives
//! outside this workspace.
//!
//! ## Example
//!
//! ```rust,ignore
//! use colloquy_db::Database;
//! use colloquy_core::{JobKind, JobStore, SubmitJobRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/colloquy").await?;
//!
//!     let job_id = db
//!         .jobs
//!         .submit(SubmitJobRequest::new(
//!             JobKind::Transcription,
//!             "meeting-42",
//!             "user-7",
//!         ))
//!         .await?;
//!
//!     println!("Submitted job: {}", job_id);
//!     Ok(())
//! }
//! ```

pub mod insights;
pub mod jobs;
pub mod memory;
pub mod pool;
pub mod provenance;

// Re-export core types
pub use colloquy_core::*;

// Re-export store implementations
pub use insights::PgInsightStore;
pub use jobs::PgJobStore;
pub use memory::{
    MemoryConversationStore, MemoryInsightStore, MemoryJobStore, MemoryProvenanceStore,
};
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use provenance::PgProvenanceStore;

/// Combined database context with all stores.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Analysis job store.
    pub jobs: PgJobStore,
    /// Insight record store.
    pub insights: PgInsightStore,
    /// Provenance source store.
    pub provenance: PgProvenanceStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            jobs: PgJobStore::new(pool.clone()),
            insights: PgInsightStore::new(pool.clone()),
            provenance: PgProvenanceStore::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
