//! Provenance source store implementation.
//!
//! A provenance source captures which raw input batch produced a set of
//! insights. It is an enrichment: creation failures never block insight
//! persistence.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use colloquy_core::{
    new_v7, Error, NewProvenanceSource, ProvenanceSource, ProvenanceStore, Result,
};

/// PostgreSQL implementation of ProvenanceStore.
pub struct PgProvenanceStore {
    pool: Pool<Postgres>,
}

impl PgProvenanceStore {
    /// Create a new PgProvenanceStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProvenanceStore for PgProvenanceStore {
    async fn create(&self, source: NewProvenanceSource) -> Result<ProvenanceSource> {
        let row = sqlx::query(
            "INSERT INTO provenance_source (id, kind, label, meta, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, created_at",
        )
        .bind(new_v7())
        .bind(&source.kind)
        .bind(&source.label)
        .bind(&source.meta)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(ProvenanceSource {
            id: row.get("id"),
            kind: source.kind,
            label: source.label,
            meta: source.meta,
            created_at: row.get("created_at"),
        })
    }

    async fn get(&self, source_id: Uuid) -> Result<Option<ProvenanceSource>> {
        let row = sqlx::query(
            "SELECT id, kind, label, meta, created_at FROM provenance_source WHERE id = $1",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| ProvenanceSource {
            id: row.get("id"),
            kind: row.get("kind"),
            label: row.get("label"),
            meta: row.get("meta"),
            created_at: row.get("created_at"),
        }))
    }
}
