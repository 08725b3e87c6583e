//! Insight record store implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use colloquy_core::{new_v7, Error, InsightRecord, InsightStore, NewInsight, Result};

/// PostgreSQL implementation of InsightStore.
pub struct PgInsightStore {
    pool: Pool<Postgres>,
}

impl PgInsightStore {
    /// Create a new PgInsightStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InsightStore for PgInsightStore {
    async fn insert_bulk(
        &self,
        container_id: Uuid,
        insights: Vec<NewInsight>,
    ) -> Result<Vec<InsightRecord>> {
        if insights.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Order indexes continue from the container's current tail.
        let base_index: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM insight WHERE container_id = $1",
        )
        .bind(container_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let mut records = Vec::with_capacity(insights.len());
        for (i, insight) in insights.into_iter().enumerate() {
            let row = sqlx::query(
                "INSERT INTO insight \
                     (id, container_id, title, content, source_id, created_by, created_at, \
                      order_index, archived)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false)
                 RETURNING id, created_at, order_index",
            )
            .bind(new_v7())
            .bind(container_id)
            .bind(&insight.title)
            .bind(&insight.content)
            .bind(insight.source_id)
            .bind(&insight.created_by)
            .bind(Utc::now())
            .bind(base_index + i as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;

            records.push(InsightRecord {
                id: row.get("id"),
                container_id,
                title: insight.title,
                content: insight.content,
                tags: insight.tags,
                source_id: insight.source_id,
                created_by: insight.created_by,
                created_at: row.get("created_at"),
                order_index: row.get("order_index"),
                archived: false,
            });
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(records)
    }

    async fn set_tags(&self, record_id: Uuid, tags: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM insight_tag WHERE insight_id = $1")
            .bind(record_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        for tag in tags {
            sqlx::query(
                "INSERT INTO insight_tag (insight_id, tag) VALUES ($1, $2)
                 ON CONFLICT (insight_id, tag) DO NOTHING",
            )
            .bind(record_id)
            .bind(tag)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn link_source(&self, record_id: Uuid, source_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO insight_source_link (insight_id, source_id) VALUES ($1, $2)
             ON CONFLICT (insight_id, source_id) DO NOTHING",
        )
        .bind(record_id)
        .bind(source_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn archive(&self, record_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE insight SET archived = true WHERE id = $1")
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_for_container(&self, container_id: Uuid) -> Result<Vec<InsightRecord>> {
        let rows = sqlx::query(
            "SELECT i.id, i.container_id, i.title, i.content, i.source_id, i.created_by,
                    i.created_at, i.order_index, i.archived,
                    COALESCE(
                        ARRAY_AGG(t.tag ORDER BY t.tag) FILTER (WHERE t.tag IS NOT NULL),
                        '{}'
                    ) AS tags
             FROM insight i
             LEFT JOIN insight_tag t ON t.insight_id = i.id
             WHERE i.container_id = $1 AND NOT i.archived
             GROUP BY i.id, i.container_id, i.title, i.content, i.source_id, i.created_by,
                      i.created_at, i.order_index, i.archived
             ORDER BY i.order_index ASC",
        )
        .bind(container_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| InsightRecord {
                id: row.get("id"),
                container_id: row.get("container_id"),
                title: row.get("title"),
                content: row.get("content"),
                tags: row.get("tags"),
                source_id: row.get("source_id"),
                created_by: row.get("created_by"),
                created_at: row.get("created_at"),
                order_index: row.get("order_index"),
                archived: row.get("archived"),
            })
            .collect())
    }
}
