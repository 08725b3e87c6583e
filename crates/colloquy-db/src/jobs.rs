//! Analysis job store implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use colloquy_core::{
    new_v7, AnalysisJob, Error, JobKind, JobStatus, JobStore, Result, SubmitJobRequest,
};

/// PostgreSQL implementation of JobStore.
pub struct PgJobStore {
    pool: Pool<Postgres>,
}

impl PgJobStore {
    /// Create a new PgJobStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert JobKind to string for the database.
    fn kind_to_str(kind: JobKind) -> &'static str {
        match kind {
            JobKind::Diarization => "diarization",
            JobKind::Transcription => "transcription",
            JobKind::Summarization => "summarization",
            JobKind::InsightExtraction => "insight_extraction",
        }
    }

    /// Convert string from the database to JobKind.
    fn str_to_kind(s: &str) -> JobKind {
        match s {
            "diarization" => JobKind::Diarization,
            "transcription" => JobKind::Transcription,
            "summarization" => JobKind::Summarization,
            "insight_extraction" => JobKind::InsightExtraction,
            _ => JobKind::InsightExtraction, // fallback
        }
    }

    /// Convert JobStatus to string for the database.
    fn status_to_str(status: JobStatus) -> &'static str {
        match status {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Convert string from the database to JobStatus.
    fn str_to_status(s: &str) -> JobStatus {
        match s {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Pending, // fallback
        }
    }

    /// Parse a job row into an AnalysisJob struct.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> AnalysisJob {
        AnalysisJob {
            id: row.get("id"),
            kind: Self::str_to_kind(row.get("kind")),
            status: Self::str_to_status(row.get("status")),
            progress: row.get("progress"),
            subject_id: row.get("subject_id"),
            owner_id: row.get("owner_id"),
            metadata: row.get("metadata"),
            result: row.get("result"),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    const JOB_COLUMNS: &'static str = "id, kind, status, progress, subject_id, owner_id, \
         metadata, result, error_message, created_at, updated_at";
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn submit(&self, req: SubmitJobRequest) -> Result<Uuid> {
        let job_id = new_v7();
        let now = Utc::now();
        let kind_str = Self::kind_to_str(req.kind);

        // Atomic insert-unless-exists keeps the one-non-terminal-job
        // invariant for submissions racing within this statement. The
        // existing-row fallback below is a separate read: concurrent
        // submissions from independent processes can still race past it.
        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO analysis_job \
                 (id, kind, status, progress, subject_id, owner_id, metadata, created_at, updated_at)
             SELECT $1, $2, 'pending', 0, $3, $4, $5, $6, $6
             WHERE NOT EXISTS (
                 SELECT 1 FROM analysis_job
                 WHERE subject_id = $3 AND kind = $2 AND owner_id = $4
                   AND status IN ('pending', 'running')
             )
             RETURNING id",
        )
        .bind(job_id)
        .bind(kind_str)
        .bind(&req.subject_id)
        .bind(&req.owner_id)
        .bind(&req.metadata)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(id) = inserted {
            return Ok(id);
        }

        // A non-terminal sibling exists: idempotent submission returns its id.
        let existing = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM analysis_job
             WHERE subject_id = $1 AND kind = $2 AND owner_id = $3
               AND status IN ('pending', 'running')
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .bind(&req.subject_id)
        .bind(kind_str)
        .bind(&req.owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        existing.ok_or_else(|| {
            Error::Internal("Dedup insert skipped but no non-terminal job found".into())
        })
    }

    async fn record_terminal(&self, job: AnalysisJob) -> Result<Uuid> {
        if !job.status.is_terminal() {
            return Err(Error::Internal(format!(
                "record_terminal called with non-terminal status {:?}",
                job.status
            )));
        }

        sqlx::query(
            "INSERT INTO analysis_job \
                 (id, kind, status, progress, subject_id, owner_id, metadata, result, \
                  error_message, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(job.id)
        .bind(Self::kind_to_str(job.kind))
        .bind(Self::status_to_str(job.status))
        .bind(job.progress)
        .bind(&job.subject_id)
        .bind(&job.owner_id)
        .bind(&job.metadata)
        .bind(&job.result)
        .bind(&job.error_message)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(job.id)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<AnalysisJob>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM analysis_job WHERE id = $1",
            Self::JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<AnalysisJob>> {
        let now = Utc::now();
        let kind_strings: Vec<String> = kinds
            .iter()
            .map(|k| Self::kind_to_str(*k).to_string())
            .collect();

        // FOR UPDATE SKIP LOCKED allows concurrent workers to claim without
        // blocking each other. Empty array = claim any kind.
        let row = sqlx::query(&format!(
            "UPDATE analysis_job
             SET status = 'running', updated_at = $1
             WHERE id = (
                 SELECT id FROM analysis_job
                 WHERE status = 'pending'
                   AND (cardinality($2::text[]) = 0 OR kind = ANY($2))
                 ORDER BY created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {}",
            Self::JOB_COLUMNS
        ))
        .bind(now)
        .bind(&kind_strings)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn update_progress(&self, job_id: Uuid, percent: i32) -> Result<()> {
        sqlx::query(
            "UPDATE analysis_job
             SET progress = $1, updated_at = $2
             WHERE id = $3 AND status IN ('pending', 'running')",
        )
        .bind(percent.clamp(0, 100))
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        // Terminal states are final: the guard refuses to re-transition rows
        // that already completed, failed, or were cancelled.
        sqlx::query(
            "UPDATE analysis_job
             SET status = 'completed', progress = 100, result = $1, updated_at = $2
             WHERE id = $3 AND status IN ('pending', 'running')",
        )
        .bind(&result)
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE analysis_job
             SET status = 'failed', error_message = $1, updated_at = $2
             WHERE id = $3 AND status IN ('pending', 'running')",
        )
        .bind(error)
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_for_subject(&self, subject_id: &str) -> Result<Vec<AnalysisJob>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM analysis_job
             WHERE subject_id = $1
             ORDER BY created_at DESC",
            Self::JOB_COLUMNS
        ))
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_job_row).collect())
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM analysis_job WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count)
    }
}
