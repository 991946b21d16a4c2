//! Terminal-verdict persistence.
//!
//! One parameterised UPDATE against the `EmailCheck` table keyed by
//! `(jobId, email)`. Status strings only exist at this boundary; the
//! rest of the worker handles the closed enum.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::core::error::Result;
use crate::core::types::EmailStatus;

/// Write target for terminal outcomes. Tests substitute an in-memory
/// double; production uses Postgres.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Records the terminal verdict for `(job_id, email)`. Re-recording
    /// the same verdict is a no-op in effect: the row ends in the same
    /// state.
    async fn record_outcome(
        &self,
        job_id: &str,
        email: &str,
        status: EmailStatus,
        smtp_code: u16,
        bounce_reason: &str,
    ) -> Result<()>;
}

/// Postgres-backed store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects the pool and verifies the database answers.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl OutcomeStore for PgStore {
    async fn record_outcome(
        &self,
        job_id: &str,
        email: &str,
        status: EmailStatus,
        smtp_code: u16,
        bounce_reason: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE "EmailCheck"
            SET status = $1,
                "smtpCode" = $2,
                "bounceReason" = $3
            WHERE "jobId" = $4 AND email = $5
            "#,
        )
        .bind(status.as_str())
        .bind(i32::from(smtp_code))
        .bind(bounce_reason)
        .bind(job_id)
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
