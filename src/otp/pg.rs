//! PostgreSQL-backed store.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE otp_codes (
//!     id         UUID PRIMARY KEY,
//!     identifier TEXT NOT NULL,
//!     purpose    TEXT NOT NULL,
//!     code_hash  BYTEA NOT NULL,
//!     expires_at TIMESTAMPTZ NOT NULL,
//!     consumed   BOOLEAN NOT NULL DEFAULT FALSE,
//!     attempts   INTEGER NOT NULL DEFAULT 0,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE INDEX otp_codes_pair_idx ON otp_codes (identifier, purpose);
//! ```
//!
//! Single-use is enforced by the database: the consume step is a
//! conditional `UPDATE ... WHERE consumed = FALSE RETURNING id`, so two
//! racing verifications resolve to exactly one winner regardless of how
//! many service instances share the pool.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::StoreError;
use crate::otp::models::{OtpRecord, Purpose};
use crate::otp::store::OtpStore;

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpStore for PgStore {
    async fn put(&self, record: OtpRecord) -> Result<(), StoreError> {
        // Supersede-and-insert in one transaction so no moment exists with
        // two active records for the pair.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| StoreError::with_source("failed to begin put transaction", err))?;

        let query = "DELETE FROM otp_codes WHERE identifier = $1 AND purpose = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&record.identifier)
            .bind(record.purpose.as_str())
            .execute(&mut *tx)
            .instrument(span)
            .await
            .map_err(|err| StoreError::with_source("failed to supersede previous code", err))?;

        let query = r"
            INSERT INTO otp_codes
                (id, identifier, purpose, code_hash, expires_at, consumed, attempts, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(record.id)
            .bind(&record.identifier)
            .bind(record.purpose.as_str())
            .bind(&record.code_hash)
            .bind(record.expires_at)
            .bind(record.consumed)
            .bind(record.attempts)
            .bind(record.created_at)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .map_err(|err| StoreError::with_source("failed to insert code record", err))?;

        tx.commit()
            .await
            .map_err(|err| StoreError::with_source("failed to commit put transaction", err))
    }

    async fn get_active(
        &self,
        identifier: &str,
        purpose: Purpose,
    ) -> Result<Option<OtpRecord>, StoreError> {
        let query = r"
            SELECT * FROM otp_codes
            WHERE identifier = $1
              AND purpose = $2
              AND consumed = FALSE
            ORDER BY created_at DESC
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, OtpRecord>(query)
            .bind(identifier)
            .bind(purpose.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| StoreError::with_source("failed to fetch active code", err))
    }

    async fn record_failure(&self, id: Uuid) -> Result<i32, StoreError> {
        let query = "UPDATE otp_codes SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| StoreError::with_source("failed to record failed attempt", err))?;

        row.map(|row| row.get("attempts"))
            .ok_or_else(|| StoreError::new("record no longer present"))
    }

    async fn compare_and_consume(&self, id: Uuid) -> Result<bool, StoreError> {
        let query = "UPDATE otp_codes SET consumed = TRUE WHERE id = $1 AND consumed = FALSE RETURNING id";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| StoreError::with_source("failed to consume code", err))?;

        Ok(row.is_some())
    }

    async fn invalidate(&self, identifier: &str, purpose: Purpose) -> Result<(), StoreError> {
        let query =
            "DELETE FROM otp_codes WHERE identifier = $1 AND purpose = $2 AND consumed = FALSE";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(identifier)
            .bind(purpose.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| StoreError::with_source("failed to invalidate code", err))?;

        Ok(())
    }
}
