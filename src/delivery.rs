//! Delivery capability and reference adapters.
//!
//! The service only consumes the success/failure signal; templating,
//! provider selection, and retries beyond the bounded in-call retry are
//! the transport's concern.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, Instrument};

use crate::error::DeliveryError;
use crate::otp::models::Purpose;

/// Out-of-band transport for freshly issued codes.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(
        &self,
        identifier: &str,
        purpose: Purpose,
        code: &SecretString,
    ) -> Result<(), DeliveryError>;
}

/// Discards codes. For tests and local development only.
#[derive(Clone, Debug)]
pub struct NoopDelivery;

#[async_trait]
impl Delivery for NoopDelivery {
    async fn deliver(
        &self,
        identifier: &str,
        _purpose: Purpose,
        _code: &SecretString,
    ) -> Result<(), DeliveryError> {
        debug!("noop delivery for {identifier}");
        Ok(())
    }
}

/// Transactional-outbox delivery: codes are enqueued as `email_outbox`
/// rows and drained by an external sender.
///
/// Expected schema:
///
/// ```sql
/// CREATE TABLE email_outbox (
///     id           BIGSERIAL PRIMARY KEY,
///     to_email     TEXT NOT NULL,
///     template     TEXT NOT NULL,
///     payload_json JSONB NOT NULL,
///     created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
#[derive(Clone, Debug)]
pub struct OutboxDelivery {
    pool: PgPool,
}

impl OutboxDelivery {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn template_for(purpose: Purpose) -> &'static str {
        match purpose {
            Purpose::EmailVerification => "otp_verify_email",
            Purpose::PasswordReset => "otp_password_reset",
            Purpose::SignIn => "otp_sign_in",
        }
    }
}

#[async_trait]
impl Delivery for OutboxDelivery {
    async fn deliver(
        &self,
        identifier: &str,
        purpose: Purpose,
        code: &SecretString,
    ) -> Result<(), DeliveryError> {
        let payload = json!({
            "email": identifier,
            "purpose": purpose.as_str(),
            "code": code.expose_secret(),
        });
        let payload_text = serde_json::to_string(&payload).map_err(|err| {
            DeliveryError::terminal("failed to serialize outbox payload").with_source(err)
        })?;

        let query = r"
            INSERT INTO email_outbox (to_email, template, payload_json)
            VALUES ($1, $2, $3::jsonb)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(identifier)
            .bind(Self::template_for(purpose))
            .bind(payload_text)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                // A retried insert at worst enqueues the same code twice.
                DeliveryError::transient("failed to enqueue outbox row").with_source(err)
            })?;

        Ok(())
    }
}
