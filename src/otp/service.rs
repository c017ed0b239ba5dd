//! Issuance and verification service.
//!
//! Flow overview:
//! 1) `send` validates the address, consults the rate limiter, generates a
//!    code, persists its hash (superseding any pending code for the pair),
//!    and hands the plaintext to the delivery collaborator.
//! 2) `verify` fetches the pending record, enforces expiry and the attempt
//!    cap, compares in constant time, and consumes the record through an
//!    atomic compare-and-swap so a code can succeed at most once.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::OtpConfig;
use crate::delivery::Delivery;
use crate::error::{OtpError, StoreError};
use crate::otp::code;
use crate::otp::models::{OtpRecord, Purpose};
use crate::otp::rate_limit::{RateLimitDecision, SendRateLimiter};
use crate::otp::store::OtpStore;
use crate::otp::validate;

#[derive(Clone)]
pub struct OtpService {
    config: OtpConfig,
    store: Arc<dyn OtpStore>,
    delivery: Arc<dyn Delivery>,
    limiter: Arc<dyn SendRateLimiter>,
}

impl OtpService {
    #[must_use]
    pub fn new(
        config: OtpConfig,
        store: Arc<dyn OtpStore>,
        delivery: Arc<dyn Delivery>,
        limiter: Arc<dyn SendRateLimiter>,
    ) -> Self {
        Self {
            config,
            store,
            delivery,
            limiter,
        }
    }

    /// Issue a code for (`email`, `purpose`) and hand it to the delivery
    /// collaborator. The code itself is never returned.
    ///
    /// Any pending code for the same pair is invalidated first. If delivery
    /// ultimately fails, the just-issued record is invalidated too, so no
    /// undeliverable code stays verifiable. Dropping the future between
    /// persistence and delivery leaves at worst a committed, undelivered
    /// record, which the next `send` supersedes and expiry reaps.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed address, `RateLimited` when issuance
    /// for this identifier is throttled, `StoreFailed`/`DeliveryFailed`
    /// with the causing error, `Timeout` when a collaborator exceeds its
    /// deadline.
    pub async fn send(&self, email: &str, purpose: Purpose) -> Result<(), OtpError> {
        let identifier = validate::normalize_identifier(email);
        if identifier.is_empty() {
            return Err(OtpError::InvalidInput("missing email".to_string()));
        }
        if !validate::valid_email(&identifier) {
            return Err(OtpError::InvalidInput("malformed email".to_string()));
        }
        if self.limiter.check(&identifier) == RateLimitDecision::Limited {
            return Err(OtpError::RateLimited);
        }

        let plaintext = code::generate_code(self.config.code_length(), self.config.code_alphabet())?;
        let now = Utc::now();
        let record = OtpRecord {
            id: Uuid::new_v4(),
            identifier: identifier.clone(),
            purpose,
            code_hash: code::hash_secret(&plaintext),
            expires_at: now + chrono::Duration::seconds(self.config.code_ttl_seconds()),
            consumed: false,
            attempts: 0,
            created_at: now,
        };
        self.store_op(self.store.put(record)).await?;

        if let Err(err) = self.deliver_with_retry(&identifier, purpose, &plaintext).await {
            // A code that never reached the user must not stay verifiable.
            let cleanup = self
                .store_op(self.store.invalidate(&identifier, purpose))
                .await;
            if let Err(cleanup_err) = cleanup {
                error!("failed to invalidate undelivered code for {identifier}: {cleanup_err}");
            }
            return Err(err);
        }

        self.limiter.record_send(&identifier);
        info!("code issued for {identifier} ({purpose})");
        Ok(())
    }

    /// Verify a submitted code for (`identifier`, `purpose`).
    ///
    /// The identifier is normalized exactly as `send` normalizes the email,
    /// but no address-shape check is applied; callers may bind codes to
    /// opaque identifiers.
    ///
    /// # Errors
    /// `NotFound` when no pending code exists (including after a previous
    /// success), `Expired` past the TTL, `InvalidCode` on mismatch,
    /// `TooManyAttempts` once the attempt cap is reached,
    /// `AlreadyConsumed` when a concurrent verification won the race, plus
    /// the store/timeout kinds of `send`.
    pub async fn verify(
        &self,
        identifier: &str,
        purpose: Purpose,
        submitted_code: &str,
    ) -> Result<(), OtpError> {
        let identifier = validate::normalize_identifier(identifier);
        if identifier.is_empty() {
            return Err(OtpError::InvalidInput("missing identifier".to_string()));
        }
        let submitted = submitted_code.trim();
        if submitted.is_empty() {
            return Err(OtpError::InvalidInput("missing code".to_string()));
        }

        let record = self
            .store_op(self.store.get_active(&identifier, purpose))
            .await?;
        let Some(record) = record else {
            return Err(OtpError::NotFound);
        };

        if record.is_expired(Utc::now()) {
            // Dead on arrival; drop it so it cannot be retried.
            self.store_op(self.store.invalidate(&identifier, purpose))
                .await?;
            return Err(OtpError::Expired);
        }

        if record.attempts >= self.config.max_attempts() {
            return Err(OtpError::TooManyAttempts);
        }

        if !code::code_matches(submitted, &record.code_hash) {
            let attempts = self.store_op(self.store.record_failure(record.id)).await?;
            if attempts >= self.config.max_attempts() {
                warn!("code locked for {identifier} ({purpose}) after {attempts} failed attempts");
                return Err(OtpError::TooManyAttempts);
            }
            return Err(OtpError::InvalidCode);
        }

        let consumed = self
            .store_op(self.store.compare_and_consume(record.id))
            .await?;
        if !consumed {
            return Err(OtpError::AlreadyConsumed);
        }

        info!("code verified for {identifier} ({purpose})");
        Ok(())
    }

    async fn store_op<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, OtpError> {
        match timeout(self.config.store_timeout(), operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                error!("store operation failed: {err}");
                Err(OtpError::StoreFailed(err))
            }
            Err(_) => Err(OtpError::Timeout),
        }
    }

    async fn deliver_with_retry(
        &self,
        identifier: &str,
        purpose: Purpose,
        plaintext: &SecretString,
    ) -> Result<(), OtpError> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = timeout(
                self.config.delivery_timeout(),
                self.delivery.deliver(identifier, purpose, plaintext),
            )
            .await;
            match outcome {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) if err.is_transient() && attempt < self.config.delivery_retries() => {
                    attempt += 1;
                    warn!("delivery attempt {attempt} for {identifier} failed: {err}; retrying");
                    sleep(self.config.delivery_backoff() * attempt).await;
                }
                Ok(Err(err)) => {
                    error!("delivery failed for {identifier}: {err}");
                    return Err(OtpError::DeliveryFailed(err));
                }
                Err(_) => {
                    error!("delivery timed out for {identifier}");
                    return Err(OtpError::Timeout);
                }
            }
        }
    }
}
