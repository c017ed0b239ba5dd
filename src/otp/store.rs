//! Persistence capability for pending codes, plus the in-memory reference
//! implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::otp::models::{OtpRecord, Purpose};

/// Storage capability consumed by the service.
///
/// `compare_and_consume` must be atomic: of any number of concurrent calls
/// for the same record, exactly one observes the false→true transition.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Persist a new record, invalidating any existing active record for
    /// the same (identifier, purpose) pair in the same atomic step.
    async fn put(&self, record: OtpRecord) -> Result<(), StoreError>;

    /// Fetch the latest unconsumed record for the pair, if any.
    async fn get_active(
        &self,
        identifier: &str,
        purpose: Purpose,
    ) -> Result<Option<OtpRecord>, StoreError>;

    /// Atomically increment the failed-attempt counter, returning the new
    /// count.
    async fn record_failure(&self, id: Uuid) -> Result<i32, StoreError>;

    /// Flip `consumed` false→true for the record. Returns `true` only for
    /// the single winning caller.
    async fn compare_and_consume(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Drop the pending record for the pair, if any.
    async fn invalidate(&self, identifier: &str, purpose: Purpose) -> Result<(), StoreError>;
}

/// In-process store backed by a mutex-guarded map.
///
/// Suitable for tests and single-instance deployments; atomicity comes from
/// the single critical section per operation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(String, Purpose), OtpRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn put(&self, record: OtpRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        // Consumed entries are dead weight; drop them while we hold the lock.
        records.retain(|_, existing| !existing.consumed);
        records.insert((record.identifier.clone(), record.purpose), record);
        Ok(())
    }

    async fn get_active(
        &self,
        identifier: &str,
        purpose: Purpose,
    ) -> Result<Option<OtpRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .get(&(identifier.to_string(), purpose))
            .filter(|record| !record.consumed)
            .cloned())
    }

    async fn record_failure(&self, id: Uuid) -> Result<i32, StoreError> {
        let mut records = self.records.lock().await;
        let record = records
            .values_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| StoreError::new("record no longer present"))?;
        record.attempts += 1;
        Ok(record.attempts)
    }

    async fn compare_and_consume(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        match records.values_mut().find(|record| record.id == id) {
            Some(record) if !record.consumed => {
                record.consumed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn invalidate(&self, identifier: &str, purpose: Purpose) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        records.remove(&(identifier.to_string(), purpose));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::{Duration, Utc};

    fn record(identifier: &str, purpose: Purpose) -> OtpRecord {
        let now = Utc::now();
        OtpRecord {
            id: Uuid::new_v4(),
            identifier: identifier.to_string(),
            purpose,
            code_hash: vec![7u8; 32],
            expires_at: now + Duration::minutes(10),
            consumed: false,
            attempts: 0,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn put_supersedes_previous_record() -> Result<()> {
        let store = MemoryStore::new();
        let first = record("a@example.com", Purpose::SignIn);
        let second = record("a@example.com", Purpose::SignIn);
        let second_id = second.id;

        store.put(first).await?;
        store.put(second).await?;

        let active = store.get_active("a@example.com", Purpose::SignIn).await?;
        assert_eq!(active.map(|r| r.id), Some(second_id));
        Ok(())
    }

    #[tokio::test]
    async fn purposes_are_independent() -> Result<()> {
        let store = MemoryStore::new();
        store.put(record("a@example.com", Purpose::SignIn)).await?;
        store
            .put(record("a@example.com", Purpose::PasswordReset))
            .await?;

        assert!(store
            .get_active("a@example.com", Purpose::SignIn)
            .await?
            .is_some());
        assert!(store
            .get_active("a@example.com", Purpose::PasswordReset)
            .await?
            .is_some());
        Ok(())
    }

    #[tokio::test]
    async fn consume_has_exactly_one_winner() -> Result<()> {
        let store = MemoryStore::new();
        let rec = record("a@example.com", Purpose::SignIn);
        let id = rec.id;
        store.put(rec).await?;

        let first = store.compare_and_consume(id).await?;
        let second = store.compare_and_consume(id).await?;
        assert!(first);
        assert!(!second);

        // Consumed records are no longer visible as active.
        assert!(store
            .get_active("a@example.com", Purpose::SignIn)
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn record_failure_increments_monotonically() -> Result<()> {
        let store = MemoryStore::new();
        let rec = record("a@example.com", Purpose::SignIn);
        let id = rec.id;
        store.put(rec).await?;

        assert_eq!(store.record_failure(id).await?, 1);
        assert_eq!(store.record_failure(id).await?, 2);
        assert_eq!(store.record_failure(id).await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn invalidate_drops_pending_record() -> Result<()> {
        let store = MemoryStore::new();
        store.put(record("a@example.com", Purpose::SignIn)).await?;
        store.invalidate("a@example.com", Purpose::SignIn).await?;
        assert!(store
            .get_active("a@example.com", Purpose::SignIn)
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn record_failure_on_missing_record_is_an_error() {
        let store = MemoryStore::new();
        assert!(store.record_failure(Uuid::new_v4()).await.is_err());
    }
}
