//! Record and purpose types for pending codes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

/// Namespace tag distinguishing concurrent code flows for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Purpose {
    EmailVerification,
    PasswordReset,
    SignIn,
}

impl Purpose {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailVerification => "email-verification",
            Self::PasswordReset => "password-reset",
            Self::SignIn => "sign-in",
        }
    }

    /// Parse the persisted `otp_codes.purpose` textual value into a typed enum.
    fn from_db(value: &str) -> Result<Self, sqlx::Error> {
        match value {
            "email-verification" => Ok(Self::EmailVerification),
            "password-reset" => Ok(Self::PasswordReset),
            "sign-in" => Ok(Self::SignIn),
            _ => Err(sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid otp_codes.purpose value: {value}"),
            )))),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending code bound to an (identifier, purpose) pair.
///
/// Only the SHA-256 hash of the code is kept; the raw code exists solely in
/// transit between the generator and the delivery collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    pub id: Uuid,
    pub identifier: String,
    pub purpose: Purpose,
    pub code_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl<'r> FromRow<'r, PgRow> for OtpRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let purpose: String = row.try_get("purpose")?;
        Ok(Self {
            id: row.try_get("id")?,
            identifier: row.try_get("identifier")?,
            purpose: Purpose::from_db(&purpose)?,
            code_hash: row.try_get("code_hash")?,
            expires_at: row.try_get("expires_at")?,
            consumed: row.try_get("consumed")?,
            attempts: row.try_get("attempts")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn purpose_textual_forms_round_trip() {
        for purpose in [
            Purpose::EmailVerification,
            Purpose::PasswordReset,
            Purpose::SignIn,
        ] {
            assert_eq!(Purpose::from_db(purpose.as_str()).ok(), Some(purpose));
        }
        assert!(Purpose::from_db("unknown-tag").is_err());
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let now = Utc::now();
        let record = OtpRecord {
            id: Uuid::new_v4(),
            identifier: "a@example.com".to_string(),
            purpose: Purpose::SignIn,
            code_hash: vec![0u8; 32],
            expires_at: now,
            consumed: false,
            attempts: 0,
            created_at: now,
        };
        assert!(!record.is_expired(now));
        assert!(record.is_expired(now + Duration::seconds(1)));
    }
}
