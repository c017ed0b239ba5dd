//! One-time passcode issuance and verification.
//!
//! The crate is built around [`OtpService`], which binds short-lived codes
//! to an (identifier, purpose) pair, hands them to a [`Delivery`]
//! collaborator for out-of-band transmission, and later verifies submitted
//! codes with single-use semantics. Storage and transport are capability
//! traits so any concrete technology can sit behind them; reference
//! adapters ship for PostgreSQL ([`PgStore`], [`OutboxDelivery`]) and for
//! in-process use ([`MemoryStore`]).

pub mod config;
pub mod delivery;
pub mod error;
pub mod otp;

pub use config::OtpConfig;
pub use delivery::{Delivery, NoopDelivery, OutboxDelivery};
pub use error::{DeliveryError, OtpError, StoreError};
pub use otp::models::{OtpRecord, Purpose};
pub use otp::pg::PgStore;
pub use otp::rate_limit::{
    NoopRateLimiter, RateLimitDecision, SendRateLimiter, SlidingWindowLimiter,
};
pub use otp::service::OtpService;
pub use otp::store::{MemoryStore, OtpStore};
