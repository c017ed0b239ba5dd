//! Service configuration with conservative security defaults.

use std::time::Duration;

const DEFAULT_CODE_LENGTH: usize = 6;
const DEFAULT_CODE_ALPHABET: &str = "0123456789";
const DEFAULT_CODE_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_MAX_ATTEMPTS: i32 = 5;
const DEFAULT_SEND_COOLDOWN: Duration = Duration::from_secs(60);
const DEFAULT_SEND_WINDOW: Duration = Duration::from_secs(60 * 60);
const DEFAULT_SENDS_PER_WINDOW: usize = 5;
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_DELIVERY_RETRIES: u32 = 2;
const DEFAULT_DELIVERY_BACKOFF: Duration = Duration::from_millis(250);

/// Tunables for code issuance and verification.
///
/// Defaults are deliberately conservative: 6-digit numeric codes, a
/// 10-minute lifetime, 5 verification attempts, and a 60-second issuance
/// cooldown per identifier.
#[derive(Clone, Debug)]
pub struct OtpConfig {
    code_length: usize,
    code_alphabet: String,
    code_ttl_seconds: i64,
    max_attempts: i32,
    send_cooldown: Duration,
    send_window: Duration,
    sends_per_window: usize,
    store_timeout: Duration,
    delivery_timeout: Duration,
    delivery_retries: u32,
    delivery_backoff: Duration,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            code_length: DEFAULT_CODE_LENGTH,
            code_alphabet: DEFAULT_CODE_ALPHABET.to_string(),
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            send_cooldown: DEFAULT_SEND_COOLDOWN,
            send_window: DEFAULT_SEND_WINDOW,
            sends_per_window: DEFAULT_SENDS_PER_WINDOW,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            delivery_retries: DEFAULT_DELIVERY_RETRIES,
            delivery_backoff: DEFAULT_DELIVERY_BACKOFF,
        }
    }

    #[must_use]
    pub fn with_code_length(mut self, length: usize) -> Self {
        self.code_length = length;
        self
    }

    #[must_use]
    pub fn with_code_alphabet(mut self, alphabet: impl Into<String>) -> Self {
        self.code_alphabet = alphabet.into();
        self
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: i32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_send_cooldown(mut self, cooldown: Duration) -> Self {
        self.send_cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn with_send_window(mut self, window: Duration, sends_per_window: usize) -> Self {
        self.send_window = window;
        self.sends_per_window = sends_per_window;
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_delivery_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.delivery_retries = retries;
        self.delivery_backoff = backoff;
        self
    }

    #[must_use]
    pub fn code_length(&self) -> usize {
        self.code_length
    }

    #[must_use]
    pub fn code_alphabet(&self) -> &str {
        &self.code_alphabet
    }

    #[must_use]
    pub fn code_ttl_seconds(&self) -> i64 {
        self.code_ttl_seconds
    }

    #[must_use]
    pub fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    #[must_use]
    pub fn send_cooldown(&self) -> Duration {
        self.send_cooldown
    }

    #[must_use]
    pub fn send_window(&self) -> Duration {
        self.send_window
    }

    #[must_use]
    pub fn sends_per_window(&self) -> usize {
        self.sends_per_window
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    #[must_use]
    pub fn delivery_retries(&self) -> u32 {
        self.delivery_retries
    }

    #[must_use]
    pub fn delivery_backoff(&self) -> Duration {
        self.delivery_backoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let config = OtpConfig::new();
        assert_eq!(config.code_length(), 6);
        assert_eq!(config.code_alphabet(), "0123456789");
        assert_eq!(config.code_ttl_seconds(), 600);
        assert_eq!(config.max_attempts(), 5);
        assert_eq!(config.send_cooldown(), Duration::from_secs(60));
        assert_eq!(config.sends_per_window(), 5);
    }

    #[test]
    fn builder_overrides() {
        let config = OtpConfig::new()
            .with_code_length(8)
            .with_code_alphabet("ABCDEF0123456789")
            .with_code_ttl_seconds(300)
            .with_max_attempts(3)
            .with_send_cooldown(Duration::ZERO)
            .with_send_window(Duration::from_secs(600), 10)
            .with_delivery_retries(0, Duration::ZERO);
        assert_eq!(config.code_length(), 8);
        assert_eq!(config.code_alphabet(), "ABCDEF0123456789");
        assert_eq!(config.code_ttl_seconds(), 300);
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.send_cooldown(), Duration::ZERO);
        assert_eq!(config.send_window(), Duration::from_secs(600));
        assert_eq!(config.sends_per_window(), 10);
        assert_eq!(config.delivery_retries(), 0);
    }
}
