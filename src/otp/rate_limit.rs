//! Rate limiting primitives for code issuance.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::OtpConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

/// Issuance throttle consulted before any store or delivery work.
pub trait SendRateLimiter: Send + Sync {
    fn check(&self, identifier: &str) -> RateLimitDecision;
    fn record_send(&self, identifier: &str);
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl SendRateLimiter for NoopRateLimiter {
    fn check(&self, _identifier: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }

    fn record_send(&self, _identifier: &str) {}
}

/// Per-identifier throttle: a minimum interval between sends plus a cap on
/// sends within a rolling window. Identifiers never affect each other.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    cooldown: Duration,
    window: Duration,
    max_per_window: usize,
    sends: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(cooldown: Duration, window: Duration, max_per_window: usize) -> Self {
        Self {
            cooldown,
            window,
            max_per_window,
            sends: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn from_config(config: &OtpConfig) -> Self {
        Self::new(
            config.send_cooldown(),
            config.send_window(),
            config.sends_per_window(),
        )
    }

    fn prune(&self, sends: &mut HashMap<String, VecDeque<Instant>>, now: Instant) {
        for timestamps in sends.values_mut() {
            while timestamps
                .front()
                .is_some_and(|sent| now.duration_since(*sent) >= self.window)
            {
                timestamps.pop_front();
            }
        }
        sends.retain(|_, timestamps| !timestamps.is_empty());
    }
}

impl SendRateLimiter for SlidingWindowLimiter {
    fn check(&self, identifier: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut sends = match self.sends.lock() {
            Ok(sends) => sends,
            // A poisoned lock means a panic elsewhere; fail closed.
            Err(_) => return RateLimitDecision::Limited,
        };
        self.prune(&mut sends, now);

        let Some(timestamps) = sends.get(identifier) else {
            return RateLimitDecision::Allowed;
        };
        if timestamps
            .back()
            .is_some_and(|sent| now.duration_since(*sent) < self.cooldown)
        {
            return RateLimitDecision::Limited;
        }
        if timestamps.len() >= self.max_per_window {
            return RateLimitDecision::Limited;
        }
        RateLimitDecision::Allowed
    }

    fn record_send(&self, identifier: &str) {
        let now = Instant::now();
        if let Ok(mut sends) = self.sends.lock() {
            sends
                .entry(identifier.to_string())
                .or_default()
                .push_back(now);
        }
    }
}
