use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use turngate_types::prelude::UserId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default = "ThrottleConfig::default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "ThrottleConfig::default_window_secs")]
    pub window_secs: u64,
}

impl ThrottleConfig {
    fn default_max_requests() -> u32 {
        10
    }

    fn default_window_secs() -> u64 {
        60
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_requests: Self::default_max_requests(),
            window_secs: Self::default_window_secs(),
        }
    }
}

/// Per-user submission limiter. A denial must happen before any side effect
/// of the request, and the check must be indivisible under concurrency.
pub trait ThrottleGate: Send + Sync {
    fn allow(&self, user: &UserId) -> bool;
}

/// Rolling-window gate: remembers the accept instants of the last
/// `max_requests` submissions per user and denies while the window is full.
/// Evict + check + record runs under one lock, so two racing requests can
/// never both pass as the final slot.
pub struct SlidingWindowThrottle {
    window: Duration,
    max_requests: usize,
    accepts: Mutex<HashMap<UserId, VecDeque<Instant>>>,
}

impl SlidingWindowThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests as usize,
            accepts: Mutex::new(HashMap::new()),
        }
    }

    fn allow_at(&self, user: &UserId, now: Instant) -> bool {
        let mut guard = self.accepts.lock();
        let window = guard.entry(user.clone()).or_default();
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }
        if window.len() >= self.max_requests {
            return false;
        }
        window.push_back(now);
        true
    }
}

impl ThrottleGate for SlidingWindowThrottle {
    fn allow(&self, user: &UserId) -> bool {
        self.allow_at(user, Instant::now())
    }
}
