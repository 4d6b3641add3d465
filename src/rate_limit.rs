use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

use crate::settings::ConfigError;

/// Sliding window in-memory rate limiter (process local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), enabled }
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled { return true; }
        let now = Instant::now();
        let mut entry = self.store.entry(key.to_string()).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) >= window { entry.pop_front(); } else { break; }
        }
        if entry.len() < limit {
            entry.push_back(now);
            true
        } else {
            false
        }
    }
}

/// Per-action limits for the write endpoints.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub thread_limit: usize,
    pub thread_window: Duration,
    pub comment_limit: usize,
    pub comment_window: Duration,
    pub reply_limit: usize,
    pub reply_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            thread_limit: 5,
            thread_window: Duration::from_secs(300),
            comment_limit: 20,
            comment_window: Duration::from_secs(60),
            reply_limit: 20,
            reply_window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Read `RL_*` overrides; unset variables keep their default, malformed ones are rejected.
    pub fn from_lookup(get: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let usize_var = |name: &'static str, default: usize| -> Result<usize, ConfigError> {
            match get(name) {
                Some(v) => v.parse().map_err(|_| ConfigError::Invalid(name)),
                None => Ok(default),
            }
        };
        let dur_var = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match get(name) {
                Some(v) => v.parse().map(Duration::from_secs).map_err(|_| ConfigError::Invalid(name)),
                None => Ok(default),
            }
        };
        let d = Self::default();
        Ok(Self {
            thread_limit: usize_var("RL_THREAD_LIMIT", d.thread_limit)?,
            thread_window: dur_var("RL_THREAD_WINDOW", d.thread_window)?,
            comment_limit: usize_var("RL_COMMENT_LIMIT", d.comment_limit)?,
            comment_window: dur_var("RL_COMMENT_WINDOW", d.comment_window)?,
            reply_limit: usize_var("RL_REPLY_LIMIT", d.reply_limit)?,
            reply_window: dur_var("RL_REPLY_WINDOW", d.reply_window)?,
        })
    }
}

/// High level guard used by handlers, keyed by user id.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self { Self { limiter, cfg } }
    pub fn allow_thread(&self, user: &str) -> bool { self.limiter.check(&format!("thread:{user}"), self.cfg.thread_limit, self.cfg.thread_window) }
    pub fn allow_comment(&self, user: &str) -> bool { self.limiter.check(&format!("comment:{user}"), self.cfg.comment_limit, self.cfg.comment_window) }
    pub fn allow_reply(&self, user: &str) -> bool { self.limiter.check(&format!("reply:{user}"), self.cfg.reply_limit, self.cfg.reply_window) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_window_basic() {
        let rl = InMemoryRateLimiter::new(true);
        let window = Duration::from_millis(50);
        for _ in 0..3 { assert!(rl.check("k", 3, window)); }
        assert!(!rl.check("k", 3, window));
        std::thread::sleep(Duration::from_millis(60));
        assert!(rl.check("k", 3, window));
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let rl = InMemoryRateLimiter::new(false);
        for _ in 0..10 { assert!(rl.check("k", 1, Duration::from_secs(60))); }
    }

    #[test]
    fn actions_are_limited_independently() {
        let cfg = RateLimitConfig { comment_limit: 1, ..RateLimitConfig::default() };
        let f = RateLimiterFacade::new(InMemoryRateLimiter::new(true), cfg);
        assert!(f.allow_comment("user-1"));
        assert!(!f.allow_comment("user-1"));
        assert!(f.allow_comment("user-2"));
        assert!(f.allow_reply("user-1"));
    }

    #[test]
    fn malformed_override_is_rejected() {
        let get = |name: &str| (name == "RL_COMMENT_LIMIT").then(|| "lots".to_string());
        assert_eq!(RateLimitConfig::from_lookup(&get).unwrap_err(), ConfigError::Invalid("RL_COMMENT_LIMIT"));
        let get = |name: &str| (name == "RL_THREAD_WINDOW").then(|| "-1".to_string());
        assert_eq!(RateLimitConfig::from_lookup(&get).unwrap_err(), ConfigError::Invalid("RL_THREAD_WINDOW"));
        let get = |name: &str| (name == "RL_REPLY_LIMIT").then(|| "2".to_string());
        let cfg = RateLimitConfig::from_lookup(&get).unwrap();
        assert_eq!(cfg.reply_limit, 2);
        assert_eq!(cfg.comment_limit, RateLimitConfig::default().comment_limit);
    }
}
