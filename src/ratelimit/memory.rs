use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::RateLimitDecision;

/// Longest window honoured; larger values are clamped.
pub const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    ends_at: Instant,
}

/// In-process fixed-window counters, one live window per key.
///
/// Only correct for a single gateway instance; with several replicas each
/// keeps its own count.
#[derive(Debug, Default)]
pub struct MemoryCounter {
    windows: DashMap<String, Window>,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, key: &str, limit: u64, window: Duration) -> RateLimitDecision {
        self.check_at(key, limit, window, Instant::now())
    }

    /// Count one request for `key` at `now`.
    ///
    /// The shard lock held by `entry` makes increment-and-read atomic per key.
    pub fn check_at(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            ends_at: now,
        });

        if now >= entry.ends_at {
            entry.count = 1;
            entry.ends_at = now.checked_add(window.min(MAX_WINDOW)).unwrap_or(now);
        } else {
            entry.count += 1;
        }

        let remaining_ms = entry.ends_at.saturating_duration_since(now).as_millis() as u64;
        RateLimitDecision {
            ok: entry.count <= limit,
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_seconds: remaining_ms.div_ceil(1000),
        }
    }

    /// Drop windows that ended before `now`. Returns how many were removed.
    pub fn prune_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| now < w.ends_at);
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(removed, "Pruned expired rate limit windows");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_limit_two_third_call_rejected() {
        let counter = MemoryCounter::new();
        let t0 = Instant::now();

        let first = counter.check_at("org:a", 2, MINUTE, t0);
        let second = counter.check_at("org:a", 2, MINUTE, t0 + Duration::from_secs(1));
        let third = counter.check_at("org:a", 2, MINUTE, t0 + Duration::from_secs(2));

        assert!(first.ok && second.ok);
        assert_eq!(first.remaining, 1);
        assert_eq!(second.remaining, 0);
        assert!(!third.ok);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.reset_seconds, 58);
    }

    #[test]
    fn test_fresh_window_after_expiry() {
        let counter = MemoryCounter::new();
        let t0 = Instant::now();
        for i in 0..5 {
            counter.check_at("k", 2, MINUTE, t0 + Duration::from_millis(i));
        }
        let later = counter.check_at("k", 2, MINUTE, t0 + MINUTE);
        assert!(later.ok);
        assert_eq!(later.remaining, 1);
        assert_eq!(later.reset_seconds, 60);
    }

    #[test]
    fn test_keys_are_independent() {
        let counter = MemoryCounter::new();
        let t0 = Instant::now();
        assert!(counter.check_at("a", 1, MINUTE, t0).ok);
        assert!(!counter.check_at("a", 1, MINUTE, t0).ok);
        assert!(counter.check_at("b", 1, MINUTE, t0).ok);
    }

    #[test]
    fn test_reset_rounds_up() {
        let counter = MemoryCounter::new();
        let t0 = Instant::now();
        counter.check_at("k", 10, MINUTE, t0);
        let d = counter.check_at("k", 10, MINUTE, t0 + Duration::from_millis(59_001));
        assert_eq!(d.reset_seconds, 1);
    }

    #[test]
    fn test_huge_window_is_clamped() {
        let counter = MemoryCounter::new();
        let t0 = Instant::now();
        let d = counter.check_at("k", 10, Duration::from_secs(u64::MAX), t0);
        assert!(d.ok);
        assert_eq!(d.remaining, 9);
        assert_eq!(d.reset_seconds, MAX_WINDOW.as_secs());
        assert!(!counter.check_at("k", 1, Duration::from_secs(u64::MAX), t0).ok);
    }

    #[test]
    fn test_prune_expired() {
        let counter = MemoryCounter::new();
        let t0 = Instant::now();
        counter.check_at("short", 5, Duration::from_secs(1), t0);
        counter.check_at("long", 5, MINUTE, t0);
        assert_eq!(counter.prune_expired(t0 + Duration::from_secs(2)), 1);
        assert_eq!(counter.len(), 1);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let counter = std::sync::Arc::new(MemoryCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        counter.check("shared", 10_000, MINUTE);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let last = counter.check("shared", 10_000, MINUTE);
        assert_eq!(last.remaining, 10_000 - 801);
    }
}
