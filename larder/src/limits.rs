//! Fixed-window rate limiting for the recipe and login paths.
//!
//! Two limiter flavors share the same window semantics:
//!
//! - [`MemoryRateLimiter`]: counters in a concurrent map, per process. Used for
//!   general recipe-generation throttling where losing counters on restart is
//!   acceptable.
//! - [`KvRateLimiter`]: counters persisted through the [`KvStore`] with a TTL
//!   equal to the remaining window. Used for login-link throttling, which must
//!   survive process restarts to remain an effective abuse control.
//!
//! The read-check-increment on a counter is a critical section per identifier:
//! the memory limiter runs it under the map's entry lock, the kv limiter under
//! a per-identifier mutex.

use axum::http::{HeaderMap, HeaderName};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::WindowConfig;
use crate::kv::{self, keys, KvError, KvStore};

/// Sentinel identifier for clients whose address cannot be derived. All such
/// clients share one bucket - a deliberate, documented weak point.
pub const UNKNOWN_CLIENT: &str = "unknown";

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Outcome of a rate-limit check, also the source of the feedback headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    pub fn headers(&self) -> [(HeaderName, String); 3] {
        [
            (LIMIT_HEADER, self.limit.to_string()),
            (REMAINING_HEADER, self.remaining.to_string()),
            (RESET_HEADER, self.reset_at.to_rfc3339()),
        ]
    }

    /// Seconds until the window resets, floored at zero. Retry-After hint.
    pub fn retry_after_secs(&self) -> i64 {
        (self.reset_at - Utc::now()).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CounterRecord {
    count: u32,
    reset_at: DateTime<Utc>,
}

fn window_duration(window: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(window.as_millis() as i64)
}

/// Applies the fixed-window state transition to an optional stored counter.
///
/// Returns the decision plus the counter to store back (`None` when the counter
/// is saturated and must be left unchanged).
fn advance_window(
    existing: Option<CounterRecord>,
    limit: u32,
    window: Duration,
    now: DateTime<Utc>,
) -> (RateLimitDecision, Option<CounterRecord>) {
    match existing {
        // New identifier or expired window: start fresh at count=1
        None => {
            let counter = CounterRecord {
                count: 1,
                reset_at: now + window_duration(window),
            };
            (
                RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining: limit.saturating_sub(1),
                    reset_at: counter.reset_at,
                },
                Some(counter),
            )
        }
        Some(counter) if counter.reset_at < now => advance_window(None, limit, window, now),
        // Saturated: deny without incrementing past the limit
        Some(counter) if counter.count >= limit => (
            RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at: counter.reset_at,
            },
            None,
        ),
        Some(mut counter) => {
            counter.count += 1;
            (
                RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining: limit.saturating_sub(counter.count),
                    reset_at: counter.reset_at,
                },
                Some(counter),
            )
        }
    }
}

/// In-memory fixed-window limiter. Counters do not survive process restarts.
#[derive(Debug)]
pub struct MemoryRateLimiter {
    limit: u32,
    window: Duration,
    counters: DashMap<String, CounterRecord>,
}

impl MemoryRateLimiter {
    pub fn new(config: &WindowConfig) -> Self {
        Self {
            limit: config.limit,
            window: config.window,
            counters: DashMap::new(),
        }
    }

    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        let now = Utc::now();

        // The entry guard holds the shard lock, making read-check-increment
        // atomic per identifier.
        match self.counters.entry(identifier.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let (decision, updated) = advance_window(Some(occupied.get().clone()), self.limit, self.window, now);
                if let Some(counter) = updated {
                    *occupied.get_mut() = counter;
                }
                decision
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let (decision, updated) = advance_window(None, self.limit, self.window, now);
                if let Some(counter) = updated {
                    vacant.insert(counter);
                }
                decision
            }
        }
    }

    /// Evict counters whose window has passed. Optional housekeeping; expired
    /// counters self-correct on next access.
    pub fn sweep(&self) {
        let now = Utc::now();
        self.counters.retain(|_, counter| counter.reset_at >= now);
    }
}

/// Durable fixed-window limiter layered on the key-value store.
///
/// Counters are stored at `["rate_limit", purpose, identifier]` with a TTL equal
/// to the remaining window so expired entries are reclaimed automatically.
pub struct KvRateLimiter {
    purpose: String,
    limit: u32,
    window: Duration,
    kv: Arc<dyn KvStore>,
    // Serializes the read-modify-write per identifier within this process.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KvRateLimiter {
    pub fn new(purpose: impl Into<String>, config: &WindowConfig, kv: Arc<dyn KvStore>) -> Self {
        Self {
            purpose: purpose.into(),
            limit: config.limit,
            window: config.window,
            kv,
            locks: DashMap::new(),
        }
    }

    pub async fn check(&self, identifier: &str) -> Result<RateLimitDecision, KvError> {
        let lock = self
            .locks
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let key = [keys::RATE_LIMIT, self.purpose.as_str(), identifier];
        let now = Utc::now();

        let existing: Option<CounterRecord> = kv::get_typed(self.kv.as_ref(), &key).await?;
        let (decision, updated) = advance_window(existing, self.limit, self.window, now);

        if let Some(counter) = updated {
            let remaining = (counter.reset_at - now).to_std().unwrap_or(Duration::ZERO);
            kv::set_typed(self.kv.as_ref(), &key, &counter, Some(remaining)).await?;
        }

        Ok(decision)
    }

    /// Drop per-identifier locks no in-flight check is holding, so the lock
    /// map stays bounded by concurrency rather than growing with every
    /// identifier ever seen. Optional housekeeping, like
    /// [`MemoryRateLimiter::sweep`].
    pub fn sweep(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// Derives the rate-limiting identifier for a client.
///
/// Prefers the first entry of `x-forwarded-for`, then `x-real-ip`, then the
/// shared [`UNKNOWN_CLIENT`] sentinel.
pub fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    UNKNOWN_CLIENT.to_string()
}
