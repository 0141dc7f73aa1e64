//! Sliding-window rate limiting keyed by client identity.
//!
//! Each client maps to the timestamps of its recent requests. A request is
//! allowed when fewer than the threshold fall inside the rolling window.
//! The current request is recorded in the same swap that checks the count,
//! whether or not it passes: hammering a limited endpoint keeps the window
//! full and extends the lockout.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use arc_swap::ArcSwap;
use chrono::{DateTime, Duration, Utc};

/// Requests allowed per client per window.
pub const MAX_REQUESTS: usize = 10;

/// Window length: one hour.
const WINDOW_SECS: i64 = 60 * 60;

/// Tracked-client count that forces a prune regardless of the interval.
const MAX_TRACKED_CLIENTS: usize = 1000;

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Under the limit; carries the in-window count including this request.
    Allowed(usize),
    /// Over the limit; carries the in-window count including this request.
    Exceeded(usize),
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }
}

pub struct RateLimiter {
    limit: usize,
    window: Duration,
    clients: ArcSwap<HashMap<String, Vec<DateTime<Utc>>>>,
    /// Unix seconds of the last prune; elects one pruning writer.
    last_prune: AtomicI64,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            clients: ArcSwap::from_pointee(HashMap::new()),
            last_prune: AtomicI64::new(Utc::now().timestamp()),
        }
    }

    /// Check the client against the window and record the request. The
    /// timestamp is recorded even when the check fails.
    pub fn check_and_record(&self, client: &str) -> RateLimitResult {
        self.check_and_record_at(client, Utc::now())
    }

    pub fn check_and_record_at(&self, client: &str, now: DateTime<Utc>) -> RateLimitResult {
        self.maybe_prune(now);

        let window_start = now - self.window;
        loop {
            let cur = self.clients.load_full();
            let recent = cur.get(client).map_or(0, |stamps| {
                stamps.iter().filter(|stamp| **stamp > window_start).count()
            });

            let mut next = HashMap::clone(&cur);
            next.entry(client.to_string()).or_default().push(now);

            let prev = self.clients.compare_and_swap(&cur, Arc::new(next));
            if !Arc::ptr_eq(&*prev, &cur) {
                // lost a write race; retry against the fresh map
                continue;
            }

            if recent >= self.limit {
                tracing::warn!(client = %client, count = recent + 1, "rate limit exceeded");
                return RateLimitResult::Exceeded(recent + 1);
            }
            return RateLimitResult::Allowed(recent + 1);
        }
    }

    /// Drop out-of-window timestamps and clients with none left.
    pub fn prune_at(&self, now: DateTime<Utc>) {
        let window_start = now - self.window;
        loop {
            let cur = self.clients.load_full();
            let next: HashMap<String, Vec<DateTime<Utc>>> = cur
                .iter()
                .filter_map(|(client, stamps)| {
                    let recent: Vec<DateTime<Utc>> = stamps
                        .iter()
                        .copied()
                        .filter(|stamp| *stamp > window_start)
                        .collect();
                    if recent.is_empty() {
                        None
                    } else {
                        Some((client.clone(), recent))
                    }
                })
                .collect();

            let had: usize = cur.values().map(Vec::len).sum();
            let kept: usize = next.values().map(Vec::len).sum();
            if had == kept && cur.len() == next.len() {
                return;
            }

            let prev = self.clients.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&*prev, &cur) {
                tracing::debug!(dropped = had - kept, "rate limit history pruned");
                return;
            }
        }
    }

    /// Prune when due. The compare-exchange on `last_prune` elects a single
    /// pruning caller; everyone else skips.
    fn maybe_prune(&self, now: DateTime<Utc>) {
        let last = self.last_prune.load(Ordering::Relaxed);
        let due = now.timestamp() - last >= self.window.num_seconds()
            || self.clients.load().len() > MAX_TRACKED_CLIENTS;
        if !due {
            return;
        }
        if self
            .last_prune
            .compare_exchange(last, now.timestamp(), Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.prune_at(now);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_clients(&self) -> usize {
        self.clients.load().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(MAX_REQUESTS, Duration::seconds(WINDOW_SECS))
    }
}
