//! Expiring single-use tokens.
//!
//! One shared map holds CSRF tokens and pending confirmations, keyed by a
//! random token key. Writers publish a modified copy of the whole map with a
//! compare-and-swap and retry on contention, so consuming a token is atomic:
//! of any number of concurrent consumers, exactly one gets the token.
//!
//! Expiry is passive. Validation treats expired entries as absent; the
//! entries themselves are removed by a sweep that runs opportunistically on
//! the issue path.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Result;
use arc_swap::ArcSwap;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::{TryRngCore, rngs::OsRng};

/// Key length in bytes before encoding. 32 bytes of OS randomness; possession
/// of a key is the only proof of ownership.
const KEY_BYTES: usize = 32;

/// Minimum seconds between opportunistic sweeps.
const SWEEP_INTERVAL_SECS: i64 = 60 * 60;

/// Entry count that forces a sweep regardless of the interval.
const MAX_ENTRIES: usize = 10_000;

/// What a token authorizes. Each kind carries its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Form anti-forgery token; payload is the client identity.
    Csrf,
    /// Pending subscribe confirmation; payload is the email address.
    Subscribe,
    /// Pending unsubscribe confirmation; payload is the email address.
    Unsubscribe,
}

impl TokenKind {
    pub fn ttl(&self) -> Duration {
        match self {
            TokenKind::Csrf => Duration::hours(8),
            TokenKind::Subscribe | TokenKind::Unsubscribe => Duration::hours(24),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Csrf => "csrf",
            TokenKind::Subscribe => "subscribe",
            TokenKind::Unsubscribe => "unsubscribe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// A token is valid strictly before its expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct TokenStore {
    entries: ArcSwap<HashMap<String, Token>>,
    /// Unix seconds of the last sweep; elects one sweeping writer.
    last_sweep: AtomicI64,
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
            last_sweep: AtomicI64::new(Utc::now().timestamp()),
        }
    }

    /// Issue a new token and return its key.
    pub fn issue(&self, kind: TokenKind, payload: &str) -> Result<String> {
        self.issue_at(kind, payload, Utc::now())
    }

    pub fn issue_at(&self, kind: TokenKind, payload: &str, now: DateTime<Utc>) -> Result<String> {
        self.maybe_sweep(now);

        let token = Token {
            kind,
            payload: payload.to_string(),
            created_at: now,
            expires_at: now + kind.ttl(),
        };

        let mut key = generate_key()?;
        loop {
            let cur = self.entries.load_full();
            if cur.contains_key(&key) {
                // 256-bit collision; regenerate rather than clobber
                key = generate_key()?;
                continue;
            }
            let mut next = HashMap::clone(&cur);
            next.insert(key.clone(), token.clone());
            let prev = self.entries.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&*prev, &cur) {
                tracing::debug!(kind = %kind.as_str(), "token issued");
                return Ok(key);
            }
            // lost a write race; retry against the fresh map
        }
    }

    /// Look up a key. Returns `None` for unknown, expired, or kind-mismatched
    /// tokens, without mutating anything. With `consume` the entry is removed
    /// in the same compare-and-swap that validated it, so concurrent consumers
    /// of one key see at most one `Some`.
    pub fn validate(&self, key: &str, expected: Option<TokenKind>, consume: bool) -> Option<Token> {
        self.validate_at(key, expected, consume, Utc::now())
    }

    pub fn validate_at(
        &self,
        key: &str,
        expected: Option<TokenKind>,
        consume: bool,
        now: DateTime<Utc>,
    ) -> Option<Token> {
        loop {
            let cur = self.entries.load_full();
            let token = cur.get(key)?;
            if token.is_expired(now) {
                return None;
            }
            if expected.is_some_and(|kind| kind != token.kind) {
                return None;
            }
            if !consume {
                return Some(token.clone());
            }
            let mut next = HashMap::clone(&cur);
            let taken = next.remove(key)?;
            let prev = self.entries.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&*prev, &cur) {
                tracing::debug!(kind = %taken.kind.as_str(), "token consumed");
                return Some(taken);
            }
        }
    }

    /// Key of any unexpired token matching kind and payload.
    pub fn find_valid(&self, kind: TokenKind, payload: &str, now: DateTime<Utc>) -> Option<String> {
        self.entries
            .load()
            .iter()
            .find(|(_, token)| {
                token.kind == kind && token.payload == payload && !token.is_expired(now)
            })
            .map(|(key, _)| key.clone())
    }

    /// Number of unexpired entries.
    pub fn live_count(&self) -> usize {
        self.live_count_at(Utc::now())
    }

    pub fn live_count_at(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .load()
            .values()
            .filter(|token| !token.is_expired(now))
            .count()
    }

    /// Drop every expired entry in one swap. Returns how many were removed.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        loop {
            let cur = self.entries.load_full();
            let keep: HashMap<String, Token> = cur
                .iter()
                .filter(|(_, token)| !token.is_expired(now))
                .map(|(key, token)| (key.clone(), token.clone()))
                .collect();
            let removed = cur.len() - keep.len();
            if removed == 0 {
                return 0;
            }
            let prev = self.entries.compare_and_swap(&cur, Arc::new(keep));
            if Arc::ptr_eq(&*prev, &cur) {
                tracing::debug!(removed, "expired tokens swept");
                return removed;
            }
        }
    }

    /// Sweep when due. The compare-exchange on `last_sweep` elects a single
    /// sweeping caller; everyone else skips.
    fn maybe_sweep(&self, now: DateTime<Utc>) {
        let last = self.last_sweep.load(Ordering::Relaxed);
        let due = now.timestamp() - last >= SWEEP_INTERVAL_SECS
            || self.entries.load().len() > MAX_ENTRIES;
        if !due {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, now.timestamp(), Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.sweep_at(now);
        }
    }

    #[cfg(test)]
    fn raw_len(&self) -> usize {
        self.entries.load().len()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_key() -> Result<String> {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
