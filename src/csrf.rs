//! CSRF tokens bound to client identity.
//!
//! The signup page embeds a token key in the form; a submission is accepted
//! only when that key validates as a csrf token belonging to the submitting
//! client. Verification never consumes: one token covers every form post for
//! its whole lifetime, and repeated page loads reuse the outstanding token
//! instead of minting a fresh one per visit.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::stores::{TokenKind, TokenStore};

#[derive(Clone)]
pub struct CsrfGuard {
    tokens: Arc<TokenStore>,
}

impl CsrfGuard {
    pub fn new(tokens: Arc<TokenStore>) -> Self {
        Self { tokens }
    }

    /// Key of the client's outstanding csrf token, issuing one if needed.
    pub fn get_or_issue(&self, client: &str) -> Result<String> {
        self.get_or_issue_at(client, Utc::now())
    }

    pub fn get_or_issue_at(&self, client: &str, now: DateTime<Utc>) -> Result<String> {
        if let Some(key) = self.tokens.find_valid(TokenKind::Csrf, client, now) {
            return Ok(key);
        }
        self.tokens.issue_at(TokenKind::Csrf, client, now)
    }

    /// True only if the key is a live csrf token issued to this client.
    pub fn verify(&self, key: &str, client: &str) -> bool {
        self.verify_at(key, client, Utc::now())
    }

    pub fn verify_at(&self, key: &str, client: &str, now: DateTime<Utc>) -> bool {
        self.tokens
            .validate_at(key, Some(TokenKind::Csrf), false, now)
            .is_some_and(|token| token.payload == client)
    }
}
