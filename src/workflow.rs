//! The double-opt-in confirmation flow.
//!
//! Flow:
//! 1. A visitor submits the signup form with an email address and an action.
//! 2. Membership is checked first; requests that would be no-ops
//!    short-circuit without issuing a token or sending mail.
//! 3. A single-use confirmation token is issued and mailed as a link.
//! 4. The recipient opens the link; the token is validated without being
//!    consumed.
//! 5. The membership change is pushed to the list provider.
//! 6. Only after the provider succeeds is the token consumed.
//!
//! Security notes:
//! - Consuming after the provider call means a failed provider call leaves
//!   the link valid, so the recipient can simply click it again.
//! - Consumption is a compare-and-swap: of any number of concurrent confirms
//!   for the same token, exactly one wins.
//! - CSRF tokens live in the same store but are rejected here by kind.

use std::sync::Arc;

use anyhow::Result;

use crate::i18n::{self, Lang};
use crate::services::{EmailSender, ListProvider};
use crate::stores::{Token, TokenKind, TokenStore};

/// What the visitor asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Subscribe,
    Unsubscribe,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Subscribe => "subscribe",
            Action::Unsubscribe => "unsubscribe",
        }
    }

    pub fn token_kind(&self) -> TokenKind {
        match self {
            Action::Subscribe => TokenKind::Subscribe,
            Action::Unsubscribe => TokenKind::Unsubscribe,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscribe" => Ok(Action::Subscribe),
            "unsubscribe" => Ok(Action::Unsubscribe),
            other => Err(format!("unknown action: {other:?}")),
        }
    }
}

/// Result of a signup form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadySubscribed { email: String },
    NotSubscribed { email: String },
    ConfirmationSent { action: Action, email: String },
    ConfirmationFailed { action: Action, email: String },
}

/// Result of opening a confirmation link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed { action: Action, email: String },
    InvalidToken,
    ConfirmationFailed { action: Action, email: String },
}

pub struct ConfirmationFlow {
    tokens: Arc<TokenStore>,
    list: Arc<dyn ListProvider>,
    email: Arc<dyn EmailSender>,
    public_url: String,
}

impl ConfirmationFlow {
    pub fn new(
        tokens: Arc<TokenStore>,
        list: Arc<dyn ListProvider>,
        email: Arc<dyn EmailSender>,
        public_url: String,
    ) -> Self {
        Self {
            tokens,
            list,
            email,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Handles a validated form submission: checks membership, issues a
    /// token, and mails the confirmation link.
    pub async fn start(&self, action: Action, email: &str, lang: Lang) -> Result<StartOutcome> {
        let is_member = match self.list.is_member(email).await {
            Ok(is_member) => is_member,
            Err(err) => {
                tracing::warn!(%action, email = %email, error = %err, "Membership lookup failed");
                return Ok(StartOutcome::ConfirmationFailed {
                    action,
                    email: email.to_string(),
                });
            }
        };

        match (action, is_member) {
            (Action::Subscribe, true) => {
                return Ok(StartOutcome::AlreadySubscribed {
                    email: email.to_string(),
                });
            }
            (Action::Unsubscribe, false) => {
                return Ok(StartOutcome::NotSubscribed {
                    email: email.to_string(),
                });
            }
            _ => {}
        }

        let key = self.tokens.issue(action.token_kind(), email)?;
        let link = format!(
            "{}/confirm?token={}&lang={}",
            self.public_url,
            key,
            lang.code()
        );
        let mail = i18n::confirmation_mail(action, &link, lang);

        if let Err(err) = self
            .email
            .send(email, &mail.subject, &mail.text, &mail.html)
            .await
        {
            // The token stays behind and expires on its own.
            tracing::warn!(%action, email = %email, error = %err, "Confirmation email failed");
            return Ok(StartOutcome::ConfirmationFailed {
                action,
                email: email.to_string(),
            });
        }

        tracing::info!(%action, email = %email, "Confirmation email sent");
        Ok(StartOutcome::ConfirmationSent {
            action,
            email: email.to_string(),
        })
    }

    /// Handles a confirmation link: validates the token, applies the
    /// membership change, and consumes the token last.
    pub async fn confirm(&self, key: &str) -> Result<ConfirmOutcome> {
        // Peek only. The token must survive a failed provider call.
        let Some(token) = self.tokens.validate(key, None, false) else {
            return Ok(ConfirmOutcome::InvalidToken);
        };
        let Token {
            kind,
            payload: email,
            created_at,
            ..
        } = token;

        let action = match kind {
            TokenKind::Subscribe => Action::Subscribe,
            TokenKind::Unsubscribe => Action::Unsubscribe,
            TokenKind::Csrf => return Ok(ConfirmOutcome::InvalidToken),
        };

        let applied = match action {
            Action::Subscribe => self.list.add_member(&email).await,
            Action::Unsubscribe => self.list.remove_member(&email).await.map(|_| ()),
        };
        if let Err(err) = applied {
            tracing::warn!(%action, email = %email, error = %err, "List update failed, token stays valid");
            return Ok(ConfirmOutcome::ConfirmationFailed { action, email });
        }

        // Consume last. Exactly one of any concurrent confirms gets the
        // token; the others see it gone.
        if self.tokens.validate(key, Some(kind), true).is_none() {
            return Ok(ConfirmOutcome::InvalidToken);
        }

        tracing::info!(%action, email = %email, requested_at = %created_at, "Confirmation completed");
        Ok(ConfirmOutcome::Confirmed { action, email })
    }
}
