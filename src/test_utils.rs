//! Shared helpers for handler tests.

use std::sync::Arc;

use axum::response::Response;
use http_body_util::BodyExt;

use crate::csrf::CsrfGuard;
use crate::services::{EmailSender, ListProvider, MockEmailSender, MockListProvider};
use crate::state::AppState;
use crate::stores::{RateLimiter, Stores, TokenStore};
use crate::workflow::ConfirmationFlow;

pub const TEST_PUBLIC_URL: &str = "https://news.example.org";

/// Builds an [`AppState`] with real stores and mocked collaborators.
///
/// Mocks without expectations panic when called, so tests only configure
/// the collaborators they expect to be reached.
pub struct TestStateBuilder {
    list_provider: MockListProvider,
    email_sender: MockEmailSender,
    rate_limiter: Option<RateLimiter>,
}

impl TestStateBuilder {
    pub fn new() -> Self {
        Self {
            list_provider: MockListProvider::new(),
            email_sender: MockEmailSender::new(),
            rate_limiter: None,
        }
    }

    pub fn with_list_provider(mut self, list_provider: MockListProvider) -> Self {
        self.list_provider = list_provider;
        self
    }

    pub fn with_email_sender(mut self, email_sender: MockEmailSender) -> Self {
        self.email_sender = email_sender;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn build(self) -> AppState {
        let tokens = Arc::new(TokenStore::default());
        let stores = Stores {
            tokens: Arc::clone(&tokens),
            rate_limiter: Arc::new(self.rate_limiter.unwrap_or_default()),
        };
        let list: Arc<dyn ListProvider> = Arc::new(self.list_provider);
        let email: Arc<dyn EmailSender> = Arc::new(self.email_sender);
        let flow = ConfirmationFlow::new(
            Arc::clone(&tokens),
            list,
            email,
            TEST_PUBLIC_URL.to_string(),
        );

        AppState {
            csrf: CsrfGuard::new(tokens),
            stores,
            flow: Arc::new(flow),
        }
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects a response body into a string.
pub async fn response_body(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read response body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("response body is not valid utf-8")
}
