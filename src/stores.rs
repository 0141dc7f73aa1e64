//! In-memory ephemeral state.
//!
//! Everything the service remembers lives here: outstanding tokens and
//! per-client request timestamps. Both stores keep their data in a plain
//! `HashMap` behind an [`arc_swap::ArcSwap`] and mutate it by atomic
//! whole-map replacement: clone the current map, modify the clone, publish
//! it with a compare-and-swap, retry when another writer won the race.
//! Readers never block and always see a consistent snapshot.
//!
//! Nothing is persisted. A restart forgets pending confirmations and rate
//! limit history, which is acceptable for this service.
//!
//! ## Stores
//!
//! - **tokens** - Expiring single-use tokens (CSRF 8h, confirmations 24h)
//! - **rate_limit** - Sliding-window request timestamps per client (10/hour)
//!
//! ## Usage in Handlers
//!
//! Stores are accessed via `state.stores`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let key = state.stores.tokens.issue(TokenKind::Subscribe, email)?;
//!     let result = state.stores.rate_limiter.check_and_record(&client);
//! }
//! ```

mod rate_limit;
mod tokens;

pub use rate_limit::RateLimiter;
pub use tokens::{Token, TokenKind, TokenStore};

use std::sync::Arc;

/// Collection of the shared in-memory stores.
#[derive(Clone)]
pub struct Stores {
    pub tokens: Arc<TokenStore>,
    pub rate_limiter: Arc<RateLimiter>,
}
