//! The public signup page and crawler policy.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Router, debug_handler};
use serde::Deserialize;

use crate::error::AppError;
use crate::i18n::Lang;
use crate::middleware::client_ip::ClientIp;
use crate::state::AppState;
use crate::views;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(signup_page))
        .route("/robots.txt", get(robots_txt))
}

#[derive(Deserialize)]
struct PageQuery {
    lang: Option<String>,
}

/// Renders the signup form with a CSRF token bound to the caller. Repeated
/// loads from the same client reuse the token instead of minting a new one.
#[debug_handler]
async fn signup_page(
    ClientIp(client): ClientIp,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let lang = Lang::from_code(query.lang.as_deref());
    let csrf_token = state.csrf.get_or_issue(&client)?;

    Ok(Html(views::signup_page(&csrf_token, lang)))
}

/// Confirmation links are single-use, so well-behaved crawlers must not
/// follow them.
async fn robots_txt() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], views::ROBOTS_TXT)
}
