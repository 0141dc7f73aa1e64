//! Signup form submission and confirmation links.
//!
//! Guard order on `/subscribe` is fixed: CSRF, then rate limit, then
//! honeypot, then field validation, then dispatch. A request failing an
//! early guard is answered with that guard's status even when later guards
//! would also reject it, and every request that passes the CSRF check
//! counts toward the rate limit whether or not it is rejected later.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Form, Router, debug_handler};
use garde::Validate;
use serde::Deserialize;

use crate::error::AppError;
use crate::i18n::Lang;
use crate::middleware::client_ip::ClientIp;
use crate::state::AppState;
use crate::views;
use crate::workflow::{Action, ConfirmOutcome, StartOutcome};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/confirm", get(confirm))
}

/// Every field defaults so that missing ones reach the guard chain instead
/// of failing form deserialization with a framework error.
#[derive(Debug, Deserialize, Validate)]
struct SubscribeForm {
    #[serde(default)]
    #[garde(
        length(min = 3, max = 254),
        pattern(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$"),
        custom(no_repeated_specials)
    )]
    email: String,
    #[serde(default)]
    #[garde(skip)]
    action: String,
    #[serde(default)]
    #[garde(skip)]
    csrf_token: String,
    /// Honeypot. The form hides it; a non-empty value marks a bot.
    #[serde(default)]
    #[garde(skip)]
    website: String,
    #[serde(default)]
    #[garde(skip)]
    lang: Option<String>,
}

fn no_repeated_specials(value: &str, _context: &()) -> garde::Result {
    const SPECIALS: [char; 6] = ['.', '_', '%', '+', '-', '@'];
    let mut previous = None;
    for ch in value.chars() {
        if previous == Some(ch) && SPECIALS.contains(&ch) {
            return Err(garde::Error::new("repeated special characters"));
        }
        previous = Some(ch);
    }
    Ok(())
}

#[debug_handler]
async fn subscribe(
    ClientIp(client): ClientIp,
    State(state): State<AppState>,
    Form(form): Form<SubscribeForm>,
) -> Result<(StatusCode, Html<String>), AppError> {
    let lang = Lang::from_code(form.lang.as_deref());

    if !state.csrf.verify(&form.csrf_token, &client) {
        tracing::warn!(client = %client, "Rejected submission with a bad CSRF token");
        return Err(AppError::External(
            StatusCode::FORBIDDEN,
            "Invalid or expired form token",
        ));
    }

    if !state
        .stores
        .rate_limiter
        .check_and_record(&client)
        .is_allowed()
    {
        return Err(AppError::External(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Try again later.",
        ));
    }

    if !form.website.is_empty() {
        tracing::warn!(client = %client, "Honeypot field filled, dropping submission");
        return Err(AppError::External(StatusCode::BAD_REQUEST, "Invalid request"));
    }

    let action: Action = form.action.parse().map_err(AppError::Validation)?;
    form.validate()
        .map_err(|err| AppError::Validation(err.to_string()))?;

    let outcome = state.flow.start(action, &form.email, lang).await?;
    let (status, page) = match outcome {
        StartOutcome::AlreadySubscribed { email } => {
            (StatusCode::OK, views::already_subscribed_page(&email, lang))
        }
        StartOutcome::NotSubscribed { email } => {
            (StatusCode::OK, views::not_subscribed_page(&email, lang))
        }
        StartOutcome::ConfirmationSent { action, email } => (
            StatusCode::OK,
            views::confirmation_sent_page(action, &email, lang),
        ),
        StartOutcome::ConfirmationFailed { action, email } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            views::confirmation_failed_page(action, &email, lang),
        ),
    };
    Ok((status, Html(page)))
}

#[derive(Deserialize)]
struct ConfirmQuery {
    token: Option<String>,
    lang: Option<String>,
}

#[debug_handler]
async fn confirm(
    State(state): State<AppState>,
    Query(query): Query<ConfirmQuery>,
) -> Result<(StatusCode, Html<String>), AppError> {
    let lang = Lang::from_code(query.lang.as_deref());
    let Some(token) = query.token else {
        return Err(AppError::Validation("missing token parameter".to_string()));
    };

    let outcome = state.flow.confirm(&token).await?;
    let (status, page) = match outcome {
        ConfirmOutcome::Confirmed { action, email } => {
            (StatusCode::OK, views::confirmed_page(action, &email, lang))
        }
        ConfirmOutcome::InvalidToken => {
            (StatusCode::BAD_REQUEST, views::invalid_link_page(lang))
        }
        ConfirmOutcome::ConfirmationFailed { action, email } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            views::confirmation_failed_page(action, &email, lang),
        ),
    };
    Ok((status, Html(page)))
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;
    use crate::services::{MockEmailSender, MockListProvider};
    use crate::stores::{RateLimiter, TokenKind};
    use crate::test_utils::{TestStateBuilder, response_body};

    const CLIENT: &str = "203.0.113.7";

    fn form(email: &str, action: &str, csrf_token: &str) -> SubscribeForm {
        SubscribeForm {
            email: email.to_string(),
            action: action.to_string(),
            csrf_token: csrf_token.to_string(),
            website: String::new(),
            lang: None,
        }
    }

    mod subscribe {
        use super::*;

        #[tokio::test]
        async fn valid_submission_reports_confirmation_sent() {
            let mut list = MockListProvider::new();
            list.expect_is_member().returning(|_| Ok(false));
            let mut email = MockEmailSender::new();
            email.expect_send().times(1).returning(|_, _, _, _| Ok(()));
            let state = TestStateBuilder::new()
                .with_list_provider(list)
                .with_email_sender(email)
                .build();
            let csrf = state.csrf.get_or_issue(CLIENT).unwrap();

            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state.clone()),
                Form(form("jane@example.org", "subscribe", &csrf)),
            )
            .await;

            let response = result.unwrap().into_response();
            assert_eq!(response.status(), StatusCode::OK);
            let body = response_body(response).await;
            assert!(body.contains("jane@example.org"));
            // One csrf token plus one freshly issued subscribe token.
            assert_eq!(state.stores.tokens.live_count(), 2);
        }

        #[tokio::test]
        async fn existing_member_sees_already_subscribed() {
            let mut list = MockListProvider::new();
            list.expect_is_member().returning(|_| Ok(true));
            let state = TestStateBuilder::new().with_list_provider(list).build();
            let csrf = state.csrf.get_or_issue(CLIENT).unwrap();

            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state),
                Form(form("jane@example.org", "subscribe", &csrf)),
            )
            .await;

            let response = result.unwrap().into_response();
            assert_eq!(response.status(), StatusCode::OK);
            let body = response_body(response).await;
            assert!(body.contains("already subscribed"));
        }

        #[tokio::test]
        async fn missing_csrf_token_is_rejected() {
            let state = TestStateBuilder::new().build();

            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state),
                Form(form("jane@example.org", "subscribe", "bogus")),
            )
            .await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(
                err,
                AppError::External(StatusCode::FORBIDDEN, _)
            ));
        }

        #[tokio::test]
        async fn csrf_token_of_another_client_is_rejected() {
            let state = TestStateBuilder::new().build();
            let other = state.csrf.get_or_issue("10.0.0.1").unwrap();

            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state),
                Form(form("jane@example.org", "subscribe", &other)),
            )
            .await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(
                err,
                AppError::External(StatusCode::FORBIDDEN, _)
            ));
        }

        #[tokio::test]
        async fn exhausted_rate_limit_rejects_with_429() {
            let state = TestStateBuilder::new()
                .with_rate_limiter(RateLimiter::new(0, chrono::Duration::hours(1)))
                .build();
            let csrf = state.csrf.get_or_issue(CLIENT).unwrap();

            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state),
                Form(form("jane@example.org", "subscribe", &csrf)),
            )
            .await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(
                err,
                AppError::External(StatusCode::TOO_MANY_REQUESTS, _)
            ));
        }

        #[tokio::test]
        async fn csrf_failure_wins_over_rate_limiting() {
            let state = TestStateBuilder::new()
                .with_rate_limiter(RateLimiter::new(0, chrono::Duration::hours(1)))
                .build();

            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state),
                Form(form("jane@example.org", "subscribe", "bogus")),
            )
            .await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(
                err,
                AppError::External(StatusCode::FORBIDDEN, _)
            ));
        }

        #[tokio::test]
        async fn rejected_attempts_still_count_toward_the_limit() {
            let state = TestStateBuilder::new()
                .with_rate_limiter(RateLimiter::new(2, chrono::Duration::hours(1)))
                .build();
            let csrf = state.csrf.get_or_issue(CLIENT).unwrap();

            for _ in 0..2 {
                let mut spam = form("jane@example.org", "subscribe", &csrf);
                spam.website = "https://spam.example".to_string();
                let result = subscribe(
                    ClientIp(CLIENT.to_string()),
                    State(state.clone()),
                    Form(spam),
                )
                .await;
                let Err(err) = result else {
                    panic!("Expected error, got Ok");
                };
                assert!(matches!(err, AppError::External(StatusCode::BAD_REQUEST, _)));
            }

            // The budget is spent even though both attempts were rejected.
            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state),
                Form(form("jane@example.org", "subscribe", &csrf)),
            )
            .await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(
                err,
                AppError::External(StatusCode::TOO_MANY_REQUESTS, _)
            ));
        }

        #[tokio::test]
        async fn csrf_rejections_are_not_recorded() {
            let state = TestStateBuilder::new().build();

            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state.clone()),
                Form(form("jane@example.org", "subscribe", "bogus")),
            )
            .await;

            assert!(result.is_err());
            assert_eq!(state.stores.rate_limiter.tracked_clients(), 0);
        }

        #[tokio::test]
        async fn filled_honeypot_is_rejected_before_any_lookup() {
            let state = TestStateBuilder::new().build();
            let csrf = state.csrf.get_or_issue(CLIENT).unwrap();
            let mut spam = form("jane@example.org", "subscribe", &csrf);
            spam.website = "https://spam.example".to_string();

            let result = subscribe(ClientIp(CLIENT.to_string()), State(state), Form(spam)).await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(err, AppError::External(StatusCode::BAD_REQUEST, _)));
        }

        #[tokio::test]
        async fn unknown_action_is_rejected() {
            let state = TestStateBuilder::new().build();
            let csrf = state.csrf.get_or_issue(CLIENT).unwrap();

            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state),
                Form(form("jane@example.org", "destroy", &csrf)),
            )
            .await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(err, AppError::Validation(_)));
        }

        #[tokio::test]
        async fn malformed_email_is_rejected() {
            let state = TestStateBuilder::new().build();
            let csrf = state.csrf.get_or_issue(CLIENT).unwrap();

            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state),
                Form(form("not-an-email", "subscribe", &csrf)),
            )
            .await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(err, AppError::Validation(_)));
        }

        #[tokio::test]
        async fn repeated_special_characters_are_rejected() {
            let state = TestStateBuilder::new().build();
            let csrf = state.csrf.get_or_issue(CLIENT).unwrap();

            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state),
                Form(form("jane..doe@example.org", "subscribe", &csrf)),
            )
            .await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(err, AppError::Validation(_)));
        }

        #[tokio::test]
        async fn overlong_email_is_rejected() {
            let state = TestStateBuilder::new().build();
            let csrf = state.csrf.get_or_issue(CLIENT).unwrap();
            let email = format!("{}@example.org", "a".repeat(250));

            let result = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state),
                Form(form(&email, "subscribe", &csrf)),
            )
            .await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    // Missing fields must decode to defaults so the guard chain answers,
    // not the form extractor.
    mod form_decoding {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::{Request, header};

        use super::*;

        fn form_request(body: &'static str) -> Request<Body> {
            Request::builder()
                .method("POST")
                .uri("/subscribe")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap()
        }

        #[tokio::test]
        async fn empty_body_decodes_to_defaults() {
            let request = form_request("");

            let Form(form) = Form::<SubscribeForm>::from_request(request, &())
                .await
                .unwrap();

            assert_eq!(form.email, "");
            assert_eq!(form.action, "");
            assert_eq!(form.csrf_token, "");
            assert_eq!(form.website, "");
            assert_eq!(form.lang, None);
        }

        #[tokio::test]
        async fn email_only_body_is_stopped_by_the_csrf_guard() {
            let state = TestStateBuilder::new().build();
            let request = form_request("email=jane%40example.org");

            let Form(form) = Form::<SubscribeForm>::from_request(request, &())
                .await
                .unwrap();
            assert_eq!(form.email, "jane@example.org");

            let result = subscribe(ClientIp(CLIENT.to_string()), State(state), Form(form)).await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(
                err,
                AppError::External(StatusCode::FORBIDDEN, _)
            ));
        }
    }

    mod confirm {
        use super::*;

        #[tokio::test]
        async fn valid_link_confirms_once_and_replay_fails() {
            let mut list = MockListProvider::new();
            list.expect_add_member().times(1).returning(|_| Ok(()));
            let state = TestStateBuilder::new().with_list_provider(list).build();
            let key = state
                .stores
                .tokens
                .issue(TokenKind::Subscribe, "jane@example.org")
                .unwrap();

            let result = confirm(
                State(state.clone()),
                Query(ConfirmQuery {
                    token: Some(key.clone()),
                    lang: None,
                }),
            )
            .await;
            let response = result.unwrap().into_response();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response_body(response).await.contains("jane@example.org"));

            let replay = confirm(
                State(state),
                Query(ConfirmQuery {
                    token: Some(key),
                    lang: None,
                }),
            )
            .await;
            let response = replay.unwrap().into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        #[tokio::test]
        async fn unsubscribe_link_removes_the_member() {
            let mut list = MockListProvider::new();
            list.expect_remove_member().times(1).returning(|_| Ok(true));
            let state = TestStateBuilder::new().with_list_provider(list).build();
            let key = state
                .stores
                .tokens
                .issue(TokenKind::Unsubscribe, "jane@example.org")
                .unwrap();

            let result = confirm(
                State(state),
                Query(ConfirmQuery {
                    token: Some(key),
                    lang: None,
                }),
            )
            .await;

            let response = result.unwrap().into_response();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response_body(response).await.contains("jane@example.org"));
        }

        #[tokio::test]
        async fn missing_token_parameter_is_rejected() {
            let state = TestStateBuilder::new().build();

            let result = confirm(
                State(state),
                Query(ConfirmQuery {
                    token: None,
                    lang: None,
                }),
            )
            .await;

            let Err(err) = result else {
                panic!("Expected error, got Ok");
            };
            assert!(matches!(err, AppError::Validation(_)));
        }

        #[tokio::test]
        async fn unknown_token_renders_the_invalid_link_page() {
            let state = TestStateBuilder::new().build();

            let result = confirm(
                State(state),
                Query(ConfirmQuery {
                    token: Some("junk".to_string()),
                    lang: None,
                }),
            )
            .await;

            let response = result.unwrap().into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = response_body(response).await;
            assert!(body.contains("invalid, expired, or was already used"));
        }

        #[tokio::test]
        async fn provider_failure_returns_500_and_the_link_survives() {
            let mut list = MockListProvider::new();
            list.expect_add_member()
                .times(1)
                .returning(|_| Err(anyhow::anyhow!("mailgun 502")));
            list.expect_add_member().times(1).returning(|_| Ok(()));
            let state = TestStateBuilder::new().with_list_provider(list).build();
            let key = state
                .stores
                .tokens
                .issue(TokenKind::Subscribe, "jane@example.org")
                .unwrap();

            let first = confirm(
                State(state.clone()),
                Query(ConfirmQuery {
                    token: Some(key.clone()),
                    lang: None,
                }),
            )
            .await;
            let response = first.unwrap().into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

            let second = confirm(
                State(state),
                Query(ConfirmQuery {
                    token: Some(key),
                    lang: None,
                }),
            )
            .await;
            let response = second.unwrap().into_response();
            assert_eq!(response.status(), StatusCode::OK);
        }

        #[tokio::test]
        async fn german_link_renders_a_german_page() {
            let state = TestStateBuilder::new().build();

            let result = confirm(
                State(state),
                Query(ConfirmQuery {
                    token: Some("junk".to_string()),
                    lang: Some("de".to_string()),
                }),
            )
            .await;

            let body = response_body(result.unwrap().into_response()).await;
            assert!(body.contains("Dieser Bestätigungslink"));
        }
    }

    mod round_trip {
        use std::sync::{Arc, Mutex};

        use super::*;

        #[tokio::test]
        async fn subscribe_mail_link_confirms_once_then_replays_fail() {
            let mut list = MockListProvider::new();
            list.expect_is_member().returning(|_| Ok(false));
            list.expect_add_member().times(1).returning(|_| Ok(()));
            let mut email = MockEmailSender::new();
            let mail_text = Arc::new(Mutex::new(String::new()));
            let captured = Arc::clone(&mail_text);
            email.expect_send().times(1).returning(move |_, _, text, _| {
                *captured.lock().unwrap() = text.to_string();
                Ok(())
            });
            let state = TestStateBuilder::new()
                .with_list_provider(list)
                .with_email_sender(email)
                .build();
            let csrf = state.csrf.get_or_issue(CLIENT).unwrap();

            let submit = subscribe(
                ClientIp(CLIENT.to_string()),
                State(state.clone()),
                Form(form("jane@example.org", "subscribe", &csrf)),
            )
            .await;
            assert_eq!(submit.unwrap().into_response().status(), StatusCode::OK);

            let text = mail_text.lock().unwrap().clone();
            let token = text
                .split("token=")
                .nth(1)
                .and_then(|rest| rest.split('&').next())
                .unwrap()
                .to_string();

            let confirmed = confirm(
                State(state.clone()),
                Query(ConfirmQuery {
                    token: Some(token.clone()),
                    lang: None,
                }),
            )
            .await;
            let response = confirmed.unwrap().into_response();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response_body(response).await.contains("now subscribed"));

            let replay = confirm(
                State(state),
                Query(ConfirmQuery {
                    token: Some(token),
                    lang: None,
                }),
            )
            .await;
            assert_eq!(
                replay.unwrap().into_response().status(),
                StatusCode::BAD_REQUEST
            );
        }
    }
}
