//! Server-rendered HTML pages.
//!
//! All markup is assembled with `format!` against a single layout; anything
//! user-controlled goes through [`escape_html`] first.

use crate::i18n::{self, Lang};
use crate::workflow::Action;

/// Served at `/robots.txt`. Confirmation links are single-use, so crawlers
/// following them would burn tokens before the recipient can.
pub const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /confirm\n";

/// Minimal HTML entity escaping for text and attribute positions.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(title: &str, body: &str, lang: Lang) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 40rem; margin: 3rem auto; padding: 0 1rem; line-height: 1.5; }}
label {{ display: block; margin-top: 1rem; }}
input, select, button {{ font: inherit; padding: 0.4rem; margin-top: 0.25rem; }}
button {{ margin-top: 1.5rem; cursor: pointer; }}
.hint {{ color: #555; font-size: 0.9rem; }}
.website-field {{ display: none; }}
</style>
</head>
<body>
{body}
</body>
</html>
"#,
        lang = lang.code(),
        title = escape_html(title),
        body = body,
    )
}

/// The signup form. The `website` field is a honeypot: hidden from people,
/// filled in by naive bots, and any non-empty value rejects the submission.
pub fn signup_page(csrf_token: &str, lang: Lang) -> String {
    let body = format!(
        r#"<h1>{heading}</h1>
<p class="hint">{hint}</p>
<form method="post" action="/subscribe">
<label>{email_label}
<input type="email" name="email" required maxlength="254" autocomplete="email">
</label>
<label>{action_label}
<select name="action">
<option value="subscribe">{subscribe}</option>
<option value="unsubscribe">{unsubscribe}</option>
</select>
</label>
<div class="website-field" aria-hidden="true">
<label>Website
<input type="text" name="website" tabindex="-1" autocomplete="off">
</label>
</div>
<input type="hidden" name="csrf_token" value="{csrf_token}">
<input type="hidden" name="lang" value="{lang}">
<button type="submit">{submit}</button>
</form>
"#,
        heading = escape_html(i18n::form_heading(lang)),
        hint = escape_html(i18n::form_hint(lang)),
        email_label = escape_html(i18n::email_label(lang)),
        action_label = escape_html(i18n::action_label(lang)),
        subscribe = escape_html(i18n::action_subscribe(lang)),
        unsubscribe = escape_html(i18n::action_unsubscribe(lang)),
        csrf_token = escape_html(csrf_token),
        lang = lang.code(),
        submit = escape_html(i18n::submit_label(lang)),
    );
    layout(i18n::page_title(lang), &body, lang)
}

fn message_page(text: &str, lang: Lang) -> String {
    let body = format!(
        r#"<h1>{title}</h1>
<p>{text}</p>
<p><a href="/?lang={lang}">{back}</a></p>
"#,
        title = escape_html(i18n::page_title(lang)),
        text = escape_html(text),
        lang = lang.code(),
        back = escape_html(i18n::back_link(lang)),
    );
    layout(i18n::page_title(lang), &body, lang)
}

pub fn already_subscribed_page(email: &str, lang: Lang) -> String {
    message_page(&i18n::already_subscribed(email, lang), lang)
}

pub fn not_subscribed_page(email: &str, lang: Lang) -> String {
    message_page(&i18n::not_subscribed(email, lang), lang)
}

pub fn confirmation_sent_page(action: Action, email: &str, lang: Lang) -> String {
    message_page(&i18n::confirmation_sent(action, email, lang), lang)
}

pub fn confirmation_failed_page(action: Action, email: &str, lang: Lang) -> String {
    message_page(&i18n::confirmation_failed(action, email, lang), lang)
}

pub fn confirmed_page(action: Action, email: &str, lang: Lang) -> String {
    message_page(&i18n::confirmed(action, email, lang), lang)
}

pub fn invalid_link_page(lang: Lang) -> String {
    message_page(i18n::invalid_link(lang), lang)
}
