//! Localized user-facing strings, English and German.
//!
//! Deliberately not a translation framework: two languages, a handful of
//! pages and one email. Every string lives in a match below.

use crate::views::escape_html;
use crate::workflow::Action;

/// Page and mail language, selected per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    En,
    De,
}

impl Lang {
    /// The code used in URLs and form fields.
    pub fn code(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::De => "de",
        }
    }

    /// Tolerant parse: anything but a known code falls back to English.
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some("de") => Lang::De,
            _ => Lang::En,
        }
    }
}

/// Subject and both bodies of a confirmation message.
pub struct ConfirmationMail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn confirmation_mail(action: Action, link: &str, lang: Lang) -> ConfirmationMail {
    let subject = match (lang, action) {
        (Lang::En, Action::Subscribe) => "Please confirm your subscription",
        (Lang::En, Action::Unsubscribe) => "Please confirm your unsubscription",
        (Lang::De, Action::Subscribe) => "Bitte bestätigen Sie Ihre Anmeldung",
        (Lang::De, Action::Unsubscribe) => "Bitte bestätigen Sie Ihre Abmeldung",
    };
    let intro = match (lang, action) {
        (Lang::En, Action::Subscribe) => {
            "Someone, hopefully you, asked to subscribe this address to our mailing list."
        }
        (Lang::En, Action::Unsubscribe) => {
            "Someone, hopefully you, asked to remove this address from our mailing list."
        }
        (Lang::De, Action::Subscribe) => {
            "Jemand, hoffentlich Sie selbst, möchte diese Adresse in unsere Mailingliste eintragen."
        }
        (Lang::De, Action::Unsubscribe) => {
            "Jemand, hoffentlich Sie selbst, möchte diese Adresse aus unserer Mailingliste austragen."
        }
    };
    let instruction = match lang {
        Lang::En => "To confirm, open this link (valid for 24 hours):",
        Lang::De => "Zur Bestätigung öffnen Sie bitte diesen Link (24 Stunden gültig):",
    };
    let ignore = match lang {
        Lang::En => "If you did not request this, you can ignore this message.",
        Lang::De => {
            "Wenn Sie das nicht angefordert haben, können Sie diese Nachricht ignorieren."
        }
    };

    let text = format!("{intro}\n\n{instruction}\n{link}\n\n{ignore}\n");
    let html = format!(
        "<p>{intro}</p><p>{instruction}<br><a href=\"{href}\">{href}</a></p><p>{ignore}</p>",
        href = escape_html(link),
    );

    ConfirmationMail {
        subject: subject.to_string(),
        text,
        html,
    }
}

pub fn page_title(lang: Lang) -> &'static str {
    match lang {
        Lang::En => "Mailing list",
        Lang::De => "Mailingliste",
    }
}

pub fn form_heading(lang: Lang) -> &'static str {
    match lang {
        Lang::En => "Subscribe to our mailing list",
        Lang::De => "Anmeldung zur Mailingliste",
    }
}

pub fn form_hint(lang: Lang) -> &'static str {
    match lang {
        Lang::En => "We will send you an email with a confirmation link.",
        Lang::De => "Wir senden Ihnen eine E-Mail mit einem Bestätigungslink.",
    }
}

pub fn email_label(lang: Lang) -> &'static str {
    match lang {
        Lang::En => "Email address",
        Lang::De => "E-Mail-Adresse",
    }
}

pub fn action_label(lang: Lang) -> &'static str {
    match lang {
        Lang::En => "Action",
        Lang::De => "Aktion",
    }
}

pub fn action_subscribe(lang: Lang) -> &'static str {
    match lang {
        Lang::En => "Subscribe",
        Lang::De => "Anmelden",
    }
}

pub fn action_unsubscribe(lang: Lang) -> &'static str {
    match lang {
        Lang::En => "Unsubscribe",
        Lang::De => "Abmelden",
    }
}

pub fn submit_label(lang: Lang) -> &'static str {
    match lang {
        Lang::En => "Send confirmation link",
        Lang::De => "Bestätigungslink senden",
    }
}

pub fn back_link(lang: Lang) -> &'static str {
    match lang {
        Lang::En => "Back to the signup form",
        Lang::De => "Zurück zum Formular",
    }
}

pub fn already_subscribed(email: &str, lang: Lang) -> String {
    match lang {
        Lang::En => format!("{email} is already subscribed to the list."),
        Lang::De => format!("{email} ist bereits in die Liste eingetragen."),
    }
}

pub fn not_subscribed(email: &str, lang: Lang) -> String {
    match lang {
        Lang::En => format!("{email} is not subscribed to the list."),
        Lang::De => format!("{email} ist nicht in die Liste eingetragen."),
    }
}

pub fn confirmation_sent(action: Action, email: &str, lang: Lang) -> String {
    match (lang, action) {
        (Lang::En, Action::Subscribe) => format!(
            "Almost there. We sent a confirmation link to {email}. Open it to complete your subscription."
        ),
        (Lang::En, Action::Unsubscribe) => format!(
            "We sent a confirmation link to {email}. Open it to complete your unsubscription."
        ),
        (Lang::De, Action::Subscribe) => format!(
            "Fast geschafft. Wir haben einen Bestätigungslink an {email} geschickt. Öffnen Sie ihn, um die Anmeldung abzuschließen."
        ),
        (Lang::De, Action::Unsubscribe) => format!(
            "Wir haben einen Bestätigungslink an {email} geschickt. Öffnen Sie ihn, um die Abmeldung abzuschließen."
        ),
    }
}

pub fn confirmed(action: Action, email: &str, lang: Lang) -> String {
    match (lang, action) {
        (Lang::En, Action::Subscribe) => format!("{email} is now subscribed to the list. Welcome!"),
        (Lang::En, Action::Unsubscribe) => {
            format!("{email} has been removed from the list. Goodbye!")
        }
        (Lang::De, Action::Subscribe) => {
            format!("{email} ist jetzt in die Liste eingetragen. Willkommen!")
        }
        (Lang::De, Action::Unsubscribe) => {
            format!("{email} wurde aus der Liste ausgetragen. Auf Wiedersehen!")
        }
    }
}

pub fn confirmation_failed(action: Action, email: &str, lang: Lang) -> String {
    match (lang, action) {
        (Lang::En, Action::Subscribe) => format!(
            "We could not process the subscription request for {email}. Please try again in a few minutes."
        ),
        (Lang::En, Action::Unsubscribe) => format!(
            "We could not process the unsubscription request for {email}. Please try again in a few minutes."
        ),
        (Lang::De, Action::Subscribe) => format!(
            "Die Anmeldung von {email} konnte nicht verarbeitet werden. Bitte versuchen Sie es in einigen Minuten erneut."
        ),
        (Lang::De, Action::Unsubscribe) => format!(
            "Die Abmeldung von {email} konnte nicht verarbeitet werden. Bitte versuchen Sie es in einigen Minuten erneut."
        ),
    }
}

pub fn invalid_link(lang: Lang) -> &'static str {
    match lang {
        Lang::En => {
            "This confirmation link is invalid, expired, or was already used. Please request a new one."
        }
        Lang::De => {
            "Dieser Bestätigungslink ist ungültig, abgelaufen oder wurde bereits verwendet. Bitte fordern Sie einen neuen an."
        }
    }
}
