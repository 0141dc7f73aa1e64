use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Public base URL used in confirmation links (e.g., https://news.example.com)
    pub public_url: String,
    pub mailgun_api_key: String,
    /// Mailing list address, e.g. news@mail.example.com
    pub mailgun_list: String,
    /// Mailgun API base. Defaults to the US region; use
    /// https://api.eu.mailgun.net for EU domains.
    #[serde(default = "default_mailgun_base_url")]
    pub mailgun_base_url: String,
    /// From header for confirmation mail (e.g., "News <noreply@example.com>")
    pub mail_from: String,
    /// SMTP URL for development email (e.g., smtp://localhost:1025)
    #[serde(default)]
    pub smtp_url: Option<String>,
    /// Resend API key for production email
    #[serde(default)]
    pub resend_api_key: Option<String>,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

fn default_mailgun_base_url() -> String {
    "https://api.mailgun.net".to_string()
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}
