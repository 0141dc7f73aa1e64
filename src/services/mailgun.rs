//! Client for the Mailgun mailing-list API.
//!
//! Thin wrapper over the `/v3/lists/{list}/members` endpoints. Only the
//! calls the confirmation flow needs are implemented.

use serde::{Deserialize, Serialize};

/// A member record as Mailgun returns it, reduced to the field the flow
/// reads. Serde drops the rest of the response.
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub subscribed: bool,
}

#[derive(Deserialize)]
struct MemberResponse {
    member: Member,
}

#[derive(Serialize)]
struct NewMember<'a> {
    address: &'a str,
    subscribed: &'static str,
    upsert: &'static str,
}

pub struct Client {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    list: String,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str, list: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|err| Error::Request(err.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            list: list.to_string(),
        })
    }

    fn members_url(&self) -> String {
        format!("{}/v3/lists/{}/members", self.base_url, self.list)
    }

    fn member_url(&self, email: &str) -> String {
        // Addresses go into the path, so percent-encode them.
        let encoded: String = form_urlencoded::byte_serialize(email.as_bytes()).collect();
        format!("{}/{}", self.members_url(), encoded)
    }

    /// Fetches a single member. `None` means Mailgun has no record of the
    /// address on this list.
    pub async fn get_member(&self, email: &str) -> Result<Option<Member>, Error> {
        let response = self
            .http
            .get(self.member_url(email))
            .basic_auth("api", Some(&self.api_key))
            .send()
            .await
            .map_err(|err| Error::Request(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: MemberResponse = response
            .json()
            .await
            .map_err(|err| Error::Parse(err.to_string()))?;
        Ok(Some(body.member))
    }

    /// Adds the address to the list, or re-subscribes it if a record already
    /// exists (`upsert=yes` makes this idempotent).
    pub async fn upsert_member(&self, email: &str) -> Result<(), Error> {
        let request = NewMember {
            address: email,
            subscribed: "yes",
            upsert: "yes",
        };

        let response = self
            .http
            .post(self.members_url())
            .basic_auth("api", Some(&self.api_key))
            .form(&request)
            .send()
            .await
            .map_err(|err| Error::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// Removes the address from the list. Returns `false` when Mailgun had
    /// no record to delete.
    pub async fn delete_member(&self, email: &str) -> Result<bool, Error> {
        let response = self
            .http
            .delete(self.member_url(email))
            .basic_auth("api", Some(&self.api_key))
            .send()
            .await
            .map_err(|err| Error::Request(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(true)
    }
}

#[derive(Debug)]
pub enum Error {
    /// The request never produced a response (network, TLS, timeout).
    Request(String),
    /// Mailgun answered with a non-success status.
    Api { status: u16, message: String },
    /// The response body did not match the expected shape.
    Parse(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Request(message) => write!(f, "mailgun request failed: {message}"),
            Error::Api { status, message } => {
                write!(f, "mailgun api error (status {status}): {message}")
            }
            Error::Parse(message) => write!(f, "mailgun response parse error: {message}"),
        }
    }
}

impl std::error::Error for Error {}
