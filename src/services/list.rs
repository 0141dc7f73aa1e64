//! Mailing-list membership operations.

use anyhow::Result;

use crate::services::mailgun;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ListProvider: Send + Sync {
    /// Whether the address is currently subscribed to the list.
    async fn is_member(&self, email: &str) -> Result<bool>;

    /// Adds the address to the list. Idempotent: adding an existing member
    /// succeeds.
    async fn add_member(&self, email: &str) -> Result<()>;

    /// Removes the address from the list. Returns `false` when the address
    /// was not a member to begin with.
    async fn remove_member(&self, email: &str) -> Result<bool>;
}

pub struct MailgunListProvider {
    client: mailgun::Client,
}

impl MailgunListProvider {
    pub fn new(client: mailgun::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ListProvider for MailgunListProvider {
    async fn is_member(&self, email: &str) -> Result<bool> {
        let member = self.client.get_member(email).await?;
        Ok(member.is_some_and(|member| member.subscribed))
    }

    async fn add_member(&self, email: &str) -> Result<()> {
        self.client.upsert_member(email).await?;
        Ok(())
    }

    async fn remove_member(&self, email: &str) -> Result<bool> {
        let removed = self.client.delete_member(email).await?;
        Ok(removed)
    }
}
