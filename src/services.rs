//! External service integrations.
//!
//! Two seams face the outside world: the mailing-list provider (Mailgun)
//! and the email sender (SMTP or Resend). Both are traits so handlers and
//! the confirmation flow can be tested against mocks.

mod email;
mod list;
pub mod mailgun;

pub use email::{EmailSender, EmailSenderImpl};
pub use list::{ListProvider, MailgunListProvider};

#[cfg(test)]
pub use email::MockEmailSender;
#[cfg(test)]
pub use list::MockListProvider;
