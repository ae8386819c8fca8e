//! Outbound mail abstraction for credential recovery.
//!
//! The reset flow hands raw tokens to a `MailSender` and never returns them
//! to the HTTP caller in production. The sender decides how to deliver
//! (SMTP, API, etc.) and returns `Ok`/`Err`; a delivery failure fails the
//! forgot request so the caller can retry.
//!
//! The default sender for local dev is `LogMailSender`, which logs the reset
//! link instead of sending real email.

use anyhow::Result;
use tracing::info;

/// Delivery abstraction used by the password-reset flow.
pub trait MailSender: Send + Sync {
    /// Deliver a recovery link or return an error to fail the request.
    fn send_password_reset(&self, email: &str, reset_url: &str) -> Result<()>;
}

/// Local dev sender that logs the recovery link instead of sending it.
#[derive(Clone, Debug)]
pub struct LogMailSender;

impl MailSender for LogMailSender {
    fn send_password_reset(&self, email: &str, reset_url: &str) -> Result<()> {
        info!(to_email = %email, reset_url = %reset_url, "password reset mail stub");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_always_succeeds() {
        let sender = LogMailSender;
        assert!(
            sender
                .send_password_reset("a@example.com", "https://identeco.dev/reset-password#token=t")
                .is_ok()
        );
    }
}
