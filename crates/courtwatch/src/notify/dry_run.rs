use async_trait::async_trait;

use super::{MailError, MailSender};

/// Logs each message instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

#[async_trait]
impl MailSender for LogSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        log::info!("[dry-run] To: {} | Subject: {} | {}", to, subject, body);
        Ok(())
    }
}
