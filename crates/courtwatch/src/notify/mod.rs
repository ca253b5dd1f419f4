//! De-duplicated, non-blocking delivery of availability notices.

pub mod dry_run;
pub mod gmail;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::scanner::HitSink;
use crate::types::{AvailabilityKey, Hit, weekday_label};

pub use dry_run::LogSender;
pub use gmail::GmailSender;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to read token file {path}: {source}")]
    Token {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed token or response JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Token has expired and holds no refresh token")]
    NoRefreshToken,
    #[error("Mail server rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait MailSender: Send + Sync + 'static {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Availability keys already handed to the dispatcher in this run.
#[derive(Debug, Default)]
pub struct SeenSet(HashSet<AvailabilityKey>);

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when the key had not been seen before.
    pub fn insert(&mut self, key: AvailabilityKey) -> bool {
        self.0.insert(key)
    }

    pub fn contains(&self, key: &AvailabilityKey) -> bool {
        self.0.contains(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Message body for one newly found slot.
pub fn render_body(hit: &Hit) -> String {
    format!(
        "{} {}({}) {} に空きがあります。",
        hit.facility,
        hit.date_code,
        weekday_label(hit.date),
        hit.time_label
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Sends one message per new [`AvailabilityKey`] on a small worker pool.
///
/// `on_hit` never waits for delivery. Must be used inside a Tokio runtime, and
/// [`Dispatcher::shutdown`] must be awaited so queued messages are not lost.
pub struct Dispatcher<M: MailSender> {
    mailer: Arc<M>,
    seen: SeenSet,
    permits: Arc<Semaphore>,
    tasks: JoinSet<bool>,
    to: String,
    subject: String,
}

impl<M: MailSender> Dispatcher<M> {
    pub fn new(mailer: M, to: impl Into<String>, subject: impl Into<String>, workers: usize) -> Self {
        Self {
            mailer: Arc::new(mailer),
            seen: SeenSet::new(),
            permits: Arc::new(Semaphore::new(workers.max(1))),
            tasks: JoinSet::new(),
            to: to.into(),
            subject: subject.into(),
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Messages queued but not yet collected by [`Dispatcher::shutdown`].
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    fn submit(&mut self, body: String) {
        let mailer = Arc::clone(&self.mailer);
        let permits = Arc::clone(&self.permits);
        let to = self.to.clone();
        let subject = self.subject.clone();

        self.tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                log::error!("Mail worker pool closed; dropping message to {}", to);
                return false;
            };
            match mailer.send(&to, &subject, &body).await {
                Ok(()) => {
                    log::info!("Mail sent to {}: {}", to, body);
                    true
                }
                Err(e) => {
                    log::error!(
                        "Mail to {} failed (subject '{}', body '{}'): {}",
                        to,
                        subject,
                        body,
                        e
                    );
                    false
                }
            }
        });
    }

    /// Queues a one-off message about a failed run. Not de-duplicated.
    pub fn notify_failure(&mut self, text: &str) {
        self.submit(format!("スキャンが正常に完了しませんでした。\n\n{text}"));
    }

    /// Waits for every queued message.
    pub async fn shutdown(mut self) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(true) => summary.sent += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    log::error!("Mail task panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

impl<M: MailSender> Drop for Dispatcher<M> {
    fn drop(&mut self) {
        // Dropping the JoinSet aborts whatever is still queued.
        if !self.tasks.is_empty() {
            log::warn!(
                "Dispatcher dropped without shutdown; {} unsent message(s) aborted",
                self.tasks.len()
            );
        }
    }
}

impl<M: MailSender> HitSink for Dispatcher<M> {
    fn on_hit(&mut self, hit: &Hit) {
        if !self.seen.insert(hit.key()) {
            log::debug!("Already notified: {} {} {}", hit.facility, hit.date_code, hit.slot_code);
            return;
        }
        self.submit(render_body(hit));
    }
}
