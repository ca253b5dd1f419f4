//! The one bounded-wait primitive every component polls through, plus the
//! randomised pacing used between interactions.

use std::future::Future;
use std::time::Duration;

use rand::{Rng, rng};
use tokio::time::{Instant, sleep};

use crate::config::Pacing;
use crate::session::{SessionError, WebSession};

/// Polls `check` every `interval` until it yields `Some` or `timeout` elapses.
///
/// The check always runs at least once, and an in-flight check is never cut short.
/// Session errors end the wait immediately.
pub async fn wait_until<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<Option<T>, SessionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, SessionError>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await? {
            return Ok(Some(value));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        sleep(interval.min(deadline - now)).await;
    }
}

pub async fn wait_for_presence<S: WebSession>(
    session: &S,
    css: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<Option<S::Element>, SessionError> {
    wait_until(timeout, interval, || session.find(css)).await
}

pub async fn wait_for_clickable<S: WebSession>(
    session: &S,
    css: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<Option<S::Element>, SessionError> {
    wait_until(timeout, interval, || async move {
        let clickable = match session.find(css).await? {
            Some(element) if session.is_clickable(&element).await? => Some(element),
            _ => None,
        };
        Ok::<_, SessionError>(clickable)
    })
    .await
}

pub async fn wait_for_staleness<S: WebSession>(
    session: &S,
    element: &S::Element,
    timeout: Duration,
    interval: Duration,
) -> Result<bool, SessionError> {
    let stale = wait_until(timeout, interval, || async move {
        let stale = session.is_stale(element).await?;
        Ok::<_, SessionError>(stale.then_some(()))
    })
    .await?;
    Ok(stale.is_some())
}

/// Randomised pauses that keep the request rhythm from looking scripted.
#[derive(Debug, Clone)]
pub struct Pacer {
    pacing: Pacing,
}

impl Pacer {
    pub fn new(pacing: Pacing) -> Self {
        Self { pacing }
    }

    pub fn disabled() -> Self {
        Self::new(Pacing {
            enabled: false,
            ..Pacing::default()
        })
    }

    async fn pause(&self, (lo, hi): (u64, u64)) {
        if !self.pacing.enabled || hi == 0 {
            return;
        }
        let ms = rng().random_range(lo..=hi.max(lo));
        sleep(Duration::from_millis(ms)).await;
    }

    /// Short pause between two interactions.
    pub async fn jitter(&self) {
        self.pause(self.pacing.jitter_ms).await;
    }

    /// Longer pause after a page load.
    pub async fn settle(&self) {
        self.pause(self.pacing.settle_ms).await;
    }

    /// Back off before reloading an overloaded page.
    pub async fn backoff(&self) {
        self.pause(self.pacing.backoff_ms).await;
    }

    /// Scroll the page a little, as a reader would.
    pub async fn scroll<S: WebSession>(&self, session: &S, min_px: u32, max_px: u32) {
        if !self.pacing.enabled {
            return;
        }
        let px = rng().random_range(min_px..=max_px.max(min_px));
        if let Err(e) = session
            .execute(&format!("window.scrollBy(0, {px});"), Vec::new())
            .await
        {
            log::debug!("Scroll failed: {e}");
        }
        self.jitter().await;
    }
}
