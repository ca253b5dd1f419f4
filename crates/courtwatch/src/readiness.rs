use std::time::Duration;

use crate::config::ScanConfig;
use crate::scanner::ScanError;
use crate::session::{SessionError, WebSession};
use crate::wait::{Pacer, wait_until};

/// First configured phrase that appears in `text`, compared case-insensitively.
pub fn matching_phrase<'a>(text: &str, phrases: &'a [String]) -> Option<&'a str> {
    let text = text.to_lowercase();
    phrases
        .iter()
        .find(|p| !p.is_empty() && text.contains(&p.to_lowercase()))
        .map(String::as_str)
}

pub async fn looks_like_error_page<S: WebSession>(
    session: &S,
    phrases: &[String],
) -> Result<Option<String>, SessionError> {
    let text = session.page_text().await?;
    Ok(matching_phrase(&text, phrases).map(str::to_string))
}

async fn is_ready<S: WebSession>(session: &S, config: &ScanConfig) -> Result<bool, SessionError> {
    if session.ready_state().await? != "complete" {
        return Ok(false);
    }
    let cookies = session.cookie_names().await?;
    let has_session = match &config.session_cookie {
        Some(name) => cookies.iter().any(|c| c == name),
        None => !cookies.is_empty(),
    };
    if !has_session {
        return Ok(false);
    }
    let l = &config.locators;
    for css in [&l.date, &l.purpose, &l.facility] {
        if session.find(css).await?.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Waits for a loaded document, a session cookie and all three search controls.
pub async fn await_ready<S: WebSession>(
    session: &S,
    config: &ScanConfig,
    timeout: Duration,
) -> Result<bool, SessionError> {
    let ready = wait_until(timeout, config.waits.poll(), || async move {
        let ready = is_ready(session, config).await?;
        Ok::<_, SessionError>(ready.then_some(()))
    })
    .await?;
    Ok(ready.is_some())
}

/// [`await_ready`] with exactly one reload between two checks.
pub async fn ensure_ready<S: WebSession>(
    session: &S,
    config: &ScanConfig,
    pacer: &Pacer,
) -> Result<(), ScanError> {
    let timeout = config.waits.readiness();
    if await_ready(session, config, timeout).await? {
        return Ok(());
    }

    if let Some(phrase) = looks_like_error_page(session, &config.error_phrases).await? {
        log::warn!("Error page while loading ('{}'), backing off before reload", phrase);
        pacer.backoff().await;
    } else {
        log::warn!("Page not ready after {:?}, reloading once", timeout);
    }
    session.reload().await?;
    pacer.settle().await;

    if await_ready(session, config, timeout).await? {
        return Ok(());
    }
    match looks_like_error_page(session, &config.error_phrases).await? {
        Some(phrase) => Err(ScanError::TransientErrorPage(phrase)),
        None => Err(ScanError::ReadinessTimeout(timeout)),
    }
}

/// Reloads once if the current page is a known error page.
///
/// Returns whether a reload happened. A page that is still an error page after the
/// reload is reported instead of retried.
pub async fn recover_from_error_page<S: WebSession>(
    session: &S,
    config: &ScanConfig,
    pacer: &Pacer,
) -> Result<bool, ScanError> {
    let Some(phrase) = looks_like_error_page(session, &config.error_phrases).await? else {
        return Ok(false);
    };
    log::warn!("Error page detected ('{}'), reloading once", phrase);
    pacer.backoff().await;
    session.reload().await?;
    pacer.settle().await;

    match looks_like_error_page(session, &config.error_phrases).await? {
        Some(phrase) => Err(ScanError::TransientErrorPage(phrase)),
        None => Ok(true),
    }
}
