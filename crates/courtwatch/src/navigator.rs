use chrono::NaiveDate;

use crate::config::ScanConfig;
use crate::readiness::{await_ready, ensure_ready, recover_from_error_page};
use crate::scanner::ScanError;
use crate::session::{SelectOption, SessionError, WebSession};
use crate::types::Facility;
use crate::wait::{Pacer, wait_for_clickable, wait_for_presence, wait_until};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The results table for `Facility` is on screen.
    Ready(Facility),
    /// No facility option label contains the keyword.
    NotFound { keyword: String },
}

/// First real option whose visible label contains `keyword`. A blank keyword matches nothing.
pub fn pick_facility<'a>(options: &'a [SelectOption], keyword: &str) -> Option<&'a SelectOption> {
    if keyword.trim().is_empty() {
        return None;
    }
    options
        .iter()
        .find(|o| !o.value.is_empty() && o.label.contains(keyword))
}

async fn require<S: WebSession>(
    session: &S,
    config: &ScanConfig,
    css: &str,
) -> Result<S::Element, ScanError> {
    let waits = &config.waits;
    wait_for_presence(session, css, waits.element(), waits.poll())
        .await?
        .ok_or_else(|| ScanError::ControlMissing(css.to_string()))
}

async fn set_date<S: WebSession>(
    session: &S,
    config: &ScanConfig,
    target: NaiveDate,
) -> Result<(), ScanError> {
    let field = require(session, config, &config.locators.date).await?;
    let dashed = target.format("%Y-%m-%d").to_string();
    // The widget may reformat on blur.
    let slashed = target.format("%Y/%m/%d").to_string();
    session.set_value(&field, &dashed).await?;

    let (field_ref, dashed_ref, slashed_ref) = (&field, dashed.as_str(), slashed.as_str());
    let accepted = wait_until(config.waits.element(), config.waits.poll(), || async move {
        let value = session.attribute(field_ref, "value").await?.unwrap_or_default();
        Ok::<_, SessionError>((value == dashed_ref || value == slashed_ref).then_some(()))
    })
    .await?;

    if accepted.is_none() {
        let actual = session.attribute(&field, "value").await?.unwrap_or_default();
        return Err(ScanError::DateRejected {
            expected: dashed,
            actual,
        });
    }
    Ok(())
}

/// Options of the facility selector once it holds more than its placeholder.
async fn facility_options<S: WebSession>(
    session: &S,
    config: &ScanConfig,
    select: &S::Element,
) -> Result<Vec<SelectOption>, ScanError> {
    let waits = &config.waits;
    let populated = wait_until(waits.options(), waits.option_poll(), || async move {
        let options = session.options(select).await?;
        Ok::<_, SessionError>((options.len() > 1).then_some(options))
    })
    .await?;
    match populated {
        Some(options) => Ok(options),
        None => {
            log::warn!("Facility selector still holds only its placeholder");
            Ok(session.options(select).await?)
        }
    }
}

/// Fills in date, purpose and facility for `keyword` and submits the search.
pub async fn open_search<S: WebSession>(
    session: &S,
    config: &ScanConfig,
    pacer: &Pacer,
    keyword: &str,
    target: NaiveDate,
) -> Result<SearchOutcome, ScanError> {
    let l = &config.locators;

    session.navigate(&config.base_url).await?;
    pacer.jitter().await;
    pacer.scroll(session, 250, 350).await;
    ensure_ready(session, config, pacer).await?;

    if recover_from_error_page(session, config, pacer).await?
        && !await_ready(session, config, config.waits.readiness()).await?
    {
        return Err(ScanError::ReadinessTimeout(config.waits.readiness()));
    }

    set_date(session, config, target).await?;
    pacer.jitter().await;

    let purpose = require(session, config, &l.purpose).await?;
    session.select_value(&purpose, &config.purpose_code).await?;
    pacer.jitter().await;

    let select = require(session, config, &l.facility).await?;
    let options = facility_options(session, config, &select).await?;
    let Some(choice) = pick_facility(&options, keyword) else {
        log::warn!(
            "[{}] No facility option matches the keyword (check the keyword)",
            keyword
        );
        return Ok(SearchOutcome::NotFound {
            keyword: keyword.to_string(),
        });
    };
    let facility = Facility {
        keyword: keyword.to_string(),
        label: choice.label.clone(),
        value: choice.value.clone(),
    };
    log::debug!("[{}] Selected '{}' ({})", keyword, facility.label, facility.value);
    session.select_value(&select, &facility.value).await?;
    pacer.jitter().await;

    let button = wait_for_clickable(session, &l.search, config.waits.element(), config.waits.poll())
        .await?
        .ok_or_else(|| ScanError::ControlMissing(l.search.clone()))?;
    session.click(&button).await?;
    pacer.settle().await;

    recover_from_error_page(session, config, pacer).await?;

    wait_for_presence(session, &l.week_table, config.waits.element(), config.waits.poll())
        .await?
        .ok_or(ScanError::ResultsMissing)?;
    Ok(SearchOutcome::Ready(facility))
}
