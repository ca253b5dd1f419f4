use crate::config::ScanConfig;
use crate::readiness::recover_from_error_page;
use crate::scanner::ScanError;
use crate::session::WebSession;
use crate::types::ScanBudget;
use crate::wait::{Pacer, wait_for_clickable, wait_for_presence, wait_for_staleness};

/// Clicks "next week" and waits for the old table to go stale.
///
/// `Ok(false)` means there is nothing more to page through: the control is missing,
/// unclickable, or the click did not replace the table.
async fn advance<S: WebSession>(
    session: &S,
    config: &ScanConfig,
    pacer: &Pacer,
    table: &S::Element,
) -> Result<bool, ScanError> {
    let (l, waits) = (&config.locators, &config.waits);

    let Some(next) = wait_for_clickable(session, &l.next_week, waits.element(), waits.poll()).await?
    else {
        log::info!("No next-week control; end of bookable range");
        return Ok(false);
    };
    if let Err(e) = session.click(&next).await {
        log::info!("Next-week click failed ({}); end of bookable range", e);
        return Ok(false);
    }
    if !wait_for_staleness(session, table, waits.staleness(), waits.poll()).await? {
        log::warn!("Week table was not replaced after clicking next week");
        return Ok(false);
    }
    pacer.jitter().await;
    recover_from_error_page(session, config, pacer).await?;
    Ok(true)
}

/// Calls `on_week(index, table_html)` for weeks `0..=max_weeks` in order.
///
/// Stops early, without error, when the budget runs out or the site has no further
/// week. Returns the number of weeks read.
pub async fn for_each_week<S, F>(
    session: &S,
    config: &ScanConfig,
    pacer: &Pacer,
    max_weeks: u32,
    budget: &ScanBudget,
    mut on_week: F,
) -> Result<u32, ScanError>
where
    S: WebSession,
    F: FnMut(u32, &str),
{
    let (l, waits) = (&config.locators, &config.waits);
    let mut read = 0;

    for week in 0..=max_weeks {
        if budget.is_exceeded() {
            log::warn!("Scan budget exhausted before week {}", week);
            break;
        }

        let Some(table) =
            wait_for_presence(session, &l.week_table, waits.element(), waits.poll()).await?
        else {
            if week == 0 {
                return Err(ScanError::ResultsMissing);
            }
            log::warn!("Week {} table did not appear; stopping", week);
            break;
        };
        let html = session.outer_html(&table).await?;
        on_week(week, &html);
        read += 1;
        pacer.scroll(session, 200, 600).await;

        if week == max_weeks {
            break;
        }
        if budget.is_exceeded() {
            log::warn!("Scan budget exhausted after week {}", week);
            break;
        }
        if !advance(session, config, pacer, &table).await? {
            break;
        }
    }
    Ok(read)
}
