use std::time::Duration;

use crate::calendar::{DateFilter, HolidayCalendar};
use crate::config::ScanConfig;
use crate::navigator::{SearchOutcome, open_search};
use crate::pager::for_each_week;
use crate::parser::{extract_slots, week_range};
use crate::report::{FacilityOutcome, FacilityReport, ScanReport, WeekSummary};
use crate::session::{SessionError, WebSession};
use crate::types::{Hit, ScanBudget, ScanWindow};
use crate::wait::Pacer;

/// Failures scoped to one facility. None of these abort the sweep.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Page did not become ready within {0:?}")]
    ReadinessTimeout(Duration),
    #[error("Site served an error page: '{0}'")]
    TransientErrorPage(String),
    #[error("Control not found: {0}")]
    ControlMissing(String),
    #[error("Date field rejected '{expected}' (shows '{actual}')")]
    DateRejected { expected: String, actual: String },
    #[error("Results table did not appear after searching")]
    ResultsMissing,
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Receives every available slot as soon as it is extracted.
///
/// Called synchronously from the scan loop, so implementations must not block.
pub trait HitSink {
    fn on_hit(&mut self, hit: &Hit);
}

impl<F: FnMut(&Hit)> HitSink for F {
    fn on_hit(&mut self, hit: &Hit) {
        self(hit)
    }
}

pub struct Scanner<'a, S: WebSession> {
    session: &'a S,
    config: &'a ScanConfig,
    calendar: Option<&'a dyn HolidayCalendar>,
    pacer: Pacer,
}

impl<'a, S: WebSession> Scanner<'a, S> {
    pub fn new(
        session: &'a S,
        config: &'a ScanConfig,
        calendar: Option<&'a dyn HolidayCalendar>,
    ) -> Self {
        Self {
            session,
            config,
            calendar,
            pacer: Pacer::new(config.pacing.clone()),
        }
    }

    /// Sweeps `facilities` in order over `window`.
    ///
    /// The budget is checked before each facility and each week; facilities that never
    /// started are reported as skipped.
    pub async fn scan(
        &self,
        facilities: &[String],
        window: ScanWindow,
        budget: &ScanBudget,
        sink: &mut dyn HitSink,
    ) -> ScanReport {
        let mut reports = Vec::with_capacity(facilities.len());

        for keyword in facilities {
            let outcome = if budget.is_exceeded() {
                log::warn!("[{}] Skipped: scan budget exhausted", keyword);
                FacilityOutcome::Skipped
            } else {
                log::info!("[{}] Scanning from {}", keyword, window.start);
                self.scan_facility(keyword, window, budget, sink).await
            };
            reports.push(FacilityReport {
                keyword: keyword.clone(),
                outcome,
            });
        }

        ScanReport {
            window,
            filter: self.config.filter,
            facilities: reports,
        }
    }

    async fn scan_facility(
        &self,
        keyword: &str,
        window: ScanWindow,
        budget: &ScanBudget,
        sink: &mut dyn HitSink,
    ) -> FacilityOutcome {
        let facility =
            match open_search(self.session, self.config, &self.pacer, keyword, window.start).await
            {
                Ok(SearchOutcome::Ready(facility)) => facility,
                Ok(SearchOutcome::NotFound { .. }) => return FacilityOutcome::NotFound,
                Err(e) => {
                    log::error!("[{}] Search failed: {}", keyword, e);
                    return FacilityOutcome::Failed {
                        reason: e.to_string(),
                        weeks: Vec::new(),
                    };
                }
            };

        let filter = DateFilter::new(self.config.filter, self.calendar);
        let slot_table = &self.config.slots;
        let mut weeks = Vec::new();

        let paged = for_each_week(
            self.session,
            self.config,
            &self.pacer,
            window.extra_weeks,
            budget,
            |index, html| {
                let slots = extract_slots(html, filter, slot_table);
                let range = week_range(html);
                match range {
                    Some((first, last)) => log::info!(
                        "[{}] Week +{}: {} 〜 {}, {} open",
                        keyword,
                        index,
                        first,
                        last,
                        slots.len()
                    ),
                    None => log::info!("[{}] Week +{}: {} open", keyword, index, slots.len()),
                }
                for record in &slots {
                    sink.on_hit(&Hit::from_record(keyword, record));
                }
                weeks.push(WeekSummary {
                    index,
                    range,
                    slots,
                });
            },
        )
        .await;

        match paged {
            Ok(_) => FacilityOutcome::Scanned { facility, weeks },
            Err(e) => {
                log::error!(
                    "[{}] Paging failed after {} week(s): {}",
                    keyword,
                    weeks.len(),
                    e
                );
                FacilityOutcome::Failed {
                    reason: e.to_string(),
                    weeks,
                }
            }
        }
    }
}
