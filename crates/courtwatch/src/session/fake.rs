//! Scripted in-memory stand-in for the reservation site.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{SelectOption, SessionError, WebSession};
use crate::config::Locators;

pub(crate) const PLACEHOLDER: &str = "選択してください";
pub(crate) const ERROR_TEXT: &str = "ただいま混雑しています。しばらくしてから再度お試しください。";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Date,
    Purpose,
    Facility,
    Search,
    WeekTable,
    NextWeek,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeElement {
    kind: Kind,
    generation: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Page {
    #[default]
    Blank,
    Entry {
        ready: bool,
    },
    /// Reloading resumes at `resume` (a results week) or at the entry page.
    Error {
        resume: Option<usize>,
    },
    Results {
        week: usize,
    },
}

#[derive(Debug, Default)]
pub(crate) struct State {
    pub page: Page,
    pub generation: u64,
    pub cookies: bool,
    pub loads_before_ready: u32,
    pub error_loads: u32,
    pub error_after_search: u32,
    pub error_after_next: u32,
    pub sticky_error_reloads: u32,
    pub options_delay_reads: u32,
    pub facilities: Vec<(String, String)>,
    pub weeks: Vec<String>,
    pub next_missing_at: Option<usize>,
    pub next_does_nothing: bool,
    pub reformat_date: bool,
    /// Entry loads whose date field ignores every write.
    pub date_rejecting_loads: u32,
    /// Entry loads whose search button never becomes clickable.
    pub search_disabled_loads: u32,
    /// Time each week-table read takes.
    pub read_delay: Duration,
    /// Staleness checks fail like a dropped connection.
    pub stale_check_fails: bool,
    date_locked: bool,
    search_locked: bool,
    pub date_value: String,
    pub purpose: Option<String>,
    pub facility: Option<String>,
    pub navigations: u32,
    pub reloads: u32,
    pub searches: Vec<String>,
    pub weeks_read: Vec<usize>,
    pub closed: bool,
}

impl State {
    fn load_entry(&mut self) {
        self.generation += 1;
        self.date_value.clear();
        self.purpose = None;
        self.facility = None;
        if self.error_loads > 0 {
            self.error_loads -= 1;
            self.page = Page::Error { resume: None };
            return;
        }
        self.date_locked = self.date_rejecting_loads > 0;
        self.date_rejecting_loads = self.date_rejecting_loads.saturating_sub(1);
        self.search_locked = self.search_disabled_loads > 0;
        self.search_disabled_loads = self.search_disabled_loads.saturating_sub(1);
        let ready = self.loads_before_ready == 0;
        self.loads_before_ready = self.loads_before_ready.saturating_sub(1);
        self.page = Page::Entry { ready };
    }

    fn present(&self, kind: Kind) -> bool {
        match (self.page, kind) {
            (
                Page::Entry { ready: true },
                Kind::Date | Kind::Purpose | Kind::Facility | Kind::Search,
            ) => true,
            (Page::Results { .. }, Kind::WeekTable) => true,
            (Page::Results { week }, Kind::NextWeek) => {
                week + 1 < self.weeks.len() && self.next_missing_at != Some(week)
            }
            _ => false,
        }
    }
}

pub(crate) struct FakeSite {
    state: Mutex<State>,
    locators: Locators,
}

impl FakeSite {
    pub(crate) fn new(facilities: &[(&str, &str)], weeks: Vec<String>) -> Self {
        let state = State {
            cookies: true,
            facilities: facilities
                .iter()
                .map(|(label, value)| (label.to_string(), value.to_string()))
                .collect(),
            weeks,
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
            locators: Locators::default(),
        }
    }

    pub(crate) fn configure(self, f: impl FnOnce(&mut State)) -> Self {
        f(&mut self.state());
        self
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake site state poisoned")
    }

    fn kind_for(&self, css: &str) -> Option<Kind> {
        let l = &self.locators;
        [
            (&l.date, Kind::Date),
            (&l.purpose, Kind::Purpose),
            (&l.facility, Kind::Facility),
            (&l.search, Kind::Search),
            (&l.week_table, Kind::WeekTable),
            (&l.next_week, Kind::NextWeek),
        ]
        .into_iter()
        .find_map(|(selector, kind)| (selector == css).then_some(kind))
    }

    fn live(&self, element: &FakeElement) -> Result<MutexGuard<'_, State>, SessionError> {
        let state = self.state();
        if element.generation != state.generation {
            return Err(SessionError::Page(format!("stale element {:?}", element.kind)));
        }
        Ok(state)
    }
}

/// A week table whose cells carry the given ids.
pub(crate) fn week_html(ids: &[&str]) -> String {
    let cells: String = ids
        .iter()
        .map(|id| format!(r#"<td id="{id}">○</td>"#))
        .collect();
    format!("<tbody><tr>{cells}</tr></tbody>")
}

#[async_trait]
impl WebSession for FakeSite {
    type Element = FakeElement;

    async fn navigate(&self, _url: &str) -> Result<(), SessionError> {
        let mut state = self.state();
        state.navigations += 1;
        state.load_entry();
        Ok(())
    }

    async fn reload(&self) -> Result<(), SessionError> {
        let mut state = self.state();
        state.reloads += 1;
        let page = state.page;
        match page {
            Page::Error { resume: Some(week) } => {
                state.generation += 1;
                if state.sticky_error_reloads > 0 {
                    state.sticky_error_reloads -= 1;
                } else {
                    state.page = Page::Results { week };
                }
            }
            Page::Results { .. } => state.generation += 1,
            _ => state.load_entry(),
        }
        Ok(())
    }

    async fn find(&self, css: &str) -> Result<Option<FakeElement>, SessionError> {
        let state = self.state();
        Ok(self
            .kind_for(css)
            .filter(|kind| state.present(*kind))
            .map(|kind| FakeElement {
                kind,
                generation: state.generation,
            }))
    }

    async fn is_clickable(&self, element: &FakeElement) -> Result<bool, SessionError> {
        let state = self.state();
        let locked = element.kind == Kind::Search && state.search_locked;
        Ok(state.generation == element.generation && !locked)
    }

    async fn is_stale(&self, element: &FakeElement) -> Result<bool, SessionError> {
        let state = self.state();
        if state.stale_check_fails {
            return Err(SessionError::Page("connection reset".to_string()));
        }
        Ok(state.generation != element.generation)
    }

    async fn attribute(
        &self,
        element: &FakeElement,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        let state = self.live(element)?;
        match (element.kind, name) {
            (Kind::Date, "value") if state.reformat_date => {
                Ok(Some(state.date_value.replace('-', "/")))
            }
            (Kind::Date, "value") => Ok(Some(state.date_value.clone())),
            _ => Ok(None),
        }
    }

    async fn set_value(&self, element: &FakeElement, value: &str) -> Result<(), SessionError> {
        let mut state = self.live(element)?;
        if element.kind != Kind::Date {
            return Err(SessionError::Page("set_value on non-date control".to_string()));
        }
        if !state.date_locked {
            state.date_value = value.to_string();
        }
        Ok(())
    }

    async fn options(&self, select: &FakeElement) -> Result<Vec<SelectOption>, SessionError> {
        let mut state = self.live(select)?;
        let mut out = vec![SelectOption {
            label: PLACEHOLDER.to_string(),
            value: String::new(),
        }];
        if state.options_delay_reads > 0 {
            state.options_delay_reads -= 1;
            return Ok(out);
        }
        out.extend(state.facilities.iter().map(|(label, value)| SelectOption {
            label: label.clone(),
            value: value.clone(),
        }));
        Ok(out)
    }

    async fn select_value(&self, select: &FakeElement, value: &str) -> Result<(), SessionError> {
        let mut state = self.live(select)?;
        match select.kind {
            Kind::Purpose => state.purpose = Some(value.to_string()),
            Kind::Facility if state.facilities.iter().any(|(_, v)| v == value) => {
                state.facility = Some(value.to_string())
            }
            _ => return Err(SessionError::Page(format!("no option '{value}'"))),
        }
        Ok(())
    }

    async fn click(&self, element: &FakeElement) -> Result<(), SessionError> {
        let mut state = self.live(element)?;
        match (element.kind, state.page) {
            (Kind::Search, _) => {
                let facility = state.facility.clone().unwrap_or_default();
                state.searches.push(facility);
                state.generation += 1;
                if state.error_after_search > 0 {
                    state.error_after_search -= 1;
                    state.page = Page::Error { resume: Some(0) };
                } else {
                    state.page = Page::Results { week: 0 };
                }
            }
            (Kind::NextWeek, Page::Results { week }) => {
                if state.next_does_nothing {
                    return Ok(());
                }
                state.generation += 1;
                if state.error_after_next > 0 {
                    state.error_after_next -= 1;
                    state.page = Page::Error {
                        resume: Some(week + 1),
                    };
                } else {
                    state.page = Page::Results { week: week + 1 };
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn outer_html(&self, element: &FakeElement) -> Result<String, SessionError> {
        let (html, delay) = {
            let mut state = self.live(element)?;
            let html = match (element.kind, state.page) {
                (Kind::WeekTable, Page::Results { week }) => {
                    state.weeks_read.push(week);
                    state.weeks.get(week).cloned().unwrap_or_default()
                }
                _ => String::new(),
            };
            (html, state.read_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(html)
    }

    async fn page_text(&self) -> Result<String, SessionError> {
        match self.state().page {
            Page::Error { .. } => Ok(format!("<html><body>{ERROR_TEXT}</body></html>")),
            _ => Ok("<html><body>公園予約システム</body></html>".to_string()),
        }
    }

    async fn ready_state(&self) -> Result<String, SessionError> {
        match self.state().page {
            Page::Blank => Ok("loading".to_string()),
            _ => Ok("complete".to_string()),
        }
    }

    async fn cookie_names(&self) -> Result<Vec<String>, SessionError> {
        if self.state().cookies {
            Ok(vec!["JSESSIONID".to_string()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn execute(&self, _script: &str, _args: Vec<Value>) -> Result<Value, SessionError> {
        Ok(Value::Null)
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.state().closed = true;
        Ok(())
    }
}
