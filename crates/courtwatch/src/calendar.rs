use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::holidays::JapaneseHolidays;
use crate::types::{DateClass, FilterMode};

pub trait HolidayCalendar: Send + Sync {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

/// Weekends always count; the holiday lookup is optional and only ever adds dates.
pub fn classify(date: NaiveDate, calendar: Option<&dyn HolidayCalendar>) -> DateClass {
    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        return DateClass::WeekendOrHoliday;
    }
    if calendar.is_some_and(|c| c.is_holiday(date)) {
        return DateClass::WeekendOrHoliday;
    }
    DateClass::Weekday
}

/// A filter mode bound to the calendar it classifies with.
#[derive(Clone, Copy)]
pub struct DateFilter<'a> {
    pub mode: FilterMode,
    pub calendar: Option<&'a dyn HolidayCalendar>,
}

impl<'a> DateFilter<'a> {
    pub fn new(mode: FilterMode, calendar: Option<&'a dyn HolidayCalendar>) -> Self {
        Self { mode, calendar }
    }

    pub fn accepts(&self, date: NaiveDate) -> bool {
        self.mode.accepts(classify(date, self.calendar))
    }
}

/// Built-in rules plus any extra closure dates from configuration.
#[derive(Debug, Clone, Default)]
pub struct HolidayTable {
    builtin: Option<JapaneseHolidays>,
    extra: BTreeSet<NaiveDate>,
}

impl HolidayTable {
    pub fn japanese() -> Self {
        Self {
            builtin: Some(JapaneseHolidays),
            extra: BTreeSet::new(),
        }
    }

    pub fn with_extra(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.extra.extend(dates);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.builtin.is_none() && self.extra.is_empty()
    }
}

impl HolidayCalendar for HolidayTable {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.extra.contains(&date) || self.builtin.is_some_and(|b| b.is_holiday(date))
    }
}
