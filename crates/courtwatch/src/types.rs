use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

const WEEKDAY_LABELS: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

/// Short Japanese weekday label (`月`..`日`) for a date.
pub fn weekday_label(date: NaiveDate) -> &'static str {
    WEEKDAY_LABELS[date.weekday().num_days_from_monday() as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateClass {
    Weekday,
    WeekendOrHoliday,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid filter mode '{0}'. Accepted values: 'holiday-only', 'weekday-only', 'all'")]
pub struct FilterModeParseError(String);

/// Which dates the extractor keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMode {
    #[default]
    HolidayOnly,
    WeekdayOnly,
    All,
}

impl FilterMode {
    pub fn accepts(&self, class: DateClass) -> bool {
        match self {
            FilterMode::HolidayOnly => class == DateClass::WeekendOrHoliday,
            FilterMode::WeekdayOnly => class == DateClass::Weekday,
            FilterMode::All => true,
        }
    }
}

impl FromStr for FilterMode {
    type Err = FilterModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "holiday-only" | "holiday" | "holidays" => Ok(FilterMode::HolidayOnly),
            "weekday-only" | "weekday" | "weekdays" => Ok(FilterMode::WeekdayOnly),
            "all" | "any" => Ok(FilterMode::All),
            _ => Err(FilterModeParseError(s.to_string())),
        }
    }
}

impl Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterMode::HolidayOnly => write!(f, "holiday-only"),
            FilterMode::WeekdayOnly => write!(f, "weekday-only"),
            FilterMode::All => write!(f, "all"),
        }
    }
}

/// Two-digit slot code to human time label, as published by the reservation site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotTable(BTreeMap<String, String>);

impl SlotTable {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    /// Unknown codes come back as `slot:<code>` so schema drift stays visible.
    pub fn label(&self, code: &str) -> String {
        self.0
            .get(code)
            .cloned()
            .unwrap_or_else(|| format!("slot:{code}"))
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        let entries = [
            ("10", "9時"),
            ("20", "11時"),
            ("30", "13時"),
            ("40", "15時"),
            ("50", "17時"),
            ("60", "19時"),
        ]
        .into_iter()
        .map(|(code, label)| (code.to_string(), label.to_string()))
        .collect();
        Self(entries)
    }
}

/// One available cell of a week table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub date: NaiveDate,
    pub date_code: String,
    pub weekday: String,
    pub slot_code: String,
    pub time_label: String,
}

impl Display for SlotRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} に空きがあります。", self.date_code, self.time_label)
    }
}

/// A facility option resolved from the facility selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub keyword: String,
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWindow {
    pub start: NaiveDate,
    pub extra_weeks: u32,
}

/// A slot discovered at a facility, handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    pub facility: String,
    pub date_code: String,
    pub date: NaiveDate,
    pub slot_code: String,
    pub time_label: String,
}

impl Hit {
    pub fn from_record(facility: &str, record: &SlotRecord) -> Self {
        Self {
            facility: facility.to_string(),
            date_code: record.date_code.clone(),
            date: record.date,
            slot_code: record.slot_code.clone(),
            time_label: record.time_label.clone(),
        }
    }

    pub fn key(&self) -> AvailabilityKey {
        AvailabilityKey {
            facility: self.facility.clone(),
            date_code: self.date_code.clone(),
            slot_code: self.slot_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AvailabilityKey {
    pub facility: String,
    pub date_code: String,
    pub slot_code: String,
}

/// Wall-clock deadline for a whole sweep. Checked cooperatively.
#[derive(Debug, Clone, Copy)]
pub struct ScanBudget {
    started: Instant,
    limit: Duration,
}

impl ScanBudget {
    pub fn new(limit: Duration) -> Self {
        Self::starting_at(Instant::now(), limit)
    }

    pub fn starting_at(started: Instant, limit: Duration) -> Self {
        Self { started, limit }
    }

    pub fn is_exceeded(&self) -> bool {
        self.started.elapsed() >= self.limit
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started.elapsed())
    }
}
