use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::HolidayTable;
use crate::types::{FilterMode, ScanWindow, SlotTable};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// CSS selectors for the search form and the week view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locators {
    pub date: String,
    pub purpose: String,
    pub facility: String,
    pub search: String,
    pub week_table: String,
    pub next_week: String,
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            date: "#daystart-home".to_string(),
            purpose: "#purpose-home".to_string(),
            facility: "#bname-home".to_string(),
            search: "#btn-go".to_string(),
            week_table: "#week-info > tbody".to_string(),
            next_week: "#next-week".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Waits {
    pub element_ms: u64,
    pub staleness_ms: u64,
    pub readiness_ms: u64,
    pub poll_ms: u64,
    pub option_attempts: u32,
    pub option_poll_ms: u64,
}

impl Waits {
    pub fn element(&self) -> Duration {
        Duration::from_millis(self.element_ms)
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_millis(self.staleness_ms)
    }

    pub fn readiness(&self) -> Duration {
        Duration::from_millis(self.readiness_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn option_poll(&self) -> Duration {
        Duration::from_millis(self.option_poll_ms)
    }

    /// Total time the facility selector gets to populate.
    pub fn options(&self) -> Duration {
        self.option_poll() * self.option_attempts
    }
}

impl Default for Waits {
    fn default() -> Self {
        Self {
            element_ms: 20_000,
            staleness_ms: 12_000,
            readiness_ms: 20_000,
            poll_ms: 250,
            option_attempts: 15,
            option_poll_ms: 250,
        }
    }
}

/// Millisecond ranges for the randomised pauses between interactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub enabled: bool,
    pub jitter_ms: (u64, u64),
    pub settle_ms: (u64, u64),
    pub backoff_ms: (u64, u64),
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            enabled: true,
            jitter_ms: (120, 350),
            settle_ms: (400, 800),
            backoff_ms: (2_000, 4_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HolidayConfig {
    pub builtin: bool,
    pub extra: Vec<NaiveDate>,
}

impl Default for HolidayConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            extra: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub to: Option<String>,
    pub subject: String,
    pub workers: usize,
    pub token_path: PathBuf,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            to: None,
            subject: "【自動通知】都立コート 休日空き状況".to_string(),
            workers: 2,
            token_path: PathBuf::from("token.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub base_url: String,
    pub purpose_code: String,
    pub facilities: Vec<String>,
    pub target_date: Option<NaiveDate>,
    pub extra_weeks: u32,
    pub budget_secs: u64,
    pub filter: FilterMode,
    pub slots: SlotTable,
    pub locators: Locators,
    pub waits: Waits,
    pub pacing: Pacing,
    pub error_phrases: Vec<String>,
    pub session_cookie: Option<String>,
    pub holidays: HolidayConfig,
    pub mail: MailConfig,
    pub notify_on_failure: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            base_url: crate::BASE_URL.to_string(),
            purpose_code: "1000_1030".to_string(),
            facilities: ["東白", "汐入", "東綾瀬", "舎人", "亀戸中央", "大島小松川"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            target_date: None,
            extra_weeks: 4,
            budget_secs: 180,
            filter: FilterMode::HolidayOnly,
            slots: SlotTable::default(),
            locators: Locators::default(),
            waits: Waits::default(),
            pacing: Pacing::default(),
            error_phrases: ["アクセスが集中", "しばらくしてから", "エラーが発生", "ただいま混雑"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            session_cookie: None,
            holidays: HolidayConfig::default(),
            mail: MailConfig::default(),
            notify_on_failure: false,
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.facilities.is_empty() {
            return Err(ConfigError::Invalid(
                "At least one facility keyword is required".to_string(),
            ));
        }
        // A blank keyword is a substring of every option label.
        if let Some(index) = self.facilities.iter().position(|f| f.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "Facility keyword #{} is blank",
                index + 1
            )));
        }
        if self.mail.workers == 0 {
            return Err(ConfigError::Invalid(
                "Mail worker count must be greater than 0".to_string(),
            ));
        }
        for (name, (lo, hi)) in [
            ("jitter_ms", self.pacing.jitter_ms),
            ("settle_ms", self.pacing.settle_ms),
            ("backoff_ms", self.pacing.backoff_ms),
        ] {
            if lo > hi {
                return Err(ConfigError::Invalid(format!(
                    "pacing.{name} lower bound ({lo}) cannot exceed upper bound ({hi})"
                )));
            }
        }
        if let Some(code) = self
            .slots
            .codes()
            .find(|c| c.len() != 2 || !c.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(ConfigError::Invalid(format!(
                "Slot code '{code}' must be exactly two digits"
            )));
        }
        if self.waits.poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "waits.poll_ms must be greater than 0".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }

    /// Unset target dates mean "tomorrow", relative to `today`.
    pub fn window(&self, today: NaiveDate) -> ScanWindow {
        let start = self
            .target_date
            .or_else(|| today.checked_add_days(Days::new(1)))
            .unwrap_or(today);
        ScanWindow {
            start,
            extra_weeks: self.extra_weeks,
        }
    }

    /// `None` when no holiday source is configured; classification is then weekend-only.
    pub fn holiday_table(&self) -> Option<HolidayTable> {
        let table = if self.holidays.builtin {
            HolidayTable::japanese()
        } else {
            HolidayTable::default()
        };
        let table = table.with_extra(self.holidays.extra.iter().copied());
        (!table.is_empty()).then_some(table)
    }

    /// Short waits and no pacing, for driving the in-memory site.
    #[cfg(test)]
    pub(crate) fn fast() -> Self {
        Self {
            waits: Waits {
                element_ms: 40,
                staleness_ms: 40,
                readiness_ms: 40,
                poll_ms: 1,
                option_attempts: 20,
                option_poll_ms: 1,
            },
            pacing: Pacing {
                enabled: false,
                ..Pacing::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ScanConfig = serde_json::from_str(
            r#"{
                "facilities": ["汐入"],
                "filter": "weekday-only",
                "target_date": "2025-06-14",
                "slots": {"10": "9:00", "20": "11:00"},
                "waits": {"poll_ms": 100}
            }"#,
        )
        .unwrap();
        assert_eq!(config.facilities, vec!["汐入".to_string()]);
        assert_eq!(config.filter, FilterMode::WeekdayOnly);
        assert_eq!(config.slots.label("20"), "11:00");
        assert_eq!(config.slots.label("30"), "slot:30");
        assert_eq!(config.waits.poll_ms, 100);
        assert_eq!(config.waits.element_ms, 20_000);
        assert_eq!(config.purpose_code, "1000_1030");
        assert_eq!(config.mail.workers, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ScanConfig::default();
        config.facilities.clear();
        assert!(config.validate().is_err());

        let mut config = ScanConfig::default();
        config.facilities = vec!["".to_string(), "汐入".to_string()];
        assert!(config.validate().is_err());

        let mut config = ScanConfig::default();
        config.facilities.push("  ".to_string());
        assert!(config.validate().is_err());

        let mut config = ScanConfig::default();
        config.mail.workers = 0;
        assert!(config.validate().is_err());

        let mut config = ScanConfig::default();
        config.pacing.jitter_ms = (500, 100);
        assert!(config.validate().is_err());

        let config: ScanConfig = serde_json::from_str(r#"{"slots": {"1": "x"}}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_defaults_to_tomorrow() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 13).unwrap();
        let window = ScanConfig::default().window(today);
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2025, 6, 14).unwrap());
        assert_eq!(window.extra_weeks, 4);

        let config = ScanConfig {
            target_date: Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),
            ..ScanConfig::default()
        };
        assert_eq!(config.window(today).start, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
    }

    #[test]
    fn test_holiday_table_can_be_disabled() {
        let mut config = ScanConfig::default();
        assert!(config.holiday_table().is_some());
        config.holidays.builtin = false;
        assert!(config.holiday_table().is_none());
        config.holidays.extra.push(NaiveDate::from_ymd_opt(2025, 12, 29).unwrap());
        assert!(config.holiday_table().is_some());
    }
}
