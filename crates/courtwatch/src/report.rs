use std::fmt::Display;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Facility, FilterMode, ScanWindow, SlotRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSummary {
    pub index: u32,
    pub range: Option<(NaiveDate, NaiveDate)>,
    pub slots: Vec<SlotRecord>,
}

impl WeekSummary {
    fn heading(&self) -> String {
        if self.index == 0 {
            "今週".to_string()
        } else {
            format!("{} 週後", self.index)
        }
    }
}

impl Display for WeekSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.range {
            Some((first, last)) => writeln!(f, "--- {} : {} 〜 {} ---", self.heading(), first, last)?,
            None => writeln!(f, "--- {} : (範囲不明) ---", self.heading())?,
        }
        if self.slots.is_empty() {
            writeln!(f, "（該当なし）")?;
        }
        for slot in &self.slots {
            writeln!(f, "{}", slot)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FacilityOutcome {
    Scanned {
        facility: Facility,
        weeks: Vec<WeekSummary>,
    },
    NotFound,
    /// Weeks read before the failure are kept; their slots were already reported.
    Failed {
        reason: String,
        weeks: Vec<WeekSummary>,
    },
    /// Never attempted because the budget ran out first.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityReport {
    pub keyword: String,
    pub outcome: FacilityOutcome,
}

impl FacilityReport {
    pub fn weeks(&self) -> &[WeekSummary] {
        match &self.outcome {
            FacilityOutcome::Scanned { weeks, .. } | FacilityOutcome::Failed { weeks, .. } => weeks,
            FacilityOutcome::NotFound | FacilityOutcome::Skipped => &[],
        }
    }

    pub fn slot_count(&self) -> usize {
        self.weeks().iter().map(|w| w.slots.len()).sum()
    }
}

fn mode_label(mode: FilterMode) -> &'static str {
    match mode {
        FilterMode::HolidayOnly => "休日のみ",
        FilterMode::WeekdayOnly => "平日のみ",
        FilterMode::All => "全日",
    }
}

impl Display for FacilityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            FacilityOutcome::NotFound => {
                return writeln!(f, "[{}] 公園が見つかりません（キーワード要確認）", self.keyword);
            }
            FacilityOutcome::Skipped => {
                return writeln!(f, "[{}] 時間切れのため未実施", self.keyword);
            }
            FacilityOutcome::Failed { reason, .. } => {
                writeln!(f, "[{}] 失敗: {}", self.keyword, reason)?;
            }
            FacilityOutcome::Scanned { .. } => {}
        }
        for week in self.weeks() {
            writeln!(f)?;
            write!(f, "{}", week)?;
        }
        writeln!(f, "\n合計 {} 件", self.slot_count())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub window: ScanWindow,
    pub filter: FilterMode,
    pub facilities: Vec<FacilityReport>,
}

impl ScanReport {
    pub fn total_slots(&self) -> usize {
        self.facilities.iter().map(FacilityReport::slot_count).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FacilityReport> {
        self.facilities
            .iter()
            .filter(|r| matches!(r.outcome, FacilityOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

impl Display for ScanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for facility in &self.facilities {
            writeln!(
                f,
                "==================== [{}] の結果（{}） ====================",
                facility.keyword,
                mode_label(self.filter)
            )?;
            write!(f, "{}", facility)?;
            writeln!(f)?;
        }
        write!(
            f,
            "{} 施設 / 空き {} 件 (開始日 {}, +{} 週)",
            self.facilities.len(),
            self.total_slots(),
            self.window.start,
            self.window.extra_weeks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(date_code: &str, label: &str) -> SlotRecord {
        let date = NaiveDate::parse_from_str(date_code, "%Y%m%d").unwrap();
        SlotRecord {
            date,
            date_code: date_code.to_string(),
            weekday: crate::types::weekday_label(date).to_string(),
            slot_code: "20".to_string(),
            time_label: label.to_string(),
        }
    }

    fn report() -> ScanReport {
        let start = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
        ScanReport {
            window: ScanWindow {
                start,
                extra_weeks: 1,
            },
            filter: FilterMode::HolidayOnly,
            facilities: vec![
                FacilityReport {
                    keyword: "汐入".to_string(),
                    outcome: FacilityOutcome::Scanned {
                        facility: Facility {
                            keyword: "汐入".to_string(),
                            label: "汐入公園".to_string(),
                            value: "1300".to_string(),
                        },
                        weeks: vec![
                            WeekSummary {
                                index: 0,
                                range: Some((start, NaiveDate::from_ymd_opt(2025, 6, 20).unwrap())),
                                slots: vec![slot("20250614", "11時")],
                            },
                            WeekSummary {
                                index: 1,
                                range: None,
                                slots: Vec::new(),
                            },
                        ],
                    },
                },
                FacilityReport {
                    keyword: "舎人".to_string(),
                    outcome: FacilityOutcome::Failed {
                        reason: "boom".to_string(),
                        weeks: vec![WeekSummary {
                            index: 0,
                            range: None,
                            slots: vec![slot("20250615", "9時")],
                        }],
                    },
                },
                FacilityReport {
                    keyword: "存在しない公園".to_string(),
                    outcome: FacilityOutcome::NotFound,
                },
            ],
        }
    }

    #[test]
    fn test_counts() {
        let report = report();
        assert_eq!(report.total_slots(), 2);
        assert!(report.has_failures());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_text_rendering() {
        let text = report().to_string();
        assert!(text.contains("[汐入] の結果（休日のみ）"));
        assert!(text.contains("--- 今週 : 2025-06-14 〜 2025-06-20 ---"));
        assert!(text.contains("20250614 11時 に空きがあります。"));
        assert!(text.contains("--- 1 週後 : (範囲不明) ---"));
        assert!(text.contains("（該当なし）"));
        assert!(text.contains("[舎人] 失敗: boom"));
        assert!(text.contains("[存在しない公園] 公園が見つかりません"));
        assert!(text.ends_with("3 施設 / 空き 2 件 (開始日 2025-06-14, +1 週)"));
    }

    #[test]
    fn test_json_tags_outcome() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["facilities"][0]["outcome"]["status"], "scanned");
        assert_eq!(json["facilities"][2]["outcome"]["status"], "not_found");
        assert_eq!(json["filter"], "holiday-only");
    }
}
