//! Japanese public holidays, computed from the rules of the national holiday act.
//!
//! Covers 2007 (when the current substitute-holiday rule took effect) through 2099,
//! the validity range of the equinox approximation. Dates outside that range are
//! never reported as holidays.

use std::ops::RangeInclusive;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::calendar::HolidayCalendar;

pub const SUPPORTED_YEARS: RangeInclusive<i32> = 2007..=2099;

const SUBSTITUTE: &str = "振替休日";
const CITIZENS: &str = "国民の休日";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JapaneseHolidays;

impl JapaneseHolidays {
    pub fn name(&self, date: NaiveDate) -> Option<&'static str> {
        if !SUPPORTED_YEARS.contains(&date.year()) {
            return None;
        }
        statutory(date)
            .or_else(|| is_citizens_holiday(date).then_some(CITIZENS))
            .or_else(|| is_substitute_holiday(date).then_some(SUBSTITUTE))
    }

    pub fn holidays_in(&self, year: i32) -> Vec<(NaiveDate, &'static str)> {
        let Some(mut day) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        while day.year() == year {
            if let Some(name) = self.name(day) {
                out.push((day, name));
            }
            day += Duration::days(1);
        }
        out
    }
}

impl HolidayCalendar for JapaneseHolidays {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.name(date).is_some()
    }
}

fn vernal_equinox_day(year: i32) -> u32 {
    let y = year - 1980;
    (20.8431 + 0.242194 * f64::from(y) - f64::from(y / 4)).floor() as u32
}

fn autumnal_equinox_day(year: i32) -> u32 {
    let y = year - 1980;
    (23.2488 + 0.242194 * f64::from(y) - f64::from(y / 4)).floor() as u32
}

fn is_nth_monday(date: NaiveDate, n: u32) -> bool {
    date.weekday() == Weekday::Mon && (date.day() - 1) / 7 + 1 == n
}

/// Holidays named directly by the act, before substitute and sandwiched days.
fn statutory(date: NaiveDate) -> Option<&'static str> {
    let (y, m, d) = (date.year(), date.month(), date.day());
    let name = match (m, d) {
        (1, 1) => "元日",
        (1, _) if is_nth_monday(date, 2) => "成人の日",
        (2, 11) => "建国記念の日",
        (2, 23) if y >= 2020 => "天皇誕生日",
        (3, _) if d == vernal_equinox_day(y) => "春分の日",
        (4, 29) => "昭和の日",
        (5, 1) if y == 2019 => "天皇の即位の日",
        (5, 3) => "憲法記念日",
        (5, 4) => "みどりの日",
        (5, 5) => "こどもの日",
        (7, 23) if y == 2020 => "海の日",
        (7, 24) if y == 2020 => "スポーツの日",
        (7, 22) if y == 2021 => "海の日",
        (7, 23) if y == 2021 => "スポーツの日",
        (7, _) if y != 2020 && y != 2021 && is_nth_monday(date, 3) => "海の日",
        (8, 10) if y == 2020 => "山の日",
        (8, 8) if y == 2021 => "山の日",
        (8, 11) if y >= 2016 && y != 2020 && y != 2021 => "山の日",
        (9, _) if is_nth_monday(date, 3) => "敬老の日",
        (9, _) if d == autumnal_equinox_day(y) => "秋分の日",
        (10, 22) if y == 2019 => "即位礼正殿の儀",
        (10, _) if y != 2020 && y != 2021 && is_nth_monday(date, 2) => {
            if y >= 2020 { "スポーツの日" } else { "体育の日" }
        }
        (11, 3) => "文化の日",
        (11, 23) => "勤労感謝の日",
        (12, 23) if y <= 2018 => "天皇誕生日",
        _ => return None,
    };
    Some(name)
}

fn is_citizens_holiday(date: NaiveDate) -> bool {
    if statutory(date).is_some() || date.weekday() == Weekday::Sun {
        return false;
    }
    let before = date - Duration::days(1);
    let after = date + Duration::days(1);
    statutory(before).is_some() && statutory(after).is_some()
}

/// The first non-holiday after a run of holidays that contains a Sunday.
fn is_substitute_holiday(date: NaiveDate) -> bool {
    if statutory(date).is_some() {
        return false;
    }
    let mut prev = date - Duration::days(1);
    while statutory(prev).is_some() {
        if prev.weekday() == Weekday::Sun {
            return true;
        }
        prev -= Duration::days(1);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_holidays_2025() {
        let got: Vec<String> = JapaneseHolidays
            .holidays_in(2025)
            .into_iter()
            .map(|(d, _)| d.format("%m-%d").to_string())
            .collect();
        let expected = [
            "01-01", "01-13", "02-11", "02-23", "02-24", "03-20", "04-29", "05-03", "05-04",
            "05-05", "05-06", "07-21", "08-11", "09-15", "09-23", "10-13", "11-03", "11-23",
            "11-24",
        ];
        assert_eq!(got, expected);
    }

    #[test]
    fn test_substitute_after_golden_week_sunday() {
        // 2025-05-04 is a Sunday; 05-05 is already a holiday so the substitute is 05-06.
        assert_eq!(JapaneseHolidays.name(ymd(2025, 5, 6)), Some(SUBSTITUTE));
        assert_eq!(JapaneseHolidays.name(ymd(2025, 5, 5)), Some("こどもの日"));
        assert_eq!(JapaneseHolidays.name(ymd(2025, 5, 7)), None);
    }

    #[test]
    fn test_citizens_holiday_in_silver_week() {
        assert_eq!(JapaneseHolidays.name(ymd(2026, 9, 21)), Some("敬老の日"));
        assert_eq!(JapaneseHolidays.name(ymd(2026, 9, 22)), Some(CITIZENS));
        assert_eq!(JapaneseHolidays.name(ymd(2026, 9, 23)), Some("秋分の日"));
    }

    #[test]
    fn test_2019_enthronement_days() {
        assert_eq!(JapaneseHolidays.name(ymd(2019, 4, 30)), Some(CITIZENS));
        assert_eq!(JapaneseHolidays.name(ymd(2019, 5, 1)), Some("天皇の即位の日"));
        assert_eq!(JapaneseHolidays.name(ymd(2019, 5, 2)), Some(CITIZENS));
        assert_eq!(JapaneseHolidays.name(ymd(2019, 5, 6)), Some(SUBSTITUTE));
    }

    #[test]
    fn test_olympic_moves() {
        assert_eq!(JapaneseHolidays.name(ymd(2021, 7, 22)), Some("海の日"));
        assert_eq!(JapaneseHolidays.name(ymd(2021, 7, 19)), None);
        assert_eq!(JapaneseHolidays.name(ymd(2021, 8, 9)), Some(SUBSTITUTE));
        assert_eq!(JapaneseHolidays.name(ymd(2020, 10, 12)), None);
    }

    #[test]
    fn test_emperors_birthday_moved() {
        assert_eq!(JapaneseHolidays.name(ymd(2018, 12, 23)), Some("天皇誕生日"));
        assert_eq!(JapaneseHolidays.name(ymd(2019, 12, 23)), None);
        assert_eq!(JapaneseHolidays.name(ymd(2019, 2, 23)), None);
        assert_eq!(JapaneseHolidays.name(ymd(2020, 2, 23)), Some("天皇誕生日"));
    }

    #[test]
    fn test_outside_supported_range() {
        assert_eq!(JapaneseHolidays.name(ymd(2100, 1, 1)), None);
        assert!(JapaneseHolidays.holidays_in(2006).is_empty());
    }
}
