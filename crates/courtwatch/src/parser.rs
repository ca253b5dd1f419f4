use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};

use crate::calendar::DateFilter;
use crate::types::{SlotRecord, SlotTable, weekday_label};

static RE_AVAILABLE_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^A_(\d{8})_?(\d{2})$").expect("invalid regex: available cell")
});
static RE_ANY_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|_)(\d{8})_?\d{2}$").expect("invalid regex: any cell")
});
static SEL_WITH_ID: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[id]").expect("invalid selector: [id]"));

fn parse_date_code(code: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(code, "%Y%m%d").ok()
}

/// Table-section markup is dropped by the HTML5 parser outside of a `<table>`.
fn parse_week_table(html: &str) -> Html {
    let trimmed = html.trim_start();
    let needs_table = ["<tbody", "<thead", "<tr"]
        .iter()
        .any(|tag| {
            trimmed
                .get(..tag.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(tag))
        });
    if needs_table {
        Html::parse_fragment(&format!("<table>{html}</table>"))
    } else {
        Html::parse_fragment(html)
    }
}

fn element_ids(document: &Html) -> impl Iterator<Item = &str> {
    document
        .select(&SEL_WITH_ID)
        .filter_map(|e| e.value().attr("id"))
}

/// Available cells of one week table, filtered by date class and ordered by date then slot code.
pub fn extract_slots(html: &str, filter: DateFilter<'_>, slots: &SlotTable) -> Vec<SlotRecord> {
    let document = parse_week_table(html);
    let mut records = Vec::new();

    for id in element_ids(&document) {
        let Some(caps) = RE_AVAILABLE_CELL.captures(id) else {
            continue;
        };
        let date_code = &caps[1];
        let slot_code = &caps[2];

        let Some(date) = parse_date_code(date_code) else {
            log::debug!("Skipping cell '{}': unparsable date", id);
            continue;
        };
        if !filter.accepts(date) {
            continue;
        }

        records.push(SlotRecord {
            date,
            date_code: date_code.to_string(),
            weekday: weekday_label(date).to_string(),
            slot_code: slot_code.to_string(),
            time_label: slots.label(slot_code),
        });
    }

    records.sort_by(|a, b| (a.date, &a.slot_code).cmp(&(b.date, &b.slot_code)));
    records
}

/// First and last date referenced by any cell of the table, available or not.
pub fn week_range(html: &str) -> Option<(NaiveDate, NaiveDate)> {
    let document = parse_week_table(html);
    let dates: Vec<NaiveDate> = element_ids(&document)
        .filter_map(|id| RE_ANY_CELL.captures(id))
        .filter_map(|caps| parse_date_code(&caps[1]))
        .collect();
    Some((*dates.iter().min()?, *dates.iter().max()?))
}
