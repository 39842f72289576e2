use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodStatus {
    Present,
    Absent,
}

impl PeriodStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_classes: i64,
    pub attended_classes: i64,
    pub percentage: i64,
}

/// `round(100 * attended / total)`, 0 when total is 0. Rounds half away
/// from zero.
pub fn percentage(attended: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (100.0 * attended as f64 / total as f64).round() as i64
}

/// Extra classes needed to lift `attended/total` up to `threshold` percent:
/// `ceil((threshold * total - 100 * attended) / (100 - threshold))`.
/// Only meaningful for threshold < 100.
pub fn classes_needed(threshold: i64, total: i64, attended: i64) -> i64 {
    let num = threshold * total - 100 * attended;
    let den = 100 - threshold;
    if den <= 0 || num <= 0 {
        return 0;
    }
    (num as f64 / den as f64).ceil() as i64
}

/// Fold period statuses into a summary. Associative and order-independent,
/// so per-student summaries sum up to the class-wide numbers.
pub fn summarize<I>(statuses: I) -> AttendanceSummary
where
    I: IntoIterator<Item = PeriodStatus>,
{
    let mut total: i64 = 0;
    let mut attended: i64 = 0;
    for s in statuses {
        total += 1;
        if s == PeriodStatus::Present {
            attended += 1;
        }
    }
    AttendanceSummary {
        total_classes: total,
        attended_classes: attended,
        percentage: percentage(attended, total),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBucket {
    pub month: String,
    pub total_classes: i64,
    pub attended_classes: i64,
    pub percentage: i64,
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Group per-period entries by calendar month, most recent month first.
pub fn monthly_breakdown<I>(entries: I) -> Vec<MonthlyBucket>
where
    I: IntoIterator<Item = (NaiveDate, PeriodStatus)>,
{
    let mut buckets: BTreeMap<(i32, u32), (i64, i64)> = BTreeMap::new();
    for (date, status) in entries {
        let slot = buckets.entry((date.year(), date.month())).or_insert((0, 0));
        slot.0 += 1;
        if status == PeriodStatus::Present {
            slot.1 += 1;
        }
    }
    buckets
        .into_iter()
        .rev()
        .map(|((year, month), (total, attended))| MonthlyBucket {
            month: format!("{} {}", MONTH_NAMES[(month - 1) as usize], year),
            total_classes: total,
            attended_classes: attended,
            percentage: percentage(attended, total),
        })
        .collect()
}

/// Strict "HH:MM" to minutes since midnight.
pub fn minutes_of(hhmm: &str) -> Option<i64> {
    let (h, m) = hhmm.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let hours: i64 = h.parse().ok()?;
    let minutes: i64 = m.parse().ok()?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Half-open interval overlap: [s1,e1) and [s2,e2) conflict iff they share
/// any minute. Touching at a boundary (e1 == s2) is not a conflict.
pub fn spans_overlap(s1: i64, e1: i64, s2: i64, e2: i64) -> bool {
    s1 < e2 && s2 < e1
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Academic year derived from semester; never persisted, so promotions
/// cannot leave it stale.
pub fn year_label(semester: i64) -> &'static str {
    match semester {
        1 | 2 => "1st Year",
        3 | 4 => "2nd Year",
        5 | 6 => "3rd Year",
        _ => "4th Year",
    }
}

/// Reporting band: >=90 excellent, <75 warning, good in between.
pub fn band(percentage: i64) -> &'static str {
    if percentage >= 90 {
        "excellent"
    } else if percentage < 75 {
        "warning"
    } else {
        "good"
    }
}
