use chrono::{NaiveTime, Timelike, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One weekly window of a student's `fixedSchedule`.
///
/// The field names follow the JSON array stored in the `fixed_schedule`
/// column, so this type is deliberately lenient: malformed values survive
/// decoding (a missing key and `null` both become `None`) and are rejected
/// later by [`TimeSlot::window`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    /// 0 = Sunday .. 6 = Saturday
    #[serde(default)]
    pub day_of_week: Option<i64>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub course_id: Option<i64>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
}

/// A validated slot: weekday and a `[start, end)` interval within one day,
/// in whole minutes. A slot cannot run past midnight, so `24:00` is not a
/// valid end time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotWindow {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Error, PartialEq)]
pub enum SlotError {
    #[error("missing day of week")]
    MissingDayOfWeek,

    #[error("day of week {0} is outside 0..=6")]
    InvalidDayOfWeek(i64),

    #[error("missing start time")]
    MissingStartTime,

    #[error("missing end time")]
    MissingEndTime,

    #[error("unparsable time {0:?}")]
    InvalidTime(String),

    #[error("end time {end} is not after start time {start}")]
    NonPositiveDuration { start: String, end: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("slot {index} is invalid: {source}")]
    InvalidSlot { index: usize, source: SlotError },

    #[error("slots {first} and {second} overlap on {weekday}")]
    Overlap {
        first: usize,
        second: usize,
        weekday: Weekday,
    },
}

impl TimeSlot {
    pub fn new(day_of_week: i64, start_time: &str, end_time: &str) -> Self {
        Self {
            day_of_week: Some(day_of_week),
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
            subject: None,
            course_id: None,
            price: None,
        }
    }

    pub fn window(&self) -> Result<SlotWindow, SlotError> {
        let day = self.day_of_week.ok_or(SlotError::MissingDayOfWeek)?;
        let weekday = weekday_from_sunday_index(day).ok_or(SlotError::InvalidDayOfWeek(day))?;

        let start_raw = present(&self.start_time).ok_or(SlotError::MissingStartTime)?;
        let end_raw = present(&self.end_time).ok_or(SlotError::MissingEndTime)?;
        let start = parse_clock_time(start_raw)?;
        let end = parse_clock_time(end_raw)?;

        let window = SlotWindow { weekday, start, end };
        if window.duration_minutes() <= 0 {
            return Err(SlotError::NonPositiveDuration {
                start: start_raw.to_string(),
                end: end_raw.to_string(),
            });
        }
        Ok(window)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SlotWindow {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Half-open intervals: 16:00-17:00 and 17:00-18:00 do not overlap.
    pub fn overlaps(&self, other: &SlotWindow) -> bool {
        self.weekday == other.weekday && self.start < other.end && other.start < self.end
    }
}

pub fn weekday_from_sunday_index(index: i64) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Accepts `HH:MM` as written by the admin UI and `HH:MM:SS` as returned by
/// SQL `time` columns. Class times are whole minutes, so non-zero seconds
/// are rejected.
pub fn parse_clock_time(raw: &str) -> Result<NaiveTime, SlotError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
        .filter(|time| time.second() == 0)
        .ok_or_else(|| SlotError::InvalidTime(raw.to_string()))
}

/// Checks every slot and rejects any pair overlapping on the same weekday.
pub fn validate_schedule(slots: &[TimeSlot]) -> Result<Vec<SlotWindow>, ScheduleError> {
    let mut windows = Vec::with_capacity(slots.len());
    for (index, slot) in slots.iter().enumerate() {
        let window = slot
            .window()
            .map_err(|source| ScheduleError::InvalidSlot { index, source })?;
        windows.push(window);
    }

    for (first, a) in windows.iter().enumerate() {
        for (offset, b) in windows[first + 1..].iter().enumerate() {
            if a.overlaps(b) {
                return Err(ScheduleError::Overlap {
                    first,
                    second: first + 1 + offset,
                    weekday: a.weekday,
                });
            }
        }
    }

    Ok(windows)
}

pub fn decode_schedule(raw: &str) -> Result<Vec<TimeSlot>, serde_json::Error> {
    serde_json::from_str(raw)
}

pub fn encode_schedule(slots: &[TimeSlot]) -> Result<String, serde_json::Error> {
    serde_json::to_string(slots)
}
