//! Structural and business-rule validation of incoming schedule requests.
//!
//! Checks run in a fixed order and stop at the first failure: room, date
//! format, calendar existence, weekday, time formats, ordering, working window.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::*;

static DATE_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])$").expect("date pattern")
});

static TIME_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]|[01][0-9]|2[0-3]):([0-5][0-9])$").expect("time pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("number_room is required and must be a positive integer")]
    RoomRequired,
    #[error("invalid date format. valid format YYYY-MM-DD")]
    InvalidDateFormat,
    #[error("date does not exist in the calendar")]
    NonexistentDate,
    #[error("no appointments allowed for saturdays and sundays")]
    WeekendNotAllowed,
    #[error("invalid time format. valid format HH:MM")]
    InvalidTimeFormat,
    #[error("start time must be before end time")]
    StartAfterEnd,
    #[error("the appointment must be between 09:00 and 18:00")]
    OutOfHours,
}

impl ValidationError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::RoomRequired => "room_required",
            ValidationError::InvalidDateFormat => "invalid_date_format",
            ValidationError::NonexistentDate => "nonexistent_date",
            ValidationError::WeekendNotAllowed => "weekend_not_allowed",
            ValidationError::InvalidTimeFormat => "invalid_time_format",
            ValidationError::StartAfterEnd => "start_after_end",
            ValidationError::OutOfHours => "out_of_hours",
        }
    }
}

/// `number_room` as it arrives on the wire: a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomInput {
    Number(i64),
    Text(String),
}

/// Untyped request bag. Lives for one validate → check → persist pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleParams {
    pub number_room: Option<RoomInput>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl ScheduleParams {
    pub fn new(number_room: i64, date: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            number_room: Some(RoomInput::Number(number_room)),
            date: Some(date.to_string()),
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
        }
    }
}

pub fn validate(params: &ScheduleParams) -> Result<ScheduleDraft, ValidationError> {
    let number_room = parse_room(params.number_room.as_ref())?;
    let date = parse_date(params.date.as_deref().unwrap_or_default())?;
    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        return Err(ValidationError::WeekendNotAllowed);
    }
    let start = parse_time(params.start_time.as_deref())?;
    let end = parse_time(params.end_time.as_deref())?;
    if start >= end {
        return Err(ValidationError::StartAfterEnd);
    }
    if start < OPEN_TIME || end > CLOSE_TIME {
        return Err(ValidationError::OutOfHours);
    }
    Ok(ScheduleDraft {
        number_room,
        date,
        span: Span::new(start, end),
    })
}

fn parse_room(input: Option<&RoomInput>) -> Result<u32, ValidationError> {
    let room = match input {
        Some(RoomInput::Number(n)) => u32::try_from(*n).ok(),
        Some(RoomInput::Text(s)) => s.trim().parse::<u32>().ok(),
        None => None,
    };
    room.filter(|&n| n > 0).ok_or(ValidationError::RoomRequired)
}

/// Parse a `YYYY-MM-DD` date. Pattern mismatches and dates missing from the
/// calendar are reported as different kinds.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    let caps = DATE_FORMAT
        .captures(s)
        .ok_or(ValidationError::InvalidDateFormat)?;
    let field = |i: usize| caps[i].parse::<u32>().map_err(|_| ValidationError::InvalidDateFormat);
    let year = i32::try_from(field(1)?).map_err(|_| ValidationError::InvalidDateFormat)?;
    NaiveDate::from_ymd_opt(year, field(2)?, field(3)?).ok_or(ValidationError::NonexistentDate)
}

/// Parse a 24-hour `HH:MM` time. A single-digit hour is accepted.
pub fn parse_time(s: Option<&str>) -> Result<Minute, ValidationError> {
    let caps = s
        .and_then(|s| TIME_FORMAT.captures(s))
        .ok_or(ValidationError::InvalidTimeFormat)?;
    let hour: Minute = caps[1].parse().map_err(|_| ValidationError::InvalidTimeFormat)?;
    let minute: Minute = caps[2].parse().map_err(|_| ValidationError::InvalidTimeFormat)?;
    Ok(hour * 60 + minute)
}
