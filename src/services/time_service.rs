use chrono::{Duration, Local, NaiveDateTime, Utc};

use crate::error::{AppError, AppResult};

const CALENDAR_ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

/// Converts the planner's naive local wall-clock times into the UTC ISO
/// strings the calendar store persists. The downstream calendar re-applies
/// the offset on display, so subtracting it here makes events render at the
/// intended wall-clock time for any viewer.
#[derive(Debug, Clone, Copy)]
pub struct TimeUtil {
    offset: Duration,
}

impl TimeUtil {
    pub fn new(offset_minutes: i64) -> Self {
        Self {
            offset: Duration::minutes(offset_minutes),
        }
    }

    pub fn local_to_utc_iso(&self, local: NaiveDateTime) -> String {
        (local - self.offset).format(CALENDAR_ISO_FORMAT).to_string()
    }

    pub fn now_utc_iso() -> String {
        Utc::now().format(CALENDAR_ISO_FORMAT).to_string()
    }

    pub fn parse_clock(raw: &str) -> AppResult<(u32, u32)> {
        let (hour, minute) = raw
            .split_once(':')
            .ok_or_else(|| AppError::validation(format!("invalid clock value: {raw}")))?;
        let hour: u32 = hour
            .parse()
            .map_err(|_| AppError::validation(format!("invalid clock value: {raw}")))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| AppError::validation(format!("invalid clock value: {raw}")))?;

        if hour > 23 || minute > 59 {
            return Err(AppError::validation(format!("clock out of range: {raw}")));
        }

        Ok((hour, minute))
    }
}

/// Source of "now" for the pipeline. Production uses the system clock; tests
/// pin a fixed instant so plan runs are reproducible.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    fixed: Option<NaiveDateTime>,
}

impl Clock {
    pub fn system() -> Self {
        Self { fixed: None }
    }

    pub fn fixed(now: NaiveDateTime) -> Self {
        Self { fixed: Some(now) }
    }

    pub fn now_local(&self) -> NaiveDateTime {
        match self.fixed {
            Some(now) => now,
            None => Local::now().naive_local(),
        }
    }
}
