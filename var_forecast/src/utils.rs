//! Utility functions for the var_forecast crate

use crate::error::{ForecastError, Result, Stage};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

/// Timestamp parsing helpers
pub mod date_parser {
    use super::*;
    use chrono::NaiveDateTime;

    /// Parse an RFC 3339 timestamp, `YYYY-MM-DD HH:MM:SS`, or a plain `YYYY-MM-DD` date
    pub fn parse_date(text: &str) -> Result<DateTime<Utc>> {
        let text = text.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(naive.and_utc());
            }
        }

        Err(ForecastError::TimestampParse(format!(
            "Unrecognised timestamp '{}'",
            text
        )))
    }
}

/// Sampling frequency of a series, used to project forecast timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Fixed spacing
    Fixed(Duration),
    /// Calendar months; `month_end` keeps dates on the last day of each month
    Months { step: u32, month_end: bool },
}

impl Frequency {
    /// Infer the frequency from observed timestamps.
    ///
    /// Calendar-month spacing is recognised first (including month-end
    /// series). Gaps left by dropped rows are allowed as long as every step
    /// is a whole multiple of the smallest one. Otherwise the median gap
    /// between observations is used.
    pub fn infer(timestamps: &[DateTime<Utc>]) -> Option<Self> {
        if timestamps.len() < 2 {
            return None;
        }

        let month_steps: Vec<i32> = timestamps
            .windows(2)
            .map(|w| months_between(w[0], w[1]))
            .collect();
        let step = month_steps.iter().copied().min().unwrap_or(0);
        let same_time = timestamps.windows(2).all(|w| w[0].time() == w[1].time());

        if step > 0 && same_time && month_steps.iter().all(|&m| m % step == 0) {
            let month_end = timestamps.iter().all(|t| is_month_end(t.date_naive()));
            let same_day = timestamps.windows(2).all(|w| w[0].day() == w[1].day());
            if month_end || same_day {
                return Some(Frequency::Months {
                    step: step as u32,
                    month_end: month_end && !same_day,
                });
            }
        }

        let mut gaps: Vec<Duration> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
        gaps.sort();
        Some(Frequency::Fixed(gaps[gaps.len() / 2]))
    }

    /// Timestamp one step after `from`
    pub fn advance(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Frequency::Fixed(step) => from.checked_add_signed(step),
            Frequency::Months { step, month_end } => {
                let next = from.checked_add_months(Months::new(step))?;
                if !month_end {
                    return Some(next);
                }
                let last_day = last_day_of_month(next.year(), next.month())?;
                next.with_day(last_day)
            }
        }
    }
}

fn months_between(a: DateTime<Utc>, b: DateTime<Utc>) -> i32 {
    (b.year() - a.year()) * 12 + b.month() as i32 - a.month() as i32
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|d| d.day())
}

fn is_month_end(date: NaiveDate) -> bool {
    date.succ_opt().map_or(true, |next| next.month() != date.month())
}

/// Create future timestamps for forecasting
pub fn future_timestamps(
    last_timestamp: DateTime<Utc>,
    horizon: usize,
    frequency: Frequency,
) -> Result<Vec<DateTime<Utc>>> {
    let mut timestamps = Vec::with_capacity(horizon);
    let mut current = last_timestamp;

    for _ in 0..horizon {
        current = frequency.advance(current).ok_or_else(|| {
            ForecastError::invalid_parameter(
                Stage::Forecasting,
                format!("Timestamp overflow advancing from {}", current),
            )
        })?;
        timestamps.push(current);
    }

    Ok(timestamps)
}
