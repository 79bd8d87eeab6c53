//! Cron-style cadence: "MIN HOUR DOM MON DOW".
//!
//! Minute and hour accept `*`, `*/N`, `N` and `a,b,c`. Day-of-month, month
//! and day-of-week must be `*`.

use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Timelike};

use pigeon_common::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cadence {
    expression: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
}

impl Cadence {
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the cadence fires at the minute containing `time`.
    pub fn matches<T: Timelike>(&self, time: &T) -> bool {
        self.minutes.contains(&time.minute()) && self.hours.contains(&time.hour())
    }

    /// First firing strictly after `after`, truncated to the minute.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        // Truncate on the instant, not the wall clock: an ambiguous local
        // time (DST fall-back) cannot be rebuilt from its fields.
        let start = after.clone() + Duration::minutes(1);
        let mut candidate = start.clone()
            - Duration::seconds(i64::from(start.second()))
            - Duration::nanoseconds(i64::from(start.nanosecond()));

        // Every hour/minute pair recurs daily; two days covers DST shifts.
        for _ in 0..(48 * 60) {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate = candidate + Duration::minutes(1);
        }

        None
    }
}

impl FromStr for Cadence {
    type Err = AppError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(AppError::Config(format!(
                "Invalid cron expression '{}' (need 5 fields: MIN HOUR DOM MON DOW)",
                expression
            )));
        }

        if parts[2..].iter().any(|field| *field != "*") {
            return Err(AppError::Config(format!(
                "Invalid cron expression '{}': day, month and weekday must be '*'",
                expression
            )));
        }

        let minutes = parse_field(parts[0], 0, 59).ok_or_else(|| {
            AppError::Config(format!("Invalid minute field '{}' in '{}'", parts[0], expression))
        })?;
        let hours = parse_field(parts[1], 0, 23).ok_or_else(|| {
            AppError::Config(format!("Invalid hour field '{}' in '{}'", parts[1], expression))
        })?;

        Ok(Self {
            expression: parts.join(" "),
            minutes,
            hours,
        })
    }
}

/// Parse a cron field into the sorted list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    if field == "*" {
        return Some((min..=max).collect());
    }

    // */N: every N
    if let Some(step) = field.strip_prefix("*/") {
        let n: u32 = step.parse().ok()?;
        if n == 0 {
            return None;
        }
        return Some((min..=max).step_by(n as usize).collect());
    }

    let mut values = field
        .split(',')
        .map(|s| s.trim().parse::<u32>().ok().filter(|v| (min..=max).contains(v)))
        .collect::<Option<Vec<u32>>>()?;
    values.sort_unstable();
    values.dedup();
    Some(values)
}
