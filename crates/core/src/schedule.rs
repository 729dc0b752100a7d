// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Association schedule expressions: `rate(...)` and `cron(...)`.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from parsing a schedule expression.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("empty schedule expression")]
    Empty,
    #[error("invalid rate expression '{0}': {1}")]
    InvalidRate(String, String),
    #[error("invalid cron expression '{0}': {1}")]
    InvalidCron(String, String),
    #[error("unrecognized schedule expression: {0}")]
    Unrecognized(String),
}

/// A parsed schedule expression.
///
/// `rate(N unit)` fires at a fixed interval measured from the previous
/// evaluation; `cron(...)` fires on calendar boundaries. The original
/// text is retained for serialization and display.
#[derive(Debug, Clone)]
pub enum ScheduleExpression {
    Rate {
        interval: Duration,
        expression: String,
    },
    Cron {
        schedule: Box<Schedule>,
        expression: String,
    },
}

impl ScheduleExpression {
    pub fn parse(s: &str) -> Result<Self, ScheduleError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ScheduleError::Empty);
        }

        if let Some(inner) = strip_call(trimmed, "rate") {
            let interval = parse_rate(inner)
                .map_err(|e| ScheduleError::InvalidRate(trimmed.to_string(), e))?;
            return Ok(ScheduleExpression::Rate {
                interval,
                expression: trimmed.to_string(),
            });
        }

        if let Some(inner) = strip_call(trimmed, "cron") {
            // Standard 5-field expressions get a seconds column prepended;
            // 6/7-field expressions pass through as-is.
            let fields = inner.split_whitespace().count();
            let normalized = if fields == 5 {
                format!("0 {}", inner)
            } else {
                inner.to_string()
            };
            let schedule = Schedule::from_str(&normalized)
                .map_err(|e| ScheduleError::InvalidCron(trimmed.to_string(), e.to_string()))?;
            return Ok(ScheduleExpression::Cron {
                schedule: Box::new(schedule),
                expression: trimmed.to_string(),
            });
        }

        Err(ScheduleError::Unrecognized(trimmed.to_string()))
    }

    /// Next fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleExpression::Rate { interval, .. } => {
                let delta = chrono::Duration::from_std(*interval).ok()?;
                Some(after + delta)
            }
            ScheduleExpression::Cron { schedule, .. } => schedule.after(&after).next(),
        }
    }

    /// The fixed interval, for rate expressions only.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            ScheduleExpression::Rate { interval, .. } => Some(*interval),
            ScheduleExpression::Cron { .. } => None,
        }
    }

    pub fn is_rate(&self) -> bool {
        matches!(self, ScheduleExpression::Rate { .. })
    }

    pub fn as_str(&self) -> &str {
        match self {
            ScheduleExpression::Rate { expression, .. }
            | ScheduleExpression::Cron { expression, .. } => expression,
        }
    }
}

impl std::fmt::Display for ScheduleExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl serde::Serialize for ScheduleExpression {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for ScheduleExpression {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ScheduleExpression::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Strip `name(inner)` and return `inner`.
fn strip_call<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

/// Parse the body of a rate expression: `"5 minutes"`, `"1 hour"`,
/// `"30 seconds"`, `"7 days"`.
fn parse_rate(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty rate body".to_string());
    }

    // Find the numeric prefix
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in rate: {}", s))?;
    if num == 0 {
        return Err("rate interval must be positive".to_string());
    }

    let multiplier = match suffix.trim() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        other => return Err(format!("unknown rate unit: {}", other)),
    };

    Ok(Duration::from_secs(num * multiplier))
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
