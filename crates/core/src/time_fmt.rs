// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UTC timestamp formatting for payloads and state filenames.
//!
//! Two variants of the same instant: RFC 3339 (`2020-01-01T00:00:00Z`)
//! inside JSON, and a colon-free form (`2020-01-01T00-00-00Z`) for file
//! names, where colons are not portable.

use chrono::{DateTime, NaiveDateTime, Utc};

const JSON_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const FILENAME_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";

/// Format a UTC instant for JSON payloads: `yyyy-MM-ddTHH:mm:ssZ`.
pub fn format_utc(t: DateTime<Utc>) -> String {
    t.format(JSON_FORMAT).to_string()
}

/// Format a UTC instant for state filenames: `yyyy-MM-ddTHH-mm-ssZ`.
pub fn format_utc_filename(t: DateTime<Utc>) -> String {
    t.format(FILENAME_FORMAT).to_string()
}

/// Parse the colon-free filename variant back into a UTC instant.
///
/// Returns `None` for anything that does not match the filename format
/// exactly.
pub fn parse_filename_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, FILENAME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
