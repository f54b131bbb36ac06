/*
    spotify-tracker-rs | Rust client for Spotify profile and listening history.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Wall-clock layouts accepted for the date filter, most specific first.
const LOCAL_DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Filter input exactly as the user typed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFilter {
    pub date: String,
    pub artist: String,
    pub album: String,
}

/// Normalized listening-history constraints.
///
/// Every field is either absent or holds a non-empty value, so an absent
/// field can never reach the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    date: Option<DateTime<Utc>>,
    artist: Option<String>,
    album: Option<String>,
}

impl QueryFilter {
    /// Normalizes raw input, reading the date in the machine's local timezone.
    pub fn from_raw(raw: &RawFilter) -> Self {
        Self::from_raw_in(raw, &Local)
    }

    /// Normalizes raw input, reading the date as wall-clock time in `tz`.
    pub fn from_raw_in<Tz: TimeZone>(raw: &RawFilter, tz: &Tz) -> Self {
        Self {
            date: parse_local_datetime(&raw.date, tz),
            artist: non_blank(&raw.artist),
            album: non_blank(&raw.album),
        }
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.artist.is_none() && self.album.is_none()
    }

    /// Query parameters for the present fields only, in `date`, `artist`, `album` order.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(3);
        if let Some(date) = self.date {
            params.push(("date", format_instant(date)));
        }
        if let Some(artist) = &self.artist {
            params.push(("artist", artist.clone()));
        }
        if let Some(album) = &self.album {
            params.push(("album", album.clone()));
        }
        params
    }
}

/// Converts a wall-clock date/time in `tz` into an absolute instant.
///
/// Input that already carries an offset (RFC 3339) is taken as-is. A bare
/// date means local midnight. Empty, unparseable, or nonexistent local times
/// (DST gaps) yield `None`; ambiguous ones resolve to the earlier instant.
pub fn parse_local_datetime<Tz: TimeZone>(input: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Some(instant.with_timezone(&Utc));
    }

    let naive = LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-01-01T09:00:00.000Z`.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
