// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Wall-clock helpers: time-of-day values and the configured zone

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::WatchError;

/// A time of day with minute resolution, written as `"HH:MM"` in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u32,
    minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, WatchError> {
        if hour > 23 || minute > 59 {
            return Err(WatchError::Config(format!(
                "clock time out of range: {:02}:{:02}",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    /// Constant constructor for values known to be in range
    pub(crate) const fn at(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    /// Minutes elapsed since midnight
    pub fn minute_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn as_naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or_default()
    }

    pub fn of(local: &NaiveDateTime) -> Self {
        Self {
            hour: local.hour(),
            minute: local.minute(),
        }
    }
}

impl FromStr for ClockTime {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| WatchError::Config(format!("expected HH:MM, got {:?}", s)))?;
        let hour = h
            .parse()
            .map_err(|_| WatchError::Config(format!("bad hour in {:?}", s)))?;
        let minute = m
            .parse()
            .map_err(|_| WatchError::Config(format!("bad minute in {:?}", s)))?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = WatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Zone used to turn instants into local wall-clock readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zone {
    Named(Tz),
    System,
}

impl Zone {
    /// Resolve a configured zone name. Unknown names fall back to the system zone.
    pub fn from_name(name: Option<&str>) -> Self {
        let Some(name) = name.map(|n| n.trim_matches(|c: char| c == '\'' || c == '"').trim()) else {
            warn!("No timezone set. Using the server's local time; consider setting TIMEZONE");
            return Zone::System;
        };
        if name.is_empty() {
            warn!("No timezone set. Using the server's local time; consider setting TIMEZONE");
            return Zone::System;
        }

        match name.parse::<Tz>() {
            Ok(tz) => {
                if name.eq_ignore_ascii_case("UTC") {
                    warn!("Timezone is set to UTC. Consider setting a more specific timezone");
                }
                Zone::Named(tz)
            }
            Err(e) => {
                error!("Invalid timezone {:?}: {}. Using the server's local time", name, e);
                Zone::System
            }
        }
    }

    /// Local wall-clock reading of an instant
    pub fn local_time(&self, at: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Zone::Named(tz) => at.with_timezone(tz).naive_local(),
            Zone::System => at.with_timezone(&Local).naive_local(),
        }
    }

    /// Earliest instant matching a local reading; `None` inside a DST gap
    pub fn resolve(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Zone::Named(tz) => tz
                .from_local_datetime(&local)
                .earliest()
                .map(|d| d.with_timezone(&Utc)),
            Zone::System => Local
                .from_local_datetime(&local)
                .earliest()
                .map(|d| d.with_timezone(&Utc)),
        }
    }
}
