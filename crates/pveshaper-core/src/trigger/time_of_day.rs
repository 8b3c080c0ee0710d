use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::CoreError;

/// A wall-clock minute of the day, `00:00` through `23:59`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, CoreError> {
        if hour > 23 {
            return Err(malformed(&format!("{hour}:{minute:02}"), "hour must be 0-23"));
        }
        if minute > 59 {
            return Err(malformed(&format!("{hour}:{minute:02}"), "minute must be 0-59"));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }
}

fn malformed(input: &str, reason: &str) -> CoreError {
    CoreError::MalformedSchedule {
        input: input.to_owned(),
        reason: reason.to_owned(),
    }
}

fn parse_field(input: &str, field: &str, what: &str) -> Result<u8, CoreError> {
    if field.is_empty() || field.len() > 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(input, &format!("{what} must be one or two digits")));
    }
    field
        .parse()
        .map_err(|_| malformed(input, &format!("invalid {what}")))
}

impl FromStr for TimeOfDay {
    type Err = CoreError;

    /// Parse `HH:MM` (24-hour). Single-digit fields such as `7:05` are
    /// accepted; seconds, signs and whitespace are not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| malformed(s, "expected HH:MM"))?;
        let hour = parse_field(s, hour, "hour")?;
        let minute = parse_field(s, minute, "minute")?;
        Self::new(hour, minute).map_err(|e| match e {
            CoreError::MalformedSchedule { reason, .. } => malformed(s, &reason),
            other => other,
        })
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
