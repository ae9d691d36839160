use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        // The server hands these out as numbers in some payloads and strings in others.
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Text(String),
                    Int(i64),
                    Uint(u64),
                }

                Ok(match Raw::deserialize(deserializer)? {
                    Raw::Text(value) => Self(value),
                    Raw::Int(value) => Self(value.to_string()),
                    Raw::Uint(value) => Self(value.to_string()),
                })
            }
        }
    };
}

id_newtype!(AlbumId);
id_newtype!(ImageId);

/// Canonical form of an event bucket's date.
///
/// Date-times are converted to UTC and truncated to the calendar day, plain
/// `YYYY-MM-DD` dates are kept, anything else is kept as its trimmed text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedDate(String);

impl NormalizedDate {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Self::from_day(instant.with_timezone(&Utc).date_naive());
        }
        if let Ok(instant) = raw.parse::<DateTime<Utc>>() {
            return Self::from_day(instant.date_naive());
        }
        if let Ok(local) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Self::from_day(local.date());
        }
        if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Self::from_day(day);
        }

        Self(raw.to_string())
    }

    pub fn from_day(day: NaiveDate) -> Self {
        Self(day.format("%Y-%m-%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an event bucket within one album.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub event: String,
    pub date: NormalizedDate,
}

impl EventKey {
    pub fn new(event: impl Into<String>, raw_date: &str) -> Self {
        Self {
            event: event.into(),
            date: NormalizedDate::parse(raw_date),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.event, self.date)
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
