use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

/// RFC 3339 timestamp as used by the Compute Engine API and job payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub OffsetDateTime);

impl Timestamp {
    pub fn new(datetime: OffsetDateTime) -> Self {
        Self(datetime)
    }

    pub fn inner(&self) -> &OffsetDateTime {
        &self.0
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// Returns this timestamp shifted forward by `duration`.
    pub fn plus(&self, duration: Duration) -> Self {
        Self(self.0 + duration)
    }

    /// Elapsed time from `self` until `now`. Negative when `self` lies in the future.
    pub fn age_at(&self, now: Timestamp) -> Duration {
        now.0 - self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(&Rfc3339).map_err(|_| fmt::Error)?;
        write!(f, "{formatted}")
    }
}

impl FromStr for Timestamp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let datetime = OffsetDateTime::parse(s, &Rfc3339).map_err(|e| {
            CoreError::invalid_timestamp(format!("Failed to parse timestamp '{s}': {e}"))
        })?;
        Ok(Timestamp(datetime))
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(value: OffsetDateTime) -> Self {
        Self(value)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Timestamp::from_str(&s).map_err(serde::de::Error::custom)
    }
}

pub fn now_utc() -> Timestamp {
    Timestamp(OffsetDateTime::now_utc())
}
