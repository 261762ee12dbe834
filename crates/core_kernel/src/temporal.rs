//! Clock and timezone handling
//!
//! Billing rules are expressed in calendar days (due dates, days overdue),
//! so the engine never reads the system time directly. It asks a [`Clock`],
//! which the server wires to [`SystemClock`] and tests pin with [`FixedClock`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use std::sync::RwLock;
use thiserror::Error;

/// Timezone wrapper for the utility's operating region
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Returns the local calendar date of a UTC instant
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| TemporalError::UnknownTimezone(s.to_string()))
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Date out of range: {0}")]
    OutOfRange(String),
}

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Timezone used to derive calendar dates
    fn timezone(&self) -> Timezone;

    /// Current local calendar date
    fn today(&self) -> NaiveDate {
        self.timezone().local_date(self.now())
    }
}

/// Wall-clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    timezone: Timezone,
}

impl SystemClock {
    pub fn new(timezone: Timezone) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn timezone(&self) -> Timezone {
        self.timezone
    }
}

/// A clock frozen at a given instant, advanced explicitly
#[derive(Debug)]
pub struct FixedClock {
    instant: RwLock<DateTime<Utc>>,
    timezone: Timezone,
}

impl FixedClock {
    /// Creates a clock frozen at `instant` (UTC)
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            instant: RwLock::new(instant),
            timezone: Timezone::default(),
        }
    }

    /// Creates a clock frozen at noon UTC of the given date
    pub fn on(date: NaiveDate) -> Self {
        let noon = date
            .and_hms_opt(12, 0, 0)
            .unwrap_or_default()
            .and_utc();
        Self::at(noon)
    }

    /// Moves the clock forward by whole days
    pub fn advance_days(&self, days: i64) {
        let mut instant = self.instant.write().unwrap_or_else(|e| e.into_inner());
        *instant += Duration::days(days);
    }

    /// Pins the clock to a new instant
    pub fn set(&self, new_instant: DateTime<Utc>) {
        let mut instant = self.instant.write().unwrap_or_else(|e| e.into_inner());
        *instant = new_instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.read().unwrap_or_else(|e| e.into_inner())
    }

    fn timezone(&self) -> Timezone {
        self.timezone
    }
}
