//! Time points and ledger date parsing
//!
//! History entries carry their timestamp as a `"%Y-%m-%d %H:%M:%S"` string.
//! Comparisons happen on [`TimePoint`], seconds since the Unix epoch. Date
//! strings are interpreted as UTC so that the same ledger produces the same
//! time points on every host.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format of date strings in history entries
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A point in time, in whole seconds since the Unix epoch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TimePoint(i64);

impl TimePoint {
    /// Create from seconds since the Unix epoch
    pub fn from_timestamp(secs: i64) -> Self {
        Self(secs)
    }

    /// Seconds since the Unix epoch
    pub fn timestamp(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::from_timestamp(self.0, 0) {
            Some(dt) => write!(f, "{}", dt.format(DATE_FORMAT)),
            None => write!(f, "@{}", self.0),
        }
    }
}

/// Parse a ledger date string into a [`TimePoint`]
pub fn parse_date(s: &str) -> Result<TimePoint> {
    let dt = NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| Error::Decode(format!("invalid date {:?}: {}", s, e)))?;
    Ok(TimePoint(dt.and_utc().timestamp()))
}
