//! Acquisition time resolution.
//!
//! QUBE labels carry start/stop times as day-of-year UTC strings
//! (`YYYY-DDDThh:mm:ss.ffffffZ`). Structured labels resolve them while the
//! label is parsed; flat labels keep the raw text until a [`TimeInfo`] is
//! requested.

use chrono::{Datelike, NaiveDateTime};

use crate::error::{Error, Result};

/// Day-of-year timestamp format shared by both label dialects.
const DOY_FORMAT: &str = "%Y-%jT%H:%M:%S%.f";

/// A start/stop timestamp in its native label representation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTime {
    /// Already resolved to UTC (structured label strategy).
    Utc(NaiveDateTime),
    /// Day-of-year text, trailing `Z` included (line-oriented strategy).
    Doy(String),
}

impl RawTime {
    /// Resolve to a UTC timestamp.
    ///
    /// Day-of-year text must match `YYYY-DDDThh:mm:ss.ffffffZ` exactly;
    /// anything else is a [`Error::MalformedTimestamp`].
    pub fn resolve(&self) -> Result<NaiveDateTime> {
        match self {
            RawTime::Utc(t) => Ok(*t),
            RawTime::Doy(text) => {
                let bare = text
                    .strip_suffix('Z')
                    .ok_or_else(|| Error::MalformedTimestamp(text.clone()))?;
                NaiveDateTime::parse_from_str(bare, DOY_FORMAT)
                    .map_err(|_| Error::MalformedTimestamp(text.clone()))
            }
        }
    }
}

/// Lenient day-of-year parse used while scanning label values, where the
/// trailing `Z` is sometimes absent. Returns `None` on any mismatch.
pub(crate) fn parse_doy_timestamp(text: &str) -> Option<NaiveDateTime> {
    let bare = text.strip_suffix('Z').unwrap_or(text);
    NaiveDateTime::parse_from_str(bare, DOY_FORMAT).ok()
}

/// Resolved acquisition time of a cube.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeInfo {
    /// UTC midpoint of the acquisition, `start + (stop - start) / 2`.
    pub midpoint: NaiveDateTime,
    /// Calendar year of the midpoint.
    pub year: i32,
    /// Day of year of the midpoint (1-based).
    pub day_of_year: u32,
    /// `year + (day_of_year - 1) / 365`.
    ///
    /// The 365-day divisor ignores leap years. This matches the convention
    /// every downstream consumer of these products compares against, so it
    /// is kept as-is.
    pub decimal_year: f64,
    /// Midpoint date formatted `YYYY/MM/DD`.
    pub calendar_date: String,
}

impl TimeInfo {
    /// Resolve start/stop timestamps into the acquisition midpoint record.
    pub fn from_span(start: &RawTime, stop: &RawTime) -> Result<TimeInfo> {
        let start = start.resolve()?;
        let stop = stop.resolve()?;
        let midpoint = start + (stop - start) / 2;

        let year = midpoint.year();
        let day_of_year = midpoint.ordinal();
        let decimal_year = f64::from(year) + f64::from(day_of_year - 1) / 365.0;

        Ok(TimeInfo {
            midpoint,
            year,
            day_of_year,
            decimal_year,
            calendar_date: midpoint.format("%Y/%m/%d").to_string(),
        })
    }

    /// Midpoint formatted as an ISO-style UTC string with microseconds.
    pub fn utc(&self) -> String {
        self.midpoint.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}
