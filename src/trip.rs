//! Core record type for the trip log
//!
//! A `Trip` is a value: start point and time, end point and time, and the
//! distance travelled in metres. Once a trip is placed in an index only its
//! free-text note may change. Indexes order trips solely by `start_time`.

use crate::error::{TripError, TripResult};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

/// A geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check that both components are finite and within WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle (haversine) distance to another location, in metres
    pub fn distance_to(&self, other: &Location) -> f64 {
        Haversine::distance(self.point(), other.point())
    }

    /// As a geo point (x = longitude, y = latitude)
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// A single recorded trip
///
/// Serialized as `{start, startDate, end, endDate, distance}` plus an
/// optional `note`. Timestamps are written as RFC 3339 and read from either
/// RFC 3339 strings or Unix epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub start: Location,
    #[serde(rename = "startDate", with = "timestamp")]
    pub start_time: DateTime<Utc>,
    pub end: Location,
    #[serde(rename = "endDate", with = "timestamp")]
    pub end_time: DateTime<Utc>,
    /// Distance travelled in metres
    pub distance: f64,
    /// Free-text annotation attached after the trip was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Trip {
    /// Create a validated trip
    pub fn new(
        start: Location,
        start_time: DateTime<Utc>,
        end: Location,
        end_time: DateTime<Utc>,
        distance: f64,
    ) -> TripResult<Self> {
        let trip = Self {
            start,
            start_time,
            end,
            end_time,
            distance,
            note: None,
        };
        trip.validate()?;
        Ok(trip)
    }

    /// Create a trip whose distance is the straight-line distance between its endpoints
    pub fn between(
        start: Location,
        start_time: DateTime<Utc>,
        end: Location,
        end_time: DateTime<Utc>,
    ) -> TripResult<Self> {
        let distance = start.distance_to(&end);
        Self::new(start, start_time, end, end_time, distance)
    }

    /// Builder: attach a note
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Check the record invariants
    ///
    /// Deserialized trips are not validated automatically; the loader calls
    /// this for every entry so it can report the offending position.
    pub fn validate(&self) -> TripResult<()> {
        if self.end_time < self.start_time {
            return Err(TripError::InvalidTrip(format!(
                "end time {} precedes start time {}",
                self.end_time.to_rfc3339(),
                self.start_time.to_rfc3339()
            )));
        }
        if !self.distance.is_finite() || self.distance < 0.0 {
            return Err(TripError::InvalidTrip(format!(
                "distance must be a non-negative number, got {}",
                self.distance
            )));
        }
        if !self.start.is_valid() || !self.end.is_valid() {
            return Err(TripError::InvalidTrip(
                "coordinates out of range".to_string(),
            ));
        }
        Ok(())
    }

    /// Elapsed time between start and end
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Calendar day the trip started on, in the given offset
    pub fn day(&self, offset: FixedOffset) -> NaiveDate {
        self.start_time.with_timezone(&offset).date_naive()
    }
}

/// Serde adapter for trip timestamps
///
/// Writes RFC 3339. Reads RFC 3339 strings or Unix epoch seconds
/// (integer or fractional).
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Epoch(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| D::Error::custom(format!("invalid timestamp {:?}: {}", s, e))),
            RawTimestamp::Epoch(secs) => from_epoch(secs)
                .ok_or_else(|| D::Error::custom(format!("epoch timestamp out of range: {}", secs))),
        }
    }

    fn from_epoch(secs: f64) -> Option<DateTime<Utc>> {
        if !secs.is_finite() {
            return None;
        }
        let whole = secs.floor();
        let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole as i64, nanos)
    }
}
