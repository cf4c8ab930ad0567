//! Trip Index Structures
//!
//! Two interchangeable indexes over trips, both partitioned by calendar day
//! and ordered newest first:
//!
//! - **CalendarIndex**: year → month → day → trips, scanned linearly per level
//! - **DayIndex**: a flat array of day buckets located by binary search
//!
//! Both expose the same sectioned-list contract through [`TripIndex`]: a
//! *section* is one day bucket, a *row* is one trip within it. Section 0 is
//! the most recent day and row 0 the most recent trip of that day.
//!
//! # Architecture
//!
//! ```text
//! CalendarIndex                       DayIndex
//!   2021 ─┬─ 07 ─┬─ 24 [11:00, 09:00]   [07-24, 06-20, 06-15, 2020-01-01]
//!         │      └─ 03 [..]               binary search on date
//!         └─ 06 ─┬─ 20 [..]
//!                └─ 15 [..]
//!   2020 ─── 01 ─── 01 [..]
//! ```
//!
//! The two variants deliberately differ in how they treat out-of-range
//! reads and dates outside the indexed span; see each type's docs.

mod bucket;
mod calendar;
mod flat;
mod iter;

pub use bucket::{CalendarKey, Counts, Delta, DayBucket, Keyed, Slot};
pub use calendar::{Branch, CalendarIndex, Month, MonthBucket, Node, Year, YearBucket};
pub use flat::DayIndex;
pub use iter::RangeIter;

use crate::trip::Trip;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Which index implementation backs a trip log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Flat day-bucket array with binary search
    #[default]
    Flat,
    /// Year/month/day hierarchy
    Calendar,
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexKind::Flat => write!(f, "flat"),
            IndexKind::Calendar => write!(f, "calendar"),
        }
    }
}

impl std::str::FromStr for IndexKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" => Ok(IndexKind::Flat),
            "calendar" => Ok(IndexKind::Calendar),
            other => Err(format!("unknown index variant: {}", other)),
        }
    }
}

/// The sectioned-list contract shared by both index variants
///
/// Callers serialize all access: an index is owned by one logical writer,
/// and the borrow held by a [`RangeIter`] rules out mutation mid-iteration.
pub trait TripIndex {
    /// Create an empty index whose calendar days are taken in `offset`
    fn with_offset(offset: FixedOffset) -> Self
    where
        Self: Sized;

    /// Build an index by inserting every trip
    fn from_trips(trips: impl IntoIterator<Item = Trip>, offset: FixedOffset) -> Self
    where
        Self: Sized,
    {
        let mut index = Self::with_offset(offset);
        for trip in trips {
            index.insert(trip);
        }
        index
    }

    /// Offset that defines calendar days for bucketing
    fn offset(&self) -> FixedOffset;

    fn trip_count(&self) -> usize;

    /// Number of non-empty day buckets
    fn section_count(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.trip_count() == 0
    }

    /// Append a trip that starts no earlier than any trip already indexed
    ///
    /// Returns `true` if a new section was created. A trip older than the
    /// current newest is placed with [`TripIndex::insert`] instead.
    fn add(&mut self, trip: Trip) -> bool;

    /// Place a trip at its sorted position; returns `true` if a new section was created
    fn insert(&mut self, trip: Trip) -> bool;

    /// Remove the trip at `(row, section)`
    ///
    /// Returns `false` and leaves the index untouched if either coordinate
    /// is out of range. An emptied day bucket is pruned.
    fn remove(&mut self, row: usize, section: usize) -> bool;

    /// Day bucket for a section
    fn section(&self, section: usize) -> Option<&DayBucket>;

    /// Trip at `(row, section)`
    fn get(&self, row: usize, section: usize) -> Option<&Trip> {
        self.section(section)?.get(row)
    }

    /// List coordinates at which a trip starting at `at` is, or would be, shown
    fn row_and_section_for(&self, at: DateTime<Utc>) -> (usize, usize);

    /// All day buckets, newest first
    fn days(&self) -> Box<dyn Iterator<Item = &DayBucket> + '_>;

    /// Trips starting in `[start, end)`, newest first
    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> RangeIter<'_>;

    /// All trips, newest first
    fn trips(&self) -> Box<dyn Iterator<Item = &Trip> + '_> {
        Box::new(self.days().flat_map(|day| day.iter()))
    }

    /// Most recent trip
    fn newest(&self) -> Option<&Trip> {
        self.days().next().and_then(DayBucket::first)
    }

    /// Earliest trip
    fn oldest(&self) -> Option<&Trip>;

    /// Summary over every indexed trip
    fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            trip_count: self.trip_count(),
            section_count: self.section_count(),
            newest: self.newest().map(|t| t.start_time),
            oldest: self.oldest().map(|t| t.start_time),
            ..IndexStats::default()
        };
        for trip in self.trips() {
            stats.total_distance += trip.distance;
            stats.total_duration = stats.total_duration + trip.duration();
        }
        stats
    }
}

/// Statistics about an index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub trip_count: usize,
    pub section_count: usize,
    /// Sum of trip distances in metres
    pub total_distance: f64,
    pub total_duration: Duration,
    pub newest: Option<DateTime<Utc>>,
    pub oldest: Option<DateTime<Utc>>,
}

impl Default for IndexStats {
    fn default() -> Self {
        Self {
            trip_count: 0,
            section_count: 0,
            total_distance: 0.0,
            total_duration: Duration::zero(),
            newest: None,
            oldest: None,
        }
    }
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trips: {}, Days: {}, Distance: {:.2} km, Time: {}h {}m",
            self.trip_count,
            self.section_count,
            self.total_distance / 1000.0,
            self.total_duration.num_hours(),
            self.total_duration.num_minutes() % 60
        )
    }
}
