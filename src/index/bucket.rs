//! Day buckets and the ordered-sibling utilities shared by both indexes
//!
//! Every level of the trip index is an ordered list of siblings keyed by a
//! calendar component and kept in descending key order (newest first). The
//! helpers here locate a key in such a list and describe how a mutation
//! changed the cached trip/section counts so ancestors can apply the same
//! change.

use crate::trip::Trip;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::vec_deque;
use std::collections::VecDeque;
use std::fmt;

/// A calendar component a bucket is keyed by
pub trait CalendarKey: Copy + Ord + fmt::Debug {
    /// Extract this component from a calendar date
    fn of(date: NaiveDate) -> Self;
}

impl CalendarKey for NaiveDate {
    fn of(date: NaiveDate) -> Self {
        date
    }
}

/// The root of a hierarchy has a single, unit key
impl CalendarKey for () {
    fn of(_date: NaiveDate) -> Self {}
}

/// A node that sorts among its siblings by a calendar key
pub trait Keyed {
    type Key: CalendarKey;

    fn key(&self) -> Self::Key;
}

/// Result of looking a key up in a descending sibling list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// A sibling with this key exists at the position
    Occupied(usize),
    /// No sibling has this key; inserting at the position keeps the order
    Vacant(usize),
}

impl Slot {
    /// Position of the match, or of the first older sibling
    pub fn position(self) -> usize {
        match self {
            Slot::Occupied(i) | Slot::Vacant(i) => i,
        }
    }
}

/// Linear scan of a newest-first sibling list
///
/// Branching is small at the month and day levels (at most 12 and 31), so a
/// scan beats a search there.
pub fn locate<T: Keyed>(siblings: &VecDeque<T>, key: T::Key) -> Slot {
    let mut i = 0;
    while i < siblings.len() && key < siblings[i].key() {
        i += 1;
    }
    match siblings.get(i) {
        Some(sibling) if sibling.key() == key => Slot::Occupied(i),
        _ => Slot::Vacant(i),
    }
}

/// Cached sizes of a subtree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Trips reachable from the node
    pub trips: usize,
    /// Non-empty day buckets reachable from the node
    pub sections: usize,
}

impl Counts {
    /// Apply a structural change reported by a child
    pub fn apply(&mut self, delta: Delta) {
        match delta {
            Delta::Inserted { new_section } => {
                self.trips += 1;
                if new_section {
                    self.sections += 1;
                }
            }
            Delta::Removed { pruned_section } => {
                self.trips -= 1;
                if pruned_section {
                    self.sections -= 1;
                }
            }
        }
    }
}

/// How one mutation changed the counts of every ancestor on its path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    /// One trip was placed; `new_section` if a day bucket was created for it
    Inserted { new_section: bool },
    /// One trip was taken out; `pruned_section` if its day bucket emptied
    Removed { pruned_section: bool },
}

impl Delta {
    /// Whether the list view gained or lost a section
    pub fn section_changed(self) -> bool {
        match self {
            Delta::Inserted { new_section } => new_section,
            Delta::Removed { pruned_section } => pruned_section,
        }
    }
}

/// All trips that started on one calendar day, newest first
///
/// Trips with identical start times keep their insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    date: NaiveDate,
    trips: VecDeque<Trip>,
}

impl DayBucket {
    /// Create a bucket holding a single trip
    pub fn new(date: NaiveDate, trip: Trip) -> Self {
        let mut trips = VecDeque::with_capacity(4);
        trips.push_back(trip);
        Self { date, trips }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Trip at `row`, row 0 being the most recent
    pub fn get(&self, row: usize) -> Option<&Trip> {
        self.trips.get(row)
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, Trip> {
        self.trips.iter()
    }

    pub fn first(&self) -> Option<&Trip> {
        self.trips.front()
    }

    pub fn last(&self) -> Option<&Trip> {
        self.trips.back()
    }

    /// Copy the trips out, newest first
    pub fn to_vec(&self) -> Vec<Trip> {
        self.trips.iter().cloned().collect()
    }

    /// Place a trip at its sorted position
    pub fn insert(&mut self, trip: Trip) {
        let row = self
            .trips
            .partition_point(|t| t.start_time >= trip.start_time);
        self.trips.insert(row, trip);
    }

    /// Place a trip expected to be the newest in the bucket
    ///
    /// Falls back to a sorted insert when it is not strictly newer than the
    /// current head, which keeps ties in insertion order.
    pub fn push_newest(&mut self, trip: Trip) {
        match self.trips.front() {
            Some(head) if trip.start_time <= head.start_time => self.insert(trip),
            _ => self.trips.push_front(trip),
        }
    }

    /// Remove the trip at `row`
    pub fn remove(&mut self, row: usize) -> Option<Trip> {
        self.trips.remove(row)
    }

    /// Number of trips that sort before `at`, i.e. started after it
    pub fn row_for(&self, at: DateTime<Utc>) -> usize {
        self.trips.partition_point(|t| t.start_time > at)
    }
}

impl Keyed for DayBucket {
    type Key = NaiveDate;

    fn key(&self) -> NaiveDate {
        self.date
    }
}

impl<'a> IntoIterator for &'a DayBucket {
    type Item = &'a Trip;
    type IntoIter = vec_deque::Iter<'a, Trip>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
