//! Range iteration over an index
//!
//! `RangeIter` walks day buckets newest first and yields the trips whose
//! start time falls in `[start, end)`. It borrows the index it reads, so the
//! index cannot be mutated while an iterator is alive.

use crate::index::bucket::DayBucket;
use crate::trip::Trip;
use chrono::{DateTime, Utc};
use std::collections::vec_deque;
use std::iter::FusedIterator;

/// Lazy, forward-only iterator over the trips of a time window, most recent first
///
/// Not restartable: build a new one from the index to scan again.
pub struct RangeIter<'a> {
    days: Box<dyn Iterator<Item = &'a DayBucket> + 'a>,
    trips: Option<vec_deque::Iter<'a, Trip>>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    done: bool,
}

impl<'a> RangeIter<'a> {
    /// `days` must yield buckets newest first, beginning at or before the
    /// first bucket that can hold a trip earlier than `end`.
    pub(crate) fn new(
        days: impl Iterator<Item = &'a DayBucket> + 'a,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            days: Box::new(days),
            trips: None,
            start,
            end,
            done: start >= end,
        }
    }

    /// An iterator that yields nothing
    pub(crate) fn empty(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let mut iter = Self::new(std::iter::empty(), start, end);
        iter.done = true;
        iter
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

impl<'a> Iterator for RangeIter<'a> {
    type Item = &'a Trip;

    fn next(&mut self) -> Option<&'a Trip> {
        if self.done {
            return None;
        }

        loop {
            if let Some(trips) = self.trips.as_mut() {
                for trip in trips.by_ref() {
                    if trip.start_time >= self.end {
                        continue;
                    }
                    if trip.start_time < self.start {
                        // Everything after this is older still
                        self.done = true;
                        return None;
                    }
                    return Some(trip);
                }
            }

            match self.days.next() {
                Some(day) => self.trips = Some(day.iter()),
                None => {
                    self.done = true;
                    self.trips = None;
                    return None;
                }
            }
        }
    }
}

impl FusedIterator for RangeIter<'_> {}

impl std::fmt::Debug for RangeIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeIter")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("done", &self.done)
            .finish()
    }
}
