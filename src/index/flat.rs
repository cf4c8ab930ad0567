//! Flat day-bucket index
//!
//! A single newest-first array of day buckets across all time. Lookups
//! binary-search the array by date, so placing a trip costs
//! O(log D + w) for D distinct days and w trips on the target day.

use crate::index::bucket::{Counts, DayBucket, Delta, Slot};
use crate::index::iter::RangeIter;
use crate::index::TripIndex;
use crate::trip::Trip;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::collections::VecDeque;

/// Day buckets in one array, newest day first
///
/// Reads are strict: an out-of-range section or row yields `None`. For a
/// date older than every bucket, [`TripIndex::row_and_section_for`] clamps
/// to the last trip of the last section.
#[derive(Debug, Clone)]
pub struct DayIndex {
    days: VecDeque<DayBucket>,
    counts: Counts,
    offset: FixedOffset,
}

impl Default for DayIndex {
    fn default() -> Self {
        Self::with_offset(Utc.fix())
    }
}

impl DayIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    fn search(&self, date: NaiveDate) -> Slot {
        match self.days.binary_search_by(|day| date.cmp(&day.date())) {
            Ok(i) => Slot::Occupied(i),
            Err(i) => Slot::Vacant(i),
        }
    }

    /// Position of the bucket for `at`'s day, or where it would be inserted
    ///
    /// `None` only when the index holds no buckets.
    pub fn get_index(&self, at: DateTime<Utc>) -> Option<usize> {
        if self.days.is_empty() {
            return None;
        }
        Some(self.search(self.date_of(at)).position())
    }

    /// Day buckets, newest first
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, DayBucket> {
        self.days.iter()
    }

    fn apply(&mut self, delta: Delta) -> bool {
        self.counts.apply(delta);
        delta.section_changed()
    }
}

impl TripIndex for DayIndex {
    fn with_offset(offset: FixedOffset) -> Self {
        Self {
            days: VecDeque::new(),
            counts: Counts::default(),
            offset,
        }
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn trip_count(&self) -> usize {
        self.counts.trips
    }

    fn section_count(&self) -> usize {
        self.counts.sections
    }

    fn add(&mut self, trip: Trip) -> bool {
        if let Some(newest) = self.newest() {
            if trip.start_time < newest.start_time {
                tracing::debug!(start = %trip.start_time, "Out-of-order add, inserting instead");
                return self.insert(trip);
            }
        }

        let date = trip.day(self.offset);
        let delta = match self.days.front_mut() {
            Some(head) if head.date() == date => {
                head.push_newest(trip);
                Delta::Inserted { new_section: false }
            }
            _ => {
                tracing::debug!(%date, "New day section");
                self.days.push_front(DayBucket::new(date, trip));
                Delta::Inserted { new_section: true }
            }
        };
        self.apply(delta)
    }

    fn insert(&mut self, trip: Trip) -> bool {
        let date = trip.day(self.offset);
        let delta = match self.search(date) {
            Slot::Occupied(i) => {
                self.days[i].insert(trip);
                Delta::Inserted { new_section: false }
            }
            Slot::Vacant(i) => {
                tracing::debug!(%date, section = i, "New day section");
                self.days.insert(i, DayBucket::new(date, trip));
                Delta::Inserted { new_section: true }
            }
        };
        self.apply(delta)
    }

    fn remove(&mut self, row: usize, section: usize) -> bool {
        let Some(day) = self.days.get_mut(section) else {
            tracing::warn!(
                section,
                sections = self.days.len(),
                "Couldn't remove: section out of range"
            );
            return false;
        };
        if day.remove(row).is_none() {
            tracing::warn!(row, section, rows = day.len(), "Couldn't remove: row out of range");
            return false;
        }

        let pruned_section = day.is_empty();
        if pruned_section {
            let date = day.date();
            self.days.remove(section);
            tracing::debug!(%date, "Pruned empty day section");
        }
        self.apply(Delta::Removed { pruned_section });
        true
    }

    fn section(&self, section: usize) -> Option<&DayBucket> {
        self.days.get(section)
    }

    fn row_and_section_for(&self, at: DateTime<Utc>) -> (usize, usize) {
        let Some(last) = self.days.back() else {
            return (0, 0);
        };
        match self.search(self.date_of(at)) {
            Slot::Occupied(i) => (self.days[i].row_for(at), i),
            // Older than every day: clamp to the very last trip
            Slot::Vacant(i) if i == self.days.len() => (last.len() - 1, i - 1),
            Slot::Vacant(i) => (0, i),
        }
    }

    fn days(&self) -> Box<dyn Iterator<Item = &DayBucket> + '_> {
        Box::new(self.days.iter())
    }

    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> RangeIter<'_> {
        let from = self.get_index(end).unwrap_or(0);
        RangeIter::new(self.days.range(from..), start, end)
    }

    fn oldest(&self) -> Option<&Trip> {
        self.days.back().and_then(DayBucket::last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::{assert_consistent, at, trip, utc};
    use chrono::Timelike;

    fn scenario_c() -> DayIndex {
        DayIndex::from_trips(
            vec![
                trip(2020, 1, 1, 12, 0),
                trip(2021, 6, 15, 8, 0),
                trip(2021, 6, 20, 18, 0),
            ],
            utc(),
        )
    }

    #[test]
    fn test_empty_index() {
        let index = DayIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.section_count(), 0);
        assert_eq!(index.get_index(at(2021, 1, 1, 0, 0)), None);
        assert!(index.section(0).is_none());
        assert!(index.get(0, 0).is_none());
        assert_eq!(index.row_and_section_for(at(2021, 1, 1, 0, 0)), (0, 0));
        assert_eq!(index.range(at(2000, 1, 1, 0, 0), at(2030, 1, 1, 0, 0)).count(), 0);
    }

    #[test]
    fn test_insert_single_trip() {
        let mut index = DayIndex::new();
        assert!(index.insert(trip(2021, 7, 24, 10, 0)));

        assert_eq!(index.trip_count(), 1);
        assert_eq!(index.section_count(), 1);
        assert_eq!(index.get(0, 0).unwrap().start_time, at(2021, 7, 24, 10, 0));
    }

    #[test]
    fn test_same_day_newest_first() {
        let mut index = DayIndex::new();
        index.insert(trip(2021, 7, 24, 9, 0));
        assert!(!index.insert(trip(2021, 7, 24, 11, 0)));

        assert_eq!(index.section_count(), 1);
        assert_eq!(index.trip_count(), 2);
        assert_eq!(index.get(0, 0).unwrap().start_time.hour(), 11);
        assert_eq!(index.get(1, 0).unwrap().start_time.hour(), 9);
    }

    #[test]
    fn test_days_sorted_newest_first() {
        let index = scenario_c();
        assert_consistent(&index);
        assert_eq!(index.section_count(), 3);

        let dates: Vec<String> = index.iter().map(|d| d.date().to_string()).collect();
        assert_eq!(dates, vec!["2021-06-20", "2021-06-15", "2020-01-01"]);
    }

    #[test]
    fn test_add_in_order() {
        let mut index = DayIndex::new();
        assert!(index.add(trip(2021, 7, 23, 8, 0)));
        assert!(!index.add(trip(2021, 7, 23, 17, 0)));
        assert!(index.add(trip(2021, 7, 24, 8, 0)));

        assert_consistent(&index);
        assert_eq!(index.section_count(), 2);
        assert_eq!(index.get(0, 0).unwrap().start_time, at(2021, 7, 24, 8, 0));
        assert_eq!(index.get(0, 1).unwrap().start_time, at(2021, 7, 23, 17, 0));
    }

    #[test]
    fn test_add_out_of_order_still_sorted() {
        let mut index = DayIndex::new();
        index.add(trip(2021, 7, 24, 8, 0));
        assert!(index.add(trip(2021, 7, 20, 8, 0)));
        assert!(!index.add(trip(2021, 7, 24, 7, 0)));

        assert_consistent(&index);
        assert_eq!(index.get(1, 0).unwrap().start_time, at(2021, 7, 24, 7, 0));
    }

    #[test]
    fn test_remove_prunes_single_trip_day() {
        let mut index = scenario_c();
        assert!(index.remove(0, 0));

        assert_eq!(index.section_count(), 2);
        assert_eq!(index.trip_count(), 2);
        assert_eq!(index.section(0).unwrap().date().to_string(), "2021-06-15");
        assert_consistent(&index);
    }

    #[test]
    fn test_remove_keeps_non_empty_day() {
        let mut index = DayIndex::new();
        index.insert(trip(2021, 7, 24, 9, 0));
        index.insert(trip(2021, 7, 24, 11, 0));

        assert!(index.remove(0, 0));
        assert_eq!(index.section_count(), 1);
        assert_eq!(index.get(0, 0).unwrap().start_time.hour(), 9);
    }

    #[test]
    fn test_cached_counts_follow_mutations() {
        let mut index = scenario_c();
        index.add(trip(2021, 6, 20, 19, 0));
        index.insert(trip(2019, 2, 2, 9, 0));
        assert!(index.remove(0, 3));
        assert!(index.remove(1, 0));
        assert!(index.remove(0, 2));

        assert_eq!(index.counts.sections, index.days.len());
        assert_eq!(index.section_count(), 2);
        assert_eq!(index.trip_count(), 2);
        assert_consistent(&index);
    }

    #[test]
    fn test_remove_out_of_range_is_clean() {
        let mut index = scenario_c();
        assert!(!index.remove(0, 3));
        assert!(!index.remove(1, 0));
        assert_eq!(index.trip_count(), 3);
        assert_eq!(index.section_count(), 3);

        // Removing the same coordinates twice fails the second time
        let mut index = DayIndex::from_trips(vec![trip(2021, 7, 24, 9, 0)], utc());
        assert!(index.remove(0, 0));
        assert!(!index.remove(0, 0));
        assert_eq!(index.trip_count(), 0);
        assert_eq!(index.section_count(), 0);
    }

    #[test]
    fn test_get_out_of_range_is_none() {
        let index = scenario_c();
        assert!(index.section(3).is_none());
        assert!(index.get(0, 3).is_none());
        assert!(index.get(1, 0).is_none());
    }

    #[test]
    fn test_get_index() {
        let index = scenario_c();
        assert_eq!(index.get_index(at(2021, 6, 20, 0, 0)), Some(0));
        assert_eq!(index.get_index(at(2021, 7, 1, 0, 0)), Some(0));
        assert_eq!(index.get_index(at(2021, 6, 17, 0, 0)), Some(1));
        assert_eq!(index.get_index(at(2020, 1, 1, 23, 0)), Some(2));
        assert_eq!(index.get_index(at(2019, 1, 1, 0, 0)), Some(3));
    }

    #[test]
    fn test_row_and_section_for() {
        let mut index = scenario_c();
        index.insert(trip(2021, 6, 15, 12, 0));

        // Newer than everything
        assert_eq!(index.row_and_section_for(at(2022, 1, 1, 0, 0)), (0, 0));
        // Exact day: row counts trips that started later that day
        assert_eq!(index.row_and_section_for(at(2021, 6, 15, 10, 0)), (1, 1));
        assert_eq!(index.row_and_section_for(at(2021, 6, 15, 13, 0)), (0, 1));
        // Between days: first older section
        assert_eq!(index.row_and_section_for(at(2021, 1, 1, 0, 0)), (0, 2));
        // Older than everything: clamp to the last trip
        assert_eq!(index.row_and_section_for(at(2019, 1, 1, 0, 0)), (0, 2));
    }

    #[test]
    fn test_row_and_section_for_clamps_to_last_row() {
        let mut index = DayIndex::new();
        index.insert(trip(2021, 6, 15, 8, 0));
        index.insert(trip(2021, 6, 15, 9, 0));
        index.insert(trip(2021, 6, 15, 10, 0));

        assert_eq!(index.row_and_section_for(at(2021, 6, 1, 0, 0)), (2, 0));
    }

    #[test]
    fn test_range_iterator() {
        let index = scenario_c();
        let trips: Vec<_> = index
            .range(at(2021, 6, 1, 0, 0), at(2021, 7, 1, 0, 0))
            .map(|t| t.start_time)
            .collect();
        assert_eq!(trips, vec![at(2021, 6, 20, 18, 0), at(2021, 6, 15, 8, 0)]);
    }

    #[test]
    fn test_range_respects_exclusive_end_within_day() {
        let mut index = DayIndex::new();
        for h in [7, 9, 11, 13] {
            index.insert(trip(2021, 7, 24, h, 0));
        }

        let hours: Vec<u32> = index
            .range(at(2021, 7, 24, 9, 0), at(2021, 7, 24, 13, 0))
            .map(|t| t.start_time.hour())
            .collect();
        assert_eq!(hours, vec![11, 9]);
    }

    #[test]
    fn test_range_with_no_matches() {
        let index = scenario_c();
        assert_eq!(index.range(at(2021, 1, 1, 0, 0), at(2021, 6, 1, 0, 0)).count(), 0);
        assert_eq!(index.range(at(2022, 1, 1, 0, 0), at(2023, 1, 1, 0, 0)).count(), 0);
        // Inverted range
        assert_eq!(index.range(at(2022, 1, 1, 0, 0), at(2020, 1, 1, 0, 0)).count(), 0);
    }

    #[test]
    fn test_offset_moves_day_boundary() {
        let eastern = FixedOffset::west_opt(4 * 3600).unwrap();
        let mut index = DayIndex::with_offset(eastern);
        // 02:00 UTC on the 24th is 22:00 on the 23rd at UTC-4
        index.insert(trip(2021, 7, 24, 2, 0));
        index.insert(trip(2021, 7, 23, 20, 0));

        assert_eq!(index.section_count(), 1);
        assert_eq!(index.section(0).unwrap().date().to_string(), "2021-07-23");
        assert_consistent(&index);
    }
}
