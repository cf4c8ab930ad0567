//! Hierarchical calendar index
//!
//! Trips are grouped year → month → day, each level a newest-first list of
//! siblings. All branch levels share one generic node, [`Branch`], keyed by
//! a calendar component and caching the trip and section counts of its
//! subtree. Every mutation returns a [`Delta`] that each ancestor applies on
//! the way back up, so cached counts never drift from the structure.
//!
//! Placement scans each level linearly: O(years + months + days + w).

use crate::index::bucket::{locate, CalendarKey, Counts, DayBucket, Delta, Keyed, Slot};
use crate::index::iter::RangeIter;
use crate::index::TripIndex;
use crate::trip::Trip;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use std::collections::vec_deque;
use std::collections::VecDeque;

/// Calendar year key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Year(pub i32);

impl CalendarKey for Year {
    fn of(date: NaiveDate) -> Self {
        Year(date.year())
    }
}

/// Calendar month key (1-12)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(pub u32);

impl CalendarKey for Month {
    fn of(date: NaiveDate) -> Self {
        Month(date.month())
    }
}

/// Behaviour shared by every level of the hierarchy
///
/// `section` arguments are local to the node: section 0 is the newest day
/// bucket beneath it.
pub trait Node: Keyed + Sized {
    /// A new subtree holding exactly one trip
    fn seed(date: NaiveDate, trip: Trip) -> Self;

    fn counts(&self) -> Counts;

    /// Place a trip at its sorted position
    fn insert(&mut self, date: NaiveDate, trip: Trip) -> Delta;

    /// Place a trip known to be no older than anything beneath this node
    fn add(&mut self, date: NaiveDate, trip: Trip) -> Delta;

    /// Remove a trip; `None` if the coordinates are out of range
    fn remove(&mut self, row: usize, section: usize) -> Option<Delta>;

    fn section(&self, section: usize) -> Option<&DayBucket>;

    fn row_and_section_for(&self, date: NaiveDate, at: DateTime<Utc>) -> (usize, usize);

    /// Day buckets beneath this node, newest first
    fn days(&self) -> Box<dyn Iterator<Item = &DayBucket> + '_>;
}

impl Node for DayBucket {
    fn seed(date: NaiveDate, trip: Trip) -> Self {
        DayBucket::new(date, trip)
    }

    fn counts(&self) -> Counts {
        Counts {
            trips: self.len(),
            sections: usize::from(!self.is_empty()),
        }
    }

    fn insert(&mut self, _date: NaiveDate, trip: Trip) -> Delta {
        DayBucket::insert(self, trip);
        Delta::Inserted { new_section: false }
    }

    fn add(&mut self, _date: NaiveDate, trip: Trip) -> Delta {
        self.push_newest(trip);
        Delta::Inserted { new_section: false }
    }

    fn remove(&mut self, row: usize, section: usize) -> Option<Delta> {
        if section != 0 {
            return None;
        }
        DayBucket::remove(self, row)?;
        Some(Delta::Removed {
            pruned_section: self.is_empty(),
        })
    }

    fn section(&self, section: usize) -> Option<&DayBucket> {
        (section == 0).then_some(self)
    }

    fn row_and_section_for(&self, _date: NaiveDate, at: DateTime<Utc>) -> (usize, usize) {
        (self.row_for(at), 0)
    }

    fn days(&self) -> Box<dyn Iterator<Item = &DayBucket> + '_> {
        Box::new(std::iter::once(self))
    }
}

/// An ordered list of child nodes sharing one calendar key
#[derive(Debug, Clone, PartialEq)]
pub struct Branch<K, C> {
    key: K,
    children: VecDeque<C>,
    counts: Counts,
}

/// Day buckets of one month, newest day first
pub type MonthBucket = Branch<Month, DayBucket>;

/// Month buckets of one year, newest month first
pub type YearBucket = Branch<Year, MonthBucket>;

impl<K: CalendarKey, C> Keyed for Branch<K, C> {
    type Key = K;

    fn key(&self) -> K {
        self.key
    }
}

impl<K: CalendarKey, C: Node> Branch<K, C> {
    fn empty(key: K) -> Self {
        Self {
            key,
            children: VecDeque::new(),
            counts: Counts::default(),
        }
    }

    /// Children, newest first
    pub fn iter(&self) -> vec_deque::Iter<'_, C> {
        self.children.iter()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn trip_count(&self) -> usize {
        self.counts.trips
    }

    pub fn section_count(&self) -> usize {
        self.counts.sections
    }

    /// Child holding a local section, and the section's offset inside it
    fn child_for_section(&self, section: usize) -> Option<(usize, usize)> {
        let mut remaining = section;
        for (i, child) in self.children.iter().enumerate() {
            let sections = child.counts().sections;
            if remaining < sections {
                return Some((i, remaining));
            }
            remaining -= sections;
        }
        None
    }

    fn child_key(date: NaiveDate) -> C::Key {
        <C::Key as CalendarKey>::of(date)
    }
}

impl YearBucket {
    pub fn year(&self) -> i32 {
        self.key.0
    }
}

impl MonthBucket {
    pub fn month(&self) -> u32 {
        self.key.0
    }
}

impl<K: CalendarKey, C: Node> Node for Branch<K, C> {
    fn seed(date: NaiveDate, trip: Trip) -> Self {
        let mut children = VecDeque::with_capacity(1);
        children.push_back(C::seed(date, trip));
        Self {
            key: K::of(date),
            children,
            counts: Counts {
                trips: 1,
                sections: 1,
            },
        }
    }

    fn counts(&self) -> Counts {
        self.counts
    }

    fn insert(&mut self, date: NaiveDate, trip: Trip) -> Delta {
        let delta = match locate(&self.children, Self::child_key(date)) {
            Slot::Occupied(i) => self.children[i].insert(date, trip),
            Slot::Vacant(i) => {
                self.children.insert(i, C::seed(date, trip));
                Delta::Inserted { new_section: true }
            }
        };
        self.counts.apply(delta);
        delta
    }

    fn add(&mut self, date: NaiveDate, trip: Trip) -> Delta {
        let key = Self::child_key(date);
        let delta = match self.children.front_mut() {
            Some(head) if head.key() == key => head.add(date, trip),
            _ => {
                self.children.push_front(C::seed(date, trip));
                Delta::Inserted { new_section: true }
            }
        };
        self.counts.apply(delta);
        delta
    }

    fn remove(&mut self, row: usize, section: usize) -> Option<Delta> {
        let (i, local) = self.child_for_section(section)?;
        let delta = self.children[i].remove(row, local)?;
        if self.children[i].counts().trips == 0 {
            self.children.remove(i);
        }
        self.counts.apply(delta);
        Some(delta)
    }

    fn section(&self, section: usize) -> Option<&DayBucket> {
        let (i, local) = self.child_for_section(section)?;
        self.children[i].section(local)
    }

    fn row_and_section_for(&self, date: NaiveDate, at: DateTime<Utc>) -> (usize, usize) {
        let slot = locate(&self.children, Self::child_key(date));
        let newer: usize = self
            .children
            .iter()
            .take(slot.position())
            .map(|child| child.counts().sections)
            .sum();

        match slot {
            Slot::Occupied(i) => {
                let (row, section) = self.children[i].row_and_section_for(date, at);
                (row, newer + section)
            }
            Slot::Vacant(_) => (0, newer),
        }
    }

    fn days(&self) -> Box<dyn Iterator<Item = &DayBucket> + '_> {
        Box::new(self.children.iter().flat_map(|child| child.days()))
    }
}

/// Trips grouped by year, month and day, newest first at every level
///
/// Reads clamp: an out-of-range section resolves to the nearest valid one,
/// and only an empty index yields `None`. For a date older than every
/// bucket, [`TripIndex::row_and_section_for`] returns `(0, section_count)`,
/// one past the last section; callers clamp.
#[derive(Debug, Clone)]
pub struct CalendarIndex {
    root: Branch<(), YearBucket>,
    offset: FixedOffset,
}

impl Default for CalendarIndex {
    fn default() -> Self {
        Self::with_offset(Utc.fix())
    }
}

impl CalendarIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Year buckets, newest first
    pub fn years(&self) -> vec_deque::Iter<'_, YearBucket> {
        self.root.iter()
    }

    fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Position `(year, month, day)` of the bucket for `at`'s day
    ///
    /// If that day has no bucket, the position of the next later day is
    /// returned instead; `None` if no day is later.
    pub fn get_index(&self, at: DateTime<Utc>) -> Option<(usize, usize, usize)> {
        let date = self.date_of(at);

        let years = &self.root.children;
        let y = match locate(years, Year::of(date)) {
            Slot::Occupied(y) => y,
            Slot::Vacant(y) => return self.later_neighbour(y, 0, 0),
        };
        let months = &years[y].children;
        let m = match locate(months, Month::of(date)) {
            Slot::Occupied(m) => m,
            Slot::Vacant(m) => return self.later_neighbour(y, m, 0),
        };
        match locate(&months[m].children, date) {
            Slot::Occupied(d) => Some((y, m, d)),
            Slot::Vacant(d) => self.later_neighbour(y, m, d),
        }
    }

    /// The bucket just before `(year, month, day)` in newest-first order
    fn later_neighbour(
        &self,
        year: usize,
        month: usize,
        day: usize,
    ) -> Option<(usize, usize, usize)> {
        let years = &self.root.children;
        if day > 0 {
            return Some((year, month, day - 1));
        }
        if month > 0 {
            let m = month - 1;
            return Some((year, m, years[year].children[m].len() - 1));
        }
        if year > 0 {
            let y = year - 1;
            let m = years[y].len() - 1;
            return Some((y, m, years[y].children[m].len() - 1));
        }
        None
    }

    /// Day buckets from a `(year, month, day)` position onwards
    fn days_from(
        &self,
        year: usize,
        month: usize,
        day: usize,
    ) -> impl Iterator<Item = &DayBucket> + '_ {
        self.root
            .children
            .range(year..)
            .enumerate()
            .flat_map(move |(yi, y)| {
                let first_month = if yi == 0 { month } else { 0 };
                y.children
                    .range(first_month..)
                    .enumerate()
                    .flat_map(move |(mi, m)| {
                        let first_day = if yi == 0 && mi == 0 { day } else { 0 };
                        m.children.range(first_day..)
                    })
            })
    }
}

impl TripIndex for CalendarIndex {
    fn with_offset(offset: FixedOffset) -> Self {
        Self {
            root: Branch::empty(()),
            offset,
        }
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn trip_count(&self) -> usize {
        self.root.trip_count()
    }

    fn section_count(&self) -> usize {
        self.root.section_count()
    }

    fn add(&mut self, trip: Trip) -> bool {
        if let Some(newest) = self.newest() {
            if trip.start_time < newest.start_time {
                tracing::debug!(start = %trip.start_time, "Out-of-order add, inserting instead");
                return self.insert(trip);
            }
        }

        let date = trip.day(self.offset);
        let delta = self.root.add(date, trip);
        if delta.section_changed() {
            tracing::debug!(%date, "New day section");
        }
        delta.section_changed()
    }

    fn insert(&mut self, trip: Trip) -> bool {
        let date = trip.day(self.offset);
        let delta = self.root.insert(date, trip);
        if delta.section_changed() {
            tracing::debug!(%date, "New day section");
        }
        delta.section_changed()
    }

    fn remove(&mut self, row: usize, section: usize) -> bool {
        match self.root.remove(row, section) {
            Some(delta) => {
                if delta.section_changed() {
                    tracing::debug!(section, "Pruned empty day section");
                }
                true
            }
            None => {
                tracing::warn!(
                    row,
                    section,
                    sections = self.section_count(),
                    "Couldn't remove: coordinates out of range"
                );
                false
            }
        }
    }

    fn section(&self, section: usize) -> Option<&DayBucket> {
        if self.is_empty() {
            return None;
        }
        self.root.section(section.min(self.section_count() - 1))
    }

    fn row_and_section_for(&self, at: DateTime<Utc>) -> (usize, usize) {
        self.root.row_and_section_for(self.date_of(at), at)
    }

    fn days(&self) -> Box<dyn Iterator<Item = &DayBucket> + '_> {
        self.root.days()
    }

    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> RangeIter<'_> {
        if self.is_empty() {
            return RangeIter::empty(start, end);
        }
        let (y, m, d) = self.get_index(end).unwrap_or((0, 0, 0));
        RangeIter::new(self.days_from(y, m, d), start, end)
    }

    fn oldest(&self) -> Option<&Trip> {
        let year = self.root.children.back()?;
        let month = year.children.back()?;
        month.children.back()?.last()
    }
}
