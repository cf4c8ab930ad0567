//! Trip log persistence
//!
//! The whole log lives in one JSON file: an array of trips, newest first,
//! each `{start, startDate, end, endDate, distance}` (plus `note` when set).
//! Loading replays `insert` for every entry, so bucket boundaries are
//! recomputed from scratch and may follow a different UTC offset than the
//! one the file was written under. Saving writes a sibling temporary file and
//! renames it over the log.

use crate::error::{TripError, TripResult};
use crate::index::{CalendarIndex, DayIndex, IndexKind, TripIndex};
use crate::trip::Trip;
use chrono::FixedOffset;
use std::path::{Path, PathBuf};

/// A JSON trip log on disk
#[derive(Debug, Clone)]
pub struct TripStore {
    path: PathBuf,
}

impl TripStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate every trip in the log
    ///
    /// A missing file is an empty log.
    pub fn read_trips(&self) -> TripResult<Vec<Trip>> {
        if !self.path.exists() {
            tracing::info!("No trip log at {:?}, starting empty", self.path);
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        decode(&content)
    }

    /// Load the log into an index of the given type
    pub fn load<I: TripIndex>(&self, offset: FixedOffset) -> TripResult<I> {
        let trips = self.read_trips()?;
        let index = I::from_trips(trips, offset);
        tracing::info!(
            trips = index.trip_count(),
            sections = index.section_count(),
            "Loaded trip log from {:?}",
            self.path
        );
        Ok(index)
    }

    /// Load the log into whichever index variant is configured
    pub fn load_kind(
        &self,
        kind: IndexKind,
        offset: FixedOffset,
    ) -> TripResult<Box<dyn TripIndex>> {
        Ok(match kind {
            IndexKind::Flat => Box::new(self.load::<DayIndex>(offset)?),
            IndexKind::Calendar => Box::new(self.load::<CalendarIndex>(offset)?),
        })
    }

    /// Flatten the index into the log, replacing its previous contents
    pub fn save<I: TripIndex + ?Sized>(&self, index: &I) -> TripResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = encode(index)?;
        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;

        tracing::info!(trips = index.trip_count(), "Saved trip log to {:?}", self.path);
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "trips.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Serialize an index as the on-disk trip array, newest first
pub fn encode<I: TripIndex + ?Sized>(index: &I) -> TripResult<String> {
    let trips: Vec<&Trip> = index.trips().collect();
    Ok(serde_json::to_string_pretty(&trips)?)
}

/// Parse a trip array, rejecting entries that violate the record invariants
pub fn decode(content: &str) -> TripResult<Vec<Trip>> {
    let trips: Vec<Trip> = serde_json::from_str(content)?;
    for (i, trip) in trips.iter().enumerate() {
        trip.validate()
            .map_err(|e| TripError::InvalidTrip(format!("entry {}: {}", i, e)))?;
    }
    Ok(trips)
}
