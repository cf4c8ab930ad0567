//! CSV Export
//!
//! Drains trips (usually a [`RangeIter`](crate::index::RangeIter)) into CSV,
//! one line per trip:
//!
//! ```text
//! date,startTime,endTime,distance
//! 2021-06-20,18:00,18:20,3.11
//! ```

use crate::error::TripResult;
use crate::trip::Trip;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

const METRES_PER_MILE: f64 = 1609.344;

/// Unit distances are written in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Miles,
    Km,
}

impl DistanceUnit {
    /// Convert a distance in metres to this unit
    pub fn from_metres(self, metres: f64) -> f64 {
        match self {
            DistanceUnit::Miles => metres / METRES_PER_MILE,
            DistanceUnit::Km => metres / 1000.0,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            DistanceUnit::Miles => "mi",
            DistanceUnit::Km => "km",
        }
    }
}

impl std::str::FromStr for DistanceUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "miles" | "mi" => Ok(DistanceUnit::Miles),
            "km" => Ok(DistanceUnit::Km),
            other => Err(format!("unknown distance unit: {} (expected miles or km)", other)),
        }
    }
}

#[derive(Serialize)]
struct ExportRow {
    date: String,
    #[serde(rename = "startTime")]
    start_time: String,
    #[serde(rename = "endTime")]
    end_time: String,
    distance: String,
}

/// Trip CSV writer with configurable time zone and unit
#[derive(Debug, Clone)]
pub struct CsvExporter {
    offset: FixedOffset,
    unit: DistanceUnit,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvExporter {
    /// Exporter writing UTC times and miles
    pub fn new() -> Self {
        Self {
            offset: Utc.fix(),
            unit: DistanceUnit::default(),
        }
    }

    /// Set the offset dates and times are rendered in
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_unit(mut self, unit: DistanceUnit) -> Self {
        self.unit = unit;
        self
    }

    fn row(&self, trip: &Trip) -> ExportRow {
        let start = trip.start_time.with_timezone(&self.offset);
        let end = trip.end_time.with_timezone(&self.offset);
        ExportRow {
            date: start.format("%Y-%m-%d").to_string(),
            start_time: start.format("%H:%M").to_string(),
            end_time: end.format("%H:%M").to_string(),
            distance: format!("{:.2}", self.unit.from_metres(trip.distance)),
        }
    }

    /// Write every trip to `writer`; returns the number of rows written
    ///
    /// The header is written even when there are no trips.
    pub fn write<'a, W: Write>(
        &self,
        trips: impl IntoIterator<Item = &'a Trip>,
        writer: W,
    ) -> TripResult<usize> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        csv.write_record(["date", "startTime", "endTime", "distance"])?;

        let mut rows = 0;
        for trip in trips {
            csv.serialize(self.row(trip))?;
            rows += 1;
        }
        csv.flush()?;

        tracing::debug!(rows, "Exported trips to CSV");
        Ok(rows)
    }

    /// Render trips as a CSV string
    pub fn to_csv_string<'a>(
        &self,
        trips: impl IntoIterator<Item = &'a Trip>,
    ) -> TripResult<String> {
        let mut buf = Vec::new();
        self.write(trips, &mut buf)?;
        String::from_utf8(buf).map_err(|e| crate::error::TripError::Csv(e.to_string()))
    }

    /// Write trips to a CSV file, creating parent directories as needed
    pub fn export_to<'a>(
        &self,
        trips: impl IntoIterator<Item = &'a Trip>,
        path: &Path,
    ) -> TripResult<usize> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(path)?;
        let rows = self.write(trips, std::io::BufWriter::new(file))?;
        tracing::info!(rows, "Exported trips to {:?}", path);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::{at, trip, utc};
    use crate::index::{DayIndex, TripIndex};
    use tempfile::tempdir;

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
    fn test_export_range() {
        let index = scenario_c();
        let iter = index.range(at(2021, 6, 1, 0, 0), at(2021, 7, 1, 0, 0));

        let csv = CsvExporter::new()
            .with_unit(DistanceUnit::Km)
            .to_csv_string(iter)
            .unwrap();

        assert_eq!(
            csv,
            "date,startTime,endTime,distance\n\
             2021-06-20,18:00,18:20,5.00\n\
             2021-06-15,08:00,08:20,5.00\n"
        );
    }

    #[test]
    fn test_export_empty_range_writes_header() {
        let index = DayIndex::new();
        let csv = CsvExporter::new()
            .to_csv_string(index.range(at(2021, 1, 1, 0, 0), at(2022, 1, 1, 0, 0)))
            .unwrap();
        assert_eq!(csv, "date,startTime,endTime,distance\n");
    }

    #[test]
    fn test_export_in_local_offset_and_miles() {
        let index = scenario_c();
        let pacific = FixedOffset::west_opt(7 * 3600).unwrap();

        let csv = CsvExporter::new()
            .with_offset(pacific)
            .to_csv_string(index.range(at(2021, 6, 15, 0, 0), at(2021, 6, 16, 0, 0)))
            .unwrap();

        // 08:00 UTC is 01:00 at UTC-7; 5 km is 3.11 miles
        assert!(csv.ends_with("2021-06-15,01:00,01:20,3.11\n"), "{}", csv);
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("trips.csv");
        let index = scenario_c();

        let rows = CsvExporter::new().export_to(index.trips(), &path).unwrap();
        assert_eq!(rows, 3);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 4);
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(DistanceUnit::Km.from_metres(1500.0), 1.5);
        assert!((DistanceUnit::Miles.from_metres(1609.344) - 1.0).abs() < 1e-12);
        assert_eq!(DistanceUnit::Miles.suffix(), "mi");
    }

    #[test]
    fn test_unit_parse() {
        assert_eq!("km".parse::<DistanceUnit>().unwrap(), DistanceUnit::Km);
        assert_eq!(" Miles".parse::<DistanceUnit>().unwrap(), DistanceUnit::Miles);
        assert_eq!("mi".parse::<DistanceUnit>().unwrap(), DistanceUnit::Miles);
        assert!("furlongs".parse::<DistanceUnit>().is_err());
    }
}
