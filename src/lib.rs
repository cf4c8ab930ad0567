//! # Triplog
//!
//! A personal trip log: every recorded trip is filed under the calendar day it
//! started on, and the log is browsed as a sectioned list (one section per
//! day, newest first) or sliced by time range.
//!
//! ## Modules
//!
//! - [`trip`]: The trip record and its timestamp encoding
//! - [`index`]: Day-partitioned trip indexes (calendar tree and flat array)
//! - [`store`]: JSON persistence for a trip log
//! - [`export`]: CSV export of trip ranges
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use triplog::{DayIndex, TripIndex, TripStore};
//! use chrono::{FixedOffset, TimeZone, Utc};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let offset = FixedOffset::west_opt(7 * 3600).unwrap();
//!     let store = TripStore::new("trips.json");
//!     let index: DayIndex = store.load(offset)?;
//!
//!     // Trips in June 2021, newest first
//!     let start = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
//!     let end = Utc.with_ymd_and_hms(2021, 7, 1, 0, 0, 0).unwrap();
//!     for trip in index.range(start, end) {
//!         println!("{} {:.1} km", trip.start_time, trip.distance / 1000.0);
//!     }
//!
//!     println!("{}", index.stats());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod index;
pub mod store;
pub mod trip;

pub use config::{CalendarConfig, Config, ConfigError, ExportConfig, LoggingConfig, StorageConfig};
pub use error::{TripError, TripResult};
pub use export::{CsvExporter, DistanceUnit};
pub use index::{
    CalendarIndex, DayBucket, DayIndex, IndexKind, IndexStats, RangeIter, TripIndex,
};
pub use store::TripStore;
pub use trip::{Location, Trip};
