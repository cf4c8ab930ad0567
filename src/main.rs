//! Triplog CLI
//!
//! Command-line interface for a local trip log:
//! - Record and remove trips
//! - List trips by day
//! - Export a time range to CSV
//! - Show totals

use anyhow::{bail, Context};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use triplog::{
    Config, CsvExporter, DayBucket, DistanceUnit, IndexKind, Location, Trip, TripIndex, TripStore,
};

#[derive(Parser)]
#[command(name = "triplog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Day-by-day log of recorded trips")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/triplog/config.toml or ./triplog.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Trip log file, overriding the configured one
    #[arg(long, global = true)]
    pub data_file: Option<PathBuf>,

    /// Index implementation, overriding the configured one (flat or calendar)
    #[arg(long, global = true)]
    pub variant: Option<IndexKind>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a trip
    Add {
        /// Start point as "lat,lon"
        #[arg(allow_hyphen_values = true)]
        from: String,
        /// End point as "lat,lon"
        #[arg(allow_hyphen_values = true)]
        to: String,
        /// Start time. Supports: "now", RFC 3339, "YYYY-MM-DD HH:MM", Unix timestamp
        #[arg(short, long)]
        start: String,
        /// End time (default: same as start)
        #[arg(short, long)]
        end: Option<String>,
        /// Distance in metres (default: straight line between the endpoints)
        #[arg(short, long)]
        distance: Option<f64>,
        /// Free-text note
        #[arg(short, long)]
        note: Option<String>,
        /// Append assuming the trip is the newest recorded
        #[arg(long)]
        append: bool,
    },

    /// List trips grouped by day
    List {
        /// Only list this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Remove a trip by its list position
    Remove {
        /// Row within the day
        row: usize,
        /// Day section as shown by `list`
        section: usize,
    },

    /// Export trips in [from, to) to CSV
    Export {
        /// Range start (inclusive)
        #[arg(long)]
        from: String,
        /// Range end (exclusive)
        #[arg(long)]
        to: String,
        /// Distance unit, overriding the configured one (miles or km)
        #[arg(short, long)]
        unit: Option<DistanceUnit>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show totals for the whole log
    Stats,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // config decides the log level, so loading it reports through a temporary subscriber
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("triplog=warn")),
        )
        .with_writer(std::io::stderr)
        .finish();
    let mut config = tracing::subscriber::with_default(bootstrap, || load_config(&cli))?;
    if let Some(path) = &cli.data_file {
        config.storage.data_file = path.to_string_lossy().to_string();
    }
    if let Some(variant) = cli.variant {
        config.storage.variant = variant;
    }

    init_logging(&config);

    let offset = config.calendar.offset()?;
    let store = TripStore::new(config.data_file());
    tracing::debug!(
        variant = %config.storage.variant,
        offset = %offset,
        "Using trip log {:?}",
        store.path()
    );

    match cli.command {
        Commands::Add {
            from,
            to,
            start,
            end,
            distance,
            note,
            append,
        } => {
            let from = parse_location(&from)?;
            let to = parse_location(&to)?;
            let start_time = parse_time(&start, offset)?;
            let end_time = match end {
                Some(end) => parse_time(&end, offset)?,
                None => start_time,
            };

            let mut trip = match distance {
                Some(distance) => Trip::new(from, start_time, to, end_time, distance)?,
                None => Trip::between(from, start_time, to, end_time)?,
            };
            if let Some(note) = note {
                trip = trip.note(note);
            }

            let mut index = store.load_kind(config.storage.variant, offset)?;
            let day = trip.day(offset);
            let distance = trip.distance;
            let created = if append {
                index.add(trip)
            } else {
                index.insert(trip)
            };
            store.save(index.as_ref())?;

            println!(
                "Recorded {:.2} {} trip on {}{}",
                config.export.unit.from_metres(distance),
                config.export.unit.suffix(),
                day,
                if created { " (new day)" } else { "" }
            );
        }

        Commands::List { date } => {
            let index = store.load_kind(config.storage.variant, offset)?;
            let date = date.as_deref().map(parse_date).transpose()?;

            if index.is_empty() {
                println!("No trips recorded yet.");
                println!();
                println!("Record your first trip with:");
                println!("  triplog add 37.77,-122.42 37.80,-122.27 --start now");
                return Ok(());
            }

            let unit = config.export.unit;
            match date {
                Some(date) => {
                    let last_moment = date
                        .and_hms_opt(23, 59, 59)
                        .and_then(|naive| offset.from_local_datetime(&naive).single())
                        .with_context(|| format!("Invalid date {}", date))?;
                    let (_, section) = index.row_and_section_for(last_moment.with_timezone(&Utc));
                    match index.section(section) {
                        Some(day) if day.date() == date => print_day(section, day, offset, unit),
                        _ => println!("No trips on {}", date),
                    }
                }
                None => {
                    for (section, day) in index.days().enumerate() {
                        print_day(section, day, offset, unit);
                    }
                }
            }
        }

        Commands::Remove { row, section } => {
            let mut index = store.load_kind(config.storage.variant, offset)?;
            let trip = remove_trip(index.as_mut(), row, section)?;
            store.save(index.as_ref())?;
            println!(
                "Removed trip started at {}",
                trip.start_time.with_timezone(&offset).format("%Y-%m-%d %H:%M")
            );
        }

        Commands::Export {
            from,
            to,
            unit,
            output,
        } => {
            let start = parse_time(&from, offset)?;
            let end = parse_time(&to, offset)?;
            if start >= end {
                tracing::warn!("Export range is empty: {} >= {}", start, end);
            }

            let index = store.load_kind(config.storage.variant, offset)?;
            let exporter = CsvExporter::new()
                .with_offset(offset)
                .with_unit(unit.unwrap_or(config.export.unit));

            match output {
                Some(path) => {
                    let rows = exporter.export_to(index.range(start, end), &path)?;
                    println!("Exported {} trips to {:?}", rows, path);
                }
                None => {
                    exporter.write(index.range(start, end), std::io::stdout().lock())?;
                }
            }
        }

        Commands::Stats => {
            let index = store.load_kind(config.storage.variant, offset)?;
            let stats = index.stats();
            let unit = config.export.unit;

            println!("Triplog v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Log: {:?}", store.path());
            println!("Index: {}", config.storage.variant);
            println!();
            println!("  Trips: {}", stats.trip_count);
            println!("  Days: {}", stats.section_count);
            println!(
                "  Distance: {:.2} {}",
                unit.from_metres(stats.total_distance),
                unit.suffix()
            );
            println!(
                "  Time: {}h {}m",
                stats.total_duration.num_hours(),
                stats.total_duration.num_minutes() % 60
            );
            if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                println!(
                    "  Span: {} to {}",
                    oldest.with_timezone(&offset).format("%Y-%m-%d"),
                    newest.with_timezone(&offset).format("%Y-%m-%d")
                );
            }
        }

        Commands::Config { output } => {
            let config = triplog::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Remove the trip at `(row, section)` and hand it back
fn remove_trip(index: &mut dyn TripIndex, row: usize, section: usize) -> anyhow::Result<Trip> {
    // the calendar index clamps sections on read; removal addresses exactly
    if section >= index.section_count() {
        bail!("No section {} ({} days recorded)", section, index.section_count());
    }
    let Some(trip) = index.get(row, section).cloned() else {
        bail!("No trip at row {} of section {}", row, section);
    };
    if !index.remove(row, section) {
        bail!("Couldn't remove row {} of section {}", row, section);
    }
    Ok(trip)
}

fn print_day(section: usize, day: &DayBucket, offset: FixedOffset, unit: DistanceUnit) {
    println!("[{}] {} ({} trips)", section, day.date(), day.len());
    for (row, trip) in day.iter().enumerate() {
        println!(
            "  {:>3}  {} - {}  {:>8.2} {}  {}",
            row,
            trip.start_time.with_timezone(&offset).format("%H:%M"),
            trip.end_time.with_timezone(&offset).format("%H:%M"),
            unit.from_metres(trip.distance),
            unit.suffix(),
            trip.note.as_deref().unwrap_or("")
        );
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default()?,
    };
    Ok(config)
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("triplog={}", config.logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Parse "lat,lon" into a validated location
fn parse_location(s: &str) -> anyhow::Result<Location> {
    let (lat, lon) = s
        .split_once(',')
        .with_context(|| format!("Invalid location {:?}. Use: lat,lon", s))?;
    let location = Location::new(
        lat.trim().parse().with_context(|| format!("Invalid latitude {:?}", lat))?,
        lon.trim().parse().with_context(|| format!("Invalid longitude {:?}", lon))?,
    );
    if !location.is_valid() {
        bail!("Location out of range: {}", s);
    }
    Ok(location)
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date {:?}. Use: YYYY-MM-DD", s))
}

/// Parse a point in time; wall-clock forms are read in `offset`
fn parse_time(s: &str, offset: FixedOffset) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();

    if s == "now" {
        return Ok(Utc::now());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        Some(naive)
    } else if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        date.and_hms_opt(0, 0, 0)
    } else {
        None
    };
    if let Some(naive) = naive {
        return offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("Time does not exist at offset {}: {}", offset, s));
    }

    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .with_context(|| format!("Timestamp out of range: {}", secs));
    }

    bail!(
        "Invalid time format: {}. Use: now, RFC 3339, YYYY-MM-DD HH:MM, YYYY-MM-DD or Unix seconds",
        s
    )
}
