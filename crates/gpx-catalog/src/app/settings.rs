use clap::{Parser, Subcommand, ValueEnum};
use gpx_catalog_lib::{Config, PathQuery, utils};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// GPX Catalog - List, inspect, edit and search a directory of GPX documents
pub struct Settings {
    /// Directory holding the GPX documents
    #[clap(long, env = "GPX_CATALOG_DIR", default_value = "uploads", global = true)]
    pub dir: PathBuf,

    /// XSD schema handed to the validator
    #[clap(long, env = "GPX_CATALOG_SCHEMA", value_name = "FILE", global = true)]
    pub schema: Option<PathBuf>,

    /// Seconds before a request's document work is abandoned
    #[clap(long, env = "GPX_CATALOG_TIMEOUT", default_value = "10", global = true)]
    pub timeout_secs: u64,

    /// Maximum distance in meters between the ends of a loop
    #[clap(long, default_value = "10.0", global = true)]
    pub loop_tolerance: f64,

    /// Output format
    #[clap(long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    #[clap(subcommand)]
    pub command: Command,
}

/// How responses are written to stdout
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Aligned, human-readable tables
    Table,
    /// `!`-separated records
    Legacy,
    /// One tagged JSON object per line
    Tagged,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Summaries of every valid document
    List,
    /// Names of every valid document
    Files,
    /// Routes and tracks of every document, or of one
    Detail {
        #[clap(long)]
        file: Option<String>,
    },
    /// Rename a route or track
    Rename {
        #[clap(long)]
        file: String,
        /// Selection such as "Route 1" or "Track 2"
        #[clap(long)]
        component: String,
        #[clap(long)]
        name: String,
    },
    /// Descriptive fields of a route or track
    OtherData {
        #[clap(long)]
        file: String,
        #[clap(long)]
        component: String,
    },
    /// Create an empty document
    Create {
        #[clap(long)]
        file: String,
    },
    /// Append a route made of the given points
    AddRoute {
        #[clap(long)]
        file: String,
        #[clap(long)]
        name: String,
        /// A point as LAT,LON; repeat in route order
        #[clap(long = "point", value_name = "LAT,LON")]
        points: Vec<Coordinate>,
    },
    /// Routes and tracks starting near START or ending near END
    FindPath {
        #[clap(long, value_name = "LAT,LON")]
        start: Coordinate,
        #[clap(long, value_name = "LAT,LON")]
        end: Coordinate,
        /// Tolerance in kilometers
        #[clap(long)]
        delta: f64,
    },
    /// Read commands from stdin, keeping pending waypoints between lines
    Session {
        /// Session whose waypoints are used
        #[clap(long, default_value = gpx_catalog_lib::DEFAULT_SESSION)]
        id: String,
    },
}

/// Commands accepted on a session line, in addition to the regular ones
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// Queue a waypoint for the next route
    AddWaypoint {
        #[clap(allow_negative_numbers = true)]
        lat: String,
        #[clap(allow_negative_numbers = true)]
        lon: String,
    },
    /// Turn the queued waypoints into a route
    Commit {
        #[clap(long)]
        file: String,
        #[clap(long)]
        name: String,
    },
    /// Show the queued waypoints
    Pending,
    /// Leave the session
    Quit,
    #[clap(flatten)]
    Request(Command),
}

/// One parsed session line
#[derive(Parser, Debug, Clone)]
#[clap(no_binary_name = true, disable_version_flag = true)]
pub struct SessionLine {
    #[clap(subcommand)]
    pub command: SessionCommand,
}

/// A latitude/longitude pair given as `LAT,LON`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl FromStr for Coordinate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format!("expected LAT,LON, got {s:?}"))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| format!("invalid latitude {lat:?}"))?;
        let lon: f64 = lon
            .trim()
            .parse()
            .map_err(|_| format!("invalid longitude {lon:?}"))?;
        if !utils::is_valid_coordinate(lat, lon) {
            return Err(format!(
                "({lat}, {lon}) is outside [-{}, {}] x [-{}, {}]",
                utils::MAX_LATITUDE,
                utils::MAX_LATITUDE,
                utils::MAX_LONGITUDE,
                utils::MAX_LONGITUDE
            ));
        }
        Ok(Self { lat, lon })
    }
}

impl Settings {
    /// Parse the process arguments, exiting with clap's message on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Library configuration for these settings
    pub fn config(&self) -> Config {
        Config {
            upload_dir: self.dir.clone(),
            schema_path: self.schema.clone(),
            adapter_timeout: Duration::from_secs(self.timeout_secs),
            loop_tolerance_m: self.loop_tolerance,
            ..Default::default()
        }
    }
}

/// Build a path query from two coordinates and a tolerance
pub fn path_query(start: Coordinate, end: Coordinate, delta: f64) -> PathQuery {
    PathQuery {
        start_lat: start.lat,
        start_lon: start.lon,
        end_lat: end.lat,
        end_lon: end.lon,
        delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_parse() {
        let c: Coordinate = "45.0,-73.5".parse().unwrap();
        assert_eq!(c, Coordinate { lat: 45.0, lon: -73.5 });
        assert!("91.0,0.0".parse::<Coordinate>().is_err());
        assert!("45.0".parse::<Coordinate>().is_err());
        assert!("a,b".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_settings_parse() {
        let settings = Settings::try_parse_from([
            "gpx-catalog",
            "--dir",
            "tracks",
            "find-path",
            "--start",
            "45.0,-73.0",
            "--end",
            "46.0,-74.0",
            "--delta",
            "2.5",
            "--format",
            "legacy",
        ])
        .unwrap();
        assert_eq!(settings.dir, PathBuf::from("tracks"));
        assert_eq!(settings.format, Format::Legacy);
        let Command::FindPath { start, end, delta } = settings.command else {
            panic!("wrong command");
        };
        let query = path_query(start, end, delta);
        assert_eq!(query.end_lon, -74.0);
        assert_eq!(query.delta, 2.5);

        let config = settings_with(&["gpx-catalog", "--timeout-secs", "3", "list"]).config();
        assert_eq!(config.adapter_timeout, Duration::from_secs(3));
    }

    fn settings_with(args: &[&str]) -> Settings {
        Settings::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_add_route_rejects_out_of_range_point() {
        let result = Settings::try_parse_from([
            "gpx-catalog",
            "add-route",
            "--file",
            "a.gpx",
            "--name",
            "R",
            "--point",
            "91.0,0.0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_session_lines() {
        let line = SessionLine::try_parse_from(["add-waypoint", "45.0", "-73.0"]).unwrap();
        assert!(matches!(
            line.command,
            SessionCommand::AddWaypoint { ref lat, ref lon } if lat == "45.0" && lon == "-73.0"
        ));

        let line = SessionLine::try_parse_from(["commit", "--file", "a.gpx", "--name", "Loop1"])
            .unwrap();
        assert!(matches!(line.command, SessionCommand::Commit { .. }));

        let line = SessionLine::try_parse_from(["files"]).unwrap();
        assert!(matches!(line.command, SessionCommand::Request(Command::Files)));
    }
}
