//! Document storage and component records
//!
//! This module provides the `Document` struct wrapping parsed GPX data together with the
//! record types every other module exchanges: summaries, component records, selection
//! references, extension data and path queries.

use crate::{CatalogError, Result, utils};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Discriminant of a named component inside a document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Route,
    Track,
}

impl ComponentKind {
    /// Human-readable label used in tables and selection references
    pub fn label(&self) -> &'static str {
        match self {
            Self::Route => "Route",
            Self::Track => "Track",
        }
    }

    /// Literal suffix appended to a component's JSON in the full-detail stream
    pub fn wire_suffix(&self) -> &'static str {
        match self {
            Self::Route => "route",
            Self::Track => "track",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One named route or track inside one document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub kind: ComponentKind,
    pub name: String,
    pub num_points: usize,
    /// Length in meters, rounded to the nearest 10
    #[serde(rename = "len")]
    pub length: f64,
    #[serde(rename = "loop")]
    pub is_loop: bool,
}

/// Summary metadata of one valid document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub file_name: String,
    pub version: String,
    pub creator: String,
    pub num_waypoints: usize,
    pub num_routes: usize,
    pub num_tracks: usize,
}

/// Descriptive child element of a route or track
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherData {
    pub name: String,
    pub value: String,
}

/// Template for a new, empty document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentTemplate {
    pub version: f64,
    pub creator: String,
}

/// Selection of one component, e.g. `Route 2` or `Track 1: Morning run`
///
/// `index` is 1-based and counts only components of the same kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    pub kind: ComponentKind,
    pub index: usize,
}

impl ComponentRef {
    pub fn new(kind: ComponentKind, index: usize) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.index)
    }
}

impl FromStr for ComponentRef {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CatalogError::InvalidComponentRef(s.to_string());
        // Anything after the first ':' is the display name of the selection
        let head = s.split(':').next().unwrap_or_default().trim();
        let (kind, index) = head.split_once(' ').ok_or_else(invalid)?;
        let kind = match kind {
            "Route" => ComponentKind::Route,
            "Track" => ComponentKind::Track,
            _ => return Err(invalid()),
        };
        let index: usize = index.trim().parse().map_err(|_| invalid())?;
        if index == 0 {
            return Err(invalid());
        }
        Ok(Self { kind, index })
    }
}

/// Bounded-corridor path query between two coordinates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathQuery {
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
    /// Tolerance in kilometers around both ends
    pub delta: f64,
}

impl PathQuery {
    fn start(&self) -> geo::Point<f64> {
        geo::Point::new(self.start_lon, self.start_lat)
    }

    fn end(&self) -> geo::Point<f64> {
        geo::Point::new(self.end_lon, self.end_lat)
    }

    /// Check that both ends are real coordinates and the tolerance is usable
    pub fn validate(&self) -> Result<()> {
        if !utils::is_valid_coordinate(self.start_lat, self.start_lon) {
            return Err(CatalogError::CoordinateOutOfRange(format!(
                "start ({}, {})",
                self.start_lat, self.start_lon
            )));
        }
        if !utils::is_valid_coordinate(self.end_lat, self.end_lon) {
            return Err(CatalogError::CoordinateOutOfRange(format!(
                "end ({}, {})",
                self.end_lat, self.end_lon
            )));
        }
        if !self.delta.is_finite() || self.delta < 0.0 {
            return Err(CatalogError::CoordinateOutOfRange(format!(
                "delta {}",
                self.delta
            )));
        }
        Ok(())
    }
}

/// A parsed GPX document
#[derive(Clone, Debug)]
pub struct Document {
    /// The original GPX data
    gpx_data: gpx::Gpx,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Document {
    /// Wrap already-parsed GPX data, checking its structure
    pub fn new(gpx_data: gpx::Gpx) -> Result<Self> {
        let document = Self { gpx_data };
        document.validate()?;
        Ok(document)
    }

    /// Read and validate a document from disk
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        Self::new(gpx::read(reader)?)
    }

    /// Create an empty document from a template
    pub fn from_template(template: &DocumentTemplate) -> Result<Self> {
        let version = if (template.version - 1.1).abs() < 1e-9 {
            gpx::GpxVersion::Gpx11
        } else if (template.version - 1.0).abs() < 1e-9 {
            gpx::GpxVersion::Gpx10
        } else {
            return Err(CatalogError::InvalidDocument(format!(
                "unsupported GPX version {}",
                template.version
            )));
        };
        let gpx_data = gpx::Gpx {
            version,
            creator: Some(template.creator.clone()),
            ..Default::default()
        };
        Self::new(gpx_data)
    }

    /// Structural checks on top of what the parser enforces
    fn validate(&self) -> Result<()> {
        if version_string(&self.gpx_data.version).is_none() {
            return Err(CatalogError::InvalidDocument(
                "unknown GPX version".to_string(),
            ));
        }

        let route_points = self.gpx_data.routes.iter().flat_map(|r| r.points.iter());
        let track_points = self
            .gpx_data
            .tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .flat_map(|s| s.points.iter());
        let all_points = self
            .gpx_data
            .waypoints
            .iter()
            .chain(route_points)
            .chain(track_points);

        for waypoint in all_points {
            let point = waypoint.point();
            if !utils::is_valid_coordinate(point.y(), point.x()) {
                return Err(CatalogError::InvalidDocument(format!(
                    "point outside WGS84 bounds: ({}, {})",
                    point.y(),
                    point.x()
                )));
            }
        }
        Ok(())
    }

    /// Access the raw GPX data
    #[inline]
    pub fn gpx_data(&self) -> &gpx::Gpx {
        &self.gpx_data
    }

    /// Summary metadata, attributed to `file_name`
    pub fn summary(&self, file_name: &str) -> DocumentSummary {
        DocumentSummary {
            file_name: file_name.to_string(),
            version: version_string(&self.gpx_data.version)
                .unwrap_or_default()
                .to_string(),
            creator: self.gpx_data.creator.clone().unwrap_or_default(),
            num_waypoints: self.gpx_data.waypoints.len(),
            num_routes: self.gpx_data.routes.len(),
            num_tracks: self.gpx_data.tracks.len(),
        }
    }

    /// All routes followed by all tracks, each in document order
    pub fn components(&self, loop_tolerance: f64) -> Vec<ComponentRecord> {
        let routes = self
            .gpx_data
            .routes
            .iter()
            .map(|route| route_record(route, loop_tolerance));
        let tracks = self
            .gpx_data
            .tracks
            .iter()
            .map(|track| track_record(track, loop_tolerance));
        routes.chain(tracks).collect()
    }

    /// Components whose start lies near the query start or whose end lies near the query end
    pub fn components_between(&self, query: &PathQuery, loop_tolerance: f64) -> Vec<ComponentRecord> {
        let routes = self
            .gpx_data
            .routes
            .iter()
            .filter(|route| ends_match(route.points.iter(), query))
            .map(|route| route_record(route, loop_tolerance));
        let tracks = self
            .gpx_data
            .tracks
            .iter()
            .filter(|track| ends_match(track_points(track), query))
            .map(|track| track_record(track, loop_tolerance));
        routes.chain(tracks).collect()
    }

    /// Descriptive child elements of one component, in a fixed order
    pub fn other_data(&self, component: &ComponentRef) -> Result<Vec<OtherData>> {
        let fields = match component.kind {
            ComponentKind::Route => {
                let route = self.route(component.index)?;
                describe(
                    &route.comment,
                    &route.description,
                    &route.source,
                    &route.type_,
                    route.number,
                )
            }
            ComponentKind::Track => {
                let track = self.track(component.index)?;
                describe(
                    &track.comment,
                    &track.description,
                    &track.source,
                    &track.type_,
                    track.number,
                )
            }
        };
        Ok(fields)
    }

    /// Rename one component
    pub fn rename(&mut self, component: &ComponentRef, new_name: &str) -> Result<()> {
        let slot = match component.kind {
            ComponentKind::Route => &mut self.route_mut(component.index)?.name,
            ComponentKind::Track => &mut self.track_mut(component.index)?.name,
        };
        *slot = Some(new_name.to_string());
        Ok(())
    }

    /// Append a new route built from the given coordinates
    pub fn push_route(&mut self, name: &str, points: &[(f64, f64)]) -> Result<()> {
        let mut route = gpx::Route {
            name: Some(name.to_string()),
            ..Default::default()
        };
        for &(lat, lon) in points {
            if !utils::is_valid_coordinate(lat, lon) {
                return Err(CatalogError::CoordinateOutOfRange(format!("({lat}, {lon})")));
            }
            route
                .points
                .push(gpx::Waypoint::new(geo::Point::new(lon, lat)));
        }
        self.gpx_data.routes.push(route);
        self.validate()
    }

    /// Serialize the document after re-checking its structure
    ///
    /// Documents are always written as GPX 1.1.
    pub fn write_to<W: Write>(&mut self, writer: W) -> Result<()> {
        self.validate()?;
        self.gpx_data.version = gpx::GpxVersion::Gpx11;

        let mut writer = BufWriter::new(writer);
        gpx::write(&self.gpx_data, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the document to `path`, replacing the file atomically
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("gpx.tmp");
        let written = std::fs::File::create(&tmp_path)
            .map_err(CatalogError::from)
            .and_then(|file| self.write_to(file));
        if let Err(err) = written {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(err);
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn route(&self, index: usize) -> Result<&gpx::Route> {
        index
            .checked_sub(1)
            .and_then(|i| self.gpx_data.routes.get(i))
            .ok_or(CatalogError::ComponentNotFound {
                kind: ComponentKind::Route,
                index,
            })
    }

    fn track(&self, index: usize) -> Result<&gpx::Track> {
        index
            .checked_sub(1)
            .and_then(|i| self.gpx_data.tracks.get(i))
            .ok_or(CatalogError::ComponentNotFound {
                kind: ComponentKind::Track,
                index,
            })
    }

    fn route_mut(&mut self, index: usize) -> Result<&mut gpx::Route> {
        index
            .checked_sub(1)
            .and_then(|i| self.gpx_data.routes.get_mut(i))
            .ok_or(CatalogError::ComponentNotFound {
                kind: ComponentKind::Route,
                index,
            })
    }

    fn track_mut(&mut self, index: usize) -> Result<&mut gpx::Track> {
        index
            .checked_sub(1)
            .and_then(|i| self.gpx_data.tracks.get_mut(i))
            .ok_or(CatalogError::ComponentNotFound {
                kind: ComponentKind::Track,
                index,
            })
    }
}

fn version_string(version: &gpx::GpxVersion) -> Option<&'static str> {
    match version {
        gpx::GpxVersion::Gpx10 => Some("1.0"),
        gpx::GpxVersion::Gpx11 => Some("1.1"),
        _ => None,
    }
}

fn track_points(track: &gpx::Track) -> impl Iterator<Item = &gpx::Waypoint> {
    track.segments.iter().flat_map(|segment| segment.points.iter())
}

fn route_record(route: &gpx::Route, loop_tolerance: f64) -> ComponentRecord {
    component_record(
        ComponentKind::Route,
        route.name.as_deref(),
        &route.points.iter().collect::<Vec<_>>(),
        loop_tolerance,
    )
}

fn track_record(track: &gpx::Track, loop_tolerance: f64) -> ComponentRecord {
    component_record(
        ComponentKind::Track,
        track.name.as_deref(),
        &track_points(track).collect::<Vec<_>>(),
        loop_tolerance,
    )
}

fn component_record(
    kind: ComponentKind,
    name: Option<&str>,
    points: &[&gpx::Waypoint],
    loop_tolerance: f64,
) -> ComponentRecord {
    ComponentRecord {
        kind,
        name: name.unwrap_or_default().to_string(),
        num_points: points.len(),
        // Gaps between track segments count towards the length
        length: utils::round_to_ten(utils::path_length(points.iter().copied())),
        is_loop: is_loop(points, loop_tolerance),
    }
}

/// A loop needs at least 4 points and ends within `tolerance` meters of its start
fn is_loop(points: &[&gpx::Waypoint], tolerance: f64) -> bool {
    if points.len() < 4 || tolerance < 0.0 {
        return false;
    }
    match (points.first(), points.last()) {
        (Some(first), Some(last)) => {
            utils::haversine_distance(first.point(), last.point()) <= tolerance
        }
        _ => false,
    }
}

fn ends_match<'a>(mut points: impl Iterator<Item = &'a gpx::Waypoint>, query: &PathQuery) -> bool {
    let Some(first) = points.next() else {
        return false;
    };
    let last = points.last().unwrap_or(first);
    let within = |a: geo::Point<f64>, b: geo::Point<f64>| {
        utils::haversine_distance(a, b) / 1000.0 <= query.delta
    };
    within(first.point(), query.start()) || within(last.point(), query.end())
}

fn describe(
    comment: &Option<String>,
    description: &Option<String>,
    source: &Option<String>,
    type_: &Option<String>,
    number: Option<u32>,
) -> Vec<OtherData> {
    let text_fields = [
        ("cmt", comment),
        ("desc", description),
        ("src", source),
        ("type", type_),
    ];
    let mut fields: Vec<OtherData> = text_fields
        .into_iter()
        .filter_map(|(name, value)| {
            value.as_ref().map(|value| OtherData {
                name: name.to_string(),
                value: value.clone(),
            })
        })
        .collect();
    if let Some(number) = number {
        fields.push(OtherData {
            name: "number".to_string(),
            value: number.to_string(),
        });
    }
    fields
}
