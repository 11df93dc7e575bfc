//! Wire encodings for catalog responses
//!
//! Two encodings are produced from the same typed records:
//!
//! - **Legacy**: `!`-separated records and `\0`-joined summary columns. There is no escaping,
//!   so every field is checked for the reserved characters before it is written.
//! - **Tagged**: newline-delimited JSON where every line names its own record type.

use crate::{
    CatalogError, ComponentKind, ComponentRecord, DocumentSummary, OtherData, PendingWaypoint,
    Result,
};
use serde::{Deserialize, Serialize};

/// Separates records, and a file name from its detail blob
pub const RECORD_SEPARATOR: char = '!';

/// Joins summary column values across documents
pub const COLUMN_SEPARATOR: char = '\0';

/// First character of every component record in the detail streams
pub const COMPONENT_OPENER: char = '{';

/// Reject values that would break the legacy framing
pub fn check_field(field: &'static str, value: &str) -> Result<()> {
    if value.contains(RECORD_SEPARATOR) || value.contains(COLUMN_SEPARATOR) {
        return Err(CatalogError::ReservedDelimiter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Reject file names that would read back as a component record in the full-detail stream
pub fn check_file_name(file_name: &str) -> Result<()> {
    check_field("file_name", file_name)?;
    if file_name.starts_with(COMPONENT_OPENER) {
        return Err(CatalogError::ReservedDelimiter {
            field: "file_name",
            value: file_name.to_string(),
        });
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPayload<'a> {
    version: &'a str,
    creator: &'a str,
    num_waypoints: usize,
    num_routes: usize,
    num_tracks: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComponentPayload<'a> {
    name: &'a str,
    num_points: usize,
    len: f64,
    #[serde(rename = "loop")]
    is_loop: bool,
}

impl<'a> From<&'a ComponentRecord> for ComponentPayload<'a> {
    fn from(record: &'a ComponentRecord) -> Self {
        Self {
            name: &record.name,
            num_points: record.num_points,
            len: record.length,
            is_loop: record.is_loop,
        }
    }
}

/// Summary JSON without the file name, which travels in a parallel list
pub fn summary_payload(summary: &DocumentSummary) -> Result<String> {
    check_field("version", &summary.version)?;
    check_field("creator", &summary.creator)?;
    let payload = SummaryPayload {
        version: &summary.version,
        creator: &summary.creator,
        num_waypoints: summary.num_waypoints,
        num_routes: summary.num_routes,
        num_tracks: summary.num_tracks,
    };
    Ok(serde_json::to_string(&payload)?)
}

/// Component JSON as carried by the detail streams (the kind is not part of it)
pub fn component_payload(record: &ComponentRecord) -> Result<String> {
    check_field("name", &record.name)?;
    Ok(serde_json::to_string(&ComponentPayload::from(record))?)
}

/// Each component's JSON followed by its `route`/`track` suffix and a separator
pub fn encode_detail(records: &[ComponentRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&component_payload(record)?);
        out.push_str(record.kind.wire_suffix());
        out.push(RECORD_SEPARATOR);
    }
    Ok(out)
}

/// Each component's JSON followed by a separator, without kind suffixes
pub fn encode_detail_by_name(records: &[ComponentRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&component_payload(record)?);
        out.push(RECORD_SEPARATOR);
    }
    Ok(out)
}

/// One document's block in the full-detail stream: `file_name!` then its detail
pub fn encode_document_detail(file_name: &str, records: &[ComponentRecord]) -> Result<String> {
    check_file_name(file_name)?;
    let mut out = String::with_capacity(file_name.len() + 1);
    out.push_str(file_name);
    out.push(RECORD_SEPARATOR);
    out.push_str(&encode_detail(records)?);
    Ok(out)
}

/// Path search matches as `Route !name!numPoints!len!loop!` groups
pub fn encode_path_matches(records: &[ComponentRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        check_field("name", &record.name)?;
        let tag = match record.kind {
            ComponentKind::Route => "Route ",
            ComponentKind::Track => "Track ",
        };
        out.push_str(&format!(
            "{tag}!{}!{}!{:.1}!{}!",
            record.name, record.num_points, record.length, record.is_loop
        ));
    }
    Ok(out)
}

/// Extension data as `{"name":..,"value":..}!` items
pub fn encode_other_data(items: &[OtherData]) -> Result<String> {
    let mut out = String::new();
    for item in items {
        check_field("name", &item.name)?;
        check_field("value", &item.value)?;
        out.push_str(&serde_json::to_string(item)?);
        out.push(RECORD_SEPARATOR);
    }
    Ok(out)
}

/// Join one summary column across documents
pub fn join_column<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            out.push(COLUMN_SEPARATOR);
        }
        out.push_str(value.as_ref());
    }
    out
}

/// Concatenated `{"lat":..,"lon":..}` objects with no separator
pub fn encode_waypoint_blob(waypoints: &[PendingWaypoint]) -> Result<String> {
    let mut out = String::new();
    for waypoint in waypoints {
        out.push_str(&serde_json::to_string(waypoint)?);
    }
    Ok(out)
}

/// Parse a waypoint blob back into waypoints
pub fn decode_waypoint_blob(blob: &str) -> Result<Vec<PendingWaypoint>> {
    serde_json::Deserializer::from_str(blob)
        .into_iter::<PendingWaypoint>()
        .map(|waypoint| waypoint.map_err(CatalogError::from))
        .collect()
}

/// One line of the tagged encoding
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaggedRecord {
    /// Opens the block of one document
    Document {
        #[serde(rename = "fileName")]
        file_name: String,
    },
    Summary(DocumentSummary),
    Component(ComponentRecord),
    /// A path search match
    Path(ComponentRecord),
    OtherData(OtherData),
}

/// Serialize records as newline-delimited JSON
pub fn encode_tagged(records: &[TaggedRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: ComponentKind, name: &str) -> ComponentRecord {
        ComponentRecord {
            kind,
            name: name.to_string(),
            num_points: 12,
            length: 340.0,
            is_loop: false,
        }
    }

    #[test]
    fn test_summary_payload_omits_file_name() {
        let summary = DocumentSummary {
            file_name: "a.gpx".to_string(),
            version: "1.1".to_string(),
            creator: "X".to_string(),
            num_waypoints: 0,
            num_routes: 2,
            num_tracks: 1,
        };
        let json = summary_payload(&summary).unwrap();
        assert_eq!(
            json,
            r#"{"version":"1.1","creator":"X","numWaypoints":0,"numRoutes":2,"numTracks":1}"#
        );
    }

    #[test]
    fn test_encode_detail_suffixes() {
        let records = vec![
            record(ComponentKind::Route, "R1"),
            record(ComponentKind::Track, "T1"),
        ];
        let detail = encode_detail(&records).unwrap();
        assert_eq!(
            detail,
            concat!(
                r#"{"name":"R1","numPoints":12,"len":340.0,"loop":false}route!"#,
                r#"{"name":"T1","numPoints":12,"len":340.0,"loop":false}track!"#
            )
        );

        let by_name = encode_detail_by_name(&records).unwrap();
        assert!(by_name.ends_with("false}!"));
        assert!(!by_name.contains("route"));
    }

    #[test]
    fn test_encode_document_detail() {
        let block = encode_document_detail("b.gpx", &[]).unwrap();
        assert_eq!(block, "b.gpx!");
    }

    #[test]
    fn test_path_matches() {
        let encoded = encode_path_matches(&[record(ComponentKind::Track, "Hill")]).unwrap();
        assert_eq!(encoded, "Track !Hill!12!340.0!false!");
        assert_eq!(encode_path_matches(&[]).unwrap(), "");
    }

    #[test]
    fn test_reserved_delimiters_rejected() {
        let bad = record(ComponentKind::Route, "a!b");
        assert!(matches!(
            encode_detail(&[bad.clone()]),
            Err(CatalogError::ReservedDelimiter { field: "name", .. })
        ));
        assert!(encode_path_matches(&[bad]).is_err());
        assert!(encode_document_detail("x\0.gpx", &[]).is_err());
        assert!(matches!(
            encode_document_detail("{x}.gpx", &[]),
            Err(CatalogError::ReservedDelimiter { field: "file_name", .. })
        ));
        assert!(check_file_name("x{1}.gpx").is_ok());
        assert!(check_field("creator", "plain").is_ok());
    }

    #[test]
    fn test_join_column() {
        assert_eq!(join_column(["1.1", "1.0"]), "1.1\u{0}1.0");
        assert_eq!(join_column(Vec::<String>::new()), "");
    }

    #[test]
    fn test_waypoint_blob() {
        let waypoints = vec![
            PendingWaypoint::new(45.0, -73.0),
            PendingWaypoint::new(46.0, -74.0),
        ];
        let blob = encode_waypoint_blob(&waypoints).unwrap();
        assert_eq!(blob, r#"{"lat":45.0,"lon":-73.0}{"lat":46.0,"lon":-74.0}"#);
        assert_eq!(decode_waypoint_blob(&blob).unwrap(), waypoints);
        assert!(decode_waypoint_blob("").unwrap().is_empty());
        assert!(decode_waypoint_blob("{\"lat\":1").is_err());
    }

    #[test]
    fn test_tagged_records_carry_type() {
        let lines = encode_tagged(&[
            TaggedRecord::Document {
                file_name: "a.gpx".to_string(),
            },
            TaggedRecord::Component(record(ComponentKind::Route, "R!1")),
        ])
        .unwrap();
        let mut it = lines.lines();
        assert_eq!(it.next(), Some(r#"{"type":"document","fileName":"a.gpx"}"#));
        let component = it.next().unwrap();
        assert!(component.starts_with(r#"{"type":"component","kind":"route","name":"R!1""#));
        assert_eq!(it.next(), None);
    }
}
