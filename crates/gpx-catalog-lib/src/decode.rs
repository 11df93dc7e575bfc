//! Consumer-side decoding of catalog responses into typed tables
//!
//! Decoding never aborts: a malformed element is skipped and reported as a [`DecodeError`]
//! in [`Decoded::issues`] while the rest of the response still produces rows.

use crate::wire::{COMPONENT_OPENER, RECORD_SEPARATOR, TaggedRecord};
use crate::{ComponentKind, ComponentRecord, ComponentRef, DocumentSummary, OtherData};
use serde::Deserialize;

/// Width of the kind suffix on full-detail elements
const KIND_SUFFIX_LEN: usize = 5;

/// Elements in one path search group
const PATH_GROUP_LEN: usize = 5;

/// Problems found while decoding a response
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("element {index}: unknown record tag {tag:?}")]
    UnknownTag { index: usize, tag: String },

    #[error("element {index}: malformed JSON: {message}")]
    MalformedJson { index: usize, message: String },

    #[error("element {index}: component record before any file name")]
    OrphanComponent { index: usize },

    #[error("element {index}: incomplete path group")]
    IncompletePathGroup { index: usize },

    #[error("element {index}: invalid {field} {value:?}")]
    InvalidField {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("{payloads} summary payloads for {file_names} file names")]
    SummaryCountMismatch { payloads: usize, file_names: usize },

    #[error("line {line}: {message}")]
    MalformedLine { line: usize, message: String },
}

/// Rows decoded from a response plus everything that was skipped
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub rows: Vec<T>,
    pub issues: Vec<DecodeError>,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            issues: Vec::new(),
        }
    }
}

impl<T> Decoded<T> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One component of one document, numbered within its kind
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    pub file_name: String,
    pub reference: ComponentRef,
    pub record: ComponentRecord,
}

impl DetailRow {
    /// Selection label such as `Route 2`
    pub fn label(&self) -> String {
        self.reference.to_string()
    }
}

/// One path search match, numbered across the whole response
#[derive(Debug, Clone, PartialEq)]
pub struct PathRow {
    pub reference: ComponentRef,
    pub record: ComponentRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComponentPayload {
    name: String,
    num_points: usize,
    len: f64,
    #[serde(rename = "loop")]
    is_loop: bool,
}

impl ComponentPayload {
    fn into_record(self, kind: ComponentKind) -> ComponentRecord {
        ComponentRecord {
            kind,
            name: self.name,
            num_points: self.num_points,
            length: self.len,
            is_loop: self.is_loop,
        }
    }
}

/// Older producers write the version as a number
#[derive(Deserialize)]
#[serde(untagged)]
enum VersionValue {
    Text(String),
    Number(f64),
}

impl VersionValue {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => format!("{number:.1}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPayload {
    version: VersionValue,
    #[serde(default)]
    creator: String,
    #[serde(default)]
    num_waypoints: usize,
    #[serde(default)]
    num_routes: usize,
    #[serde(default)]
    num_tracks: usize,
}

/// Split a legacy stream on the record separator, dropping empty elements
pub fn split_elements(stream: &str) -> Vec<&str> {
    stream
        .split(RECORD_SEPARATOR)
        .filter(|element| !element.is_empty())
        .collect()
}

/// The component elements that follow `file_name` in a split full-detail stream
///
/// Scanning stops at the first element that is not a JSON object.
pub fn select_document_components<'a, S: AsRef<str>>(elements: &'a [S], file_name: &str) -> Vec<&'a str> {
    let Some(start) = elements.iter().position(|e| e.as_ref() == file_name) else {
        return Vec::new();
    };
    elements[start + 1..]
        .iter()
        .map(|element| element.as_ref())
        .take_while(|element| element.starts_with(COMPONENT_OPENER))
        .collect()
}

/// Pair summary payloads with their file names
pub fn decode_summaries<S: AsRef<str>>(payloads: &[S], file_names: &[S]) -> Decoded<DocumentSummary> {
    let mut decoded = Decoded::default();
    if payloads.len() != file_names.len() {
        decoded.issues.push(DecodeError::SummaryCountMismatch {
            payloads: payloads.len(),
            file_names: file_names.len(),
        });
    }
    for (index, (payload, file_name)) in payloads.iter().zip(file_names).enumerate() {
        match serde_json::from_str::<SummaryPayload>(payload.as_ref()) {
            Ok(summary) => decoded.rows.push(DocumentSummary {
                file_name: file_name.as_ref().to_string(),
                version: summary.version.into_string(),
                creator: summary.creator,
                num_waypoints: summary.num_waypoints,
                num_routes: summary.num_routes,
                num_tracks: summary.num_tracks,
            }),
            Err(err) => decoded.issues.push(DecodeError::MalformedJson {
                index,
                message: err.to_string(),
            }),
        }
    }
    decoded
}

/// Classify a full-detail element by its kind suffix
fn classify(index: usize, element: &str) -> Result<(ComponentKind, &str), DecodeError> {
    let unknown = || DecodeError::UnknownTag {
        index,
        tag: element
            .char_indices()
            .rev()
            .nth(KIND_SUFFIX_LEN - 1)
            .map(|(at, _)| element[at..].to_string())
            .unwrap_or_else(|| element.to_string()),
    };
    let split_at = element
        .len()
        .checked_sub(KIND_SUFFIX_LEN)
        .filter(|&at| element.is_char_boundary(at))
        .ok_or_else(unknown)?;
    let (json, suffix) = element.split_at(split_at);
    let kind = match suffix {
        "route" => ComponentKind::Route,
        "track" => ComponentKind::Track,
        _ => return Err(unknown()),
    };
    Ok((kind, json))
}

/// Build the detail table from a full-detail stream
///
/// Every non-JSON element opens the block of a new document. Route and track numbering
/// restarts at 1 in each block.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn materialize_detail_table(stream: &str) -> Decoded<DetailRow> {
    let mut decoded = Decoded::default();
    let mut current: Option<&str> = None;
    let mut routes = 0;
    let mut tracks = 0;

    for (index, element) in split_elements(stream).into_iter().enumerate() {
        if !element.starts_with(COMPONENT_OPENER) {
            current = Some(element);
            routes = 0;
            tracks = 0;
            continue;
        }
        let Some(file_name) = current else {
            decoded.issues.push(DecodeError::OrphanComponent { index });
            continue;
        };
        let (kind, json) = match classify(index, element) {
            Ok(classified) => classified,
            Err(issue) => {
                decoded.issues.push(issue);
                continue;
            }
        };
        let payload = match serde_json::from_str::<ComponentPayload>(json) {
            Ok(payload) => payload,
            Err(err) => {
                decoded.issues.push(DecodeError::MalformedJson {
                    index,
                    message: err.to_string(),
                });
                continue;
            }
        };
        let counter = match kind {
            ComponentKind::Route => &mut routes,
            ComponentKind::Track => &mut tracks,
        };
        *counter += 1;
        decoded.rows.push(DetailRow {
            file_name: file_name.to_string(),
            reference: ComponentRef::new(kind, *counter),
            record: payload.into_record(kind),
        });
    }
    decoded
}

fn parse_field<T: std::str::FromStr>(
    index: usize,
    field: &'static str,
    value: &str,
) -> Result<T, DecodeError> {
    value.parse().map_err(|_| DecodeError::InvalidField {
        index,
        field,
        value: value.to_string(),
    })
}

fn decode_path_group(index: usize, group: &[&str]) -> Result<ComponentRecord, DecodeError> {
    let [tag, name, points, len, is_loop] = group else {
        return Err(DecodeError::IncompletePathGroup { index });
    };
    let kind = match *tag {
        "Route " => ComponentKind::Route,
        "Track " => ComponentKind::Track,
        other => {
            return Err(DecodeError::UnknownTag {
                index,
                tag: other.to_string(),
            });
        }
    };
    Ok(ComponentRecord {
        kind,
        name: name.to_string(),
        num_points: parse_field(index + 2, "numPoints", points)?,
        length: parse_field(index + 3, "len", len)?,
        is_loop: parse_field(index + 4, "loop", is_loop)?,
    })
}

/// Build the path table from a path search stream
///
/// Route and track numbering runs across the whole response.
pub fn decode_path_table(stream: &str) -> Decoded<PathRow> {
    let mut decoded = Decoded::default();
    // Names may be empty, so only the trailing terminator is dropped
    let body = stream.strip_suffix(RECORD_SEPARATOR).unwrap_or(stream);
    if body.is_empty() {
        return decoded;
    }
    let elements: Vec<&str> = body.split(RECORD_SEPARATOR).collect();

    let mut routes = 0;
    let mut tracks = 0;
    for (group_index, group) in elements.chunks(PATH_GROUP_LEN).enumerate() {
        let index = group_index * PATH_GROUP_LEN;
        match decode_path_group(index, group) {
            Ok(record) => {
                let counter = match record.kind {
                    ComponentKind::Route => &mut routes,
                    ComponentKind::Track => &mut tracks,
                };
                *counter += 1;
                decoded.rows.push(PathRow {
                    reference: ComponentRef::new(record.kind, *counter),
                    record,
                });
            }
            Err(issue) => decoded.issues.push(issue),
        }
    }
    decoded
}

/// Decode `{"name":..,"value":..}!` items
pub fn decode_other_data(stream: &str) -> Decoded<OtherData> {
    let mut decoded = Decoded::default();
    for (index, element) in split_elements(stream).into_iter().enumerate() {
        match serde_json::from_str::<OtherData>(element) {
            Ok(item) => decoded.rows.push(item),
            Err(err) => decoded.issues.push(DecodeError::MalformedJson {
                index,
                message: err.to_string(),
            }),
        }
    }
    decoded
}

/// Every table a tagged response can carry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggedTables {
    pub summaries: Vec<DocumentSummary>,
    pub details: Vec<DetailRow>,
    pub paths: Vec<PathRow>,
    pub other_data: Vec<OtherData>,
    pub issues: Vec<DecodeError>,
}

/// Decode newline-delimited tagged records
///
/// Component numbering restarts with every `document` record; path numbering does not.
pub fn decode_tagged(stream: &str) -> TaggedTables {
    let mut tables = TaggedTables::default();
    let mut current: Option<String> = None;
    let (mut routes, mut tracks) = (0, 0);
    let (mut path_routes, mut path_tracks) = (0, 0);

    for (line_index, line) in stream.lines().enumerate() {
        let line_number = line_index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let record = match serde_json::from_str::<TaggedRecord>(line) {
            Ok(record) => record,
            Err(err) => {
                tables.issues.push(DecodeError::MalformedLine {
                    line: line_number,
                    message: err.to_string(),
                });
                continue;
            }
        };
        match record {
            TaggedRecord::Document { file_name } => {
                current = Some(file_name);
                routes = 0;
                tracks = 0;
            }
            TaggedRecord::Summary(summary) => tables.summaries.push(summary),
            TaggedRecord::Component(record) => {
                let Some(file_name) = &current else {
                    tables.issues.push(DecodeError::MalformedLine {
                        line: line_number,
                        message: "component record before any document".to_string(),
                    });
                    continue;
                };
                let counter = match record.kind {
                    ComponentKind::Route => &mut routes,
                    ComponentKind::Track => &mut tracks,
                };
                *counter += 1;
                tables.details.push(DetailRow {
                    file_name: file_name.clone(),
                    reference: ComponentRef::new(record.kind, *counter),
                    record,
                });
            }
            TaggedRecord::Path(record) => {
                let counter = match record.kind {
                    ComponentKind::Route => &mut path_routes,
                    ComponentKind::Track => &mut path_tracks,
                };
                *counter += 1;
                tables.paths.push(PathRow {
                    reference: ComponentRef::new(record.kind, *counter),
                    record,
                });
            }
            TaggedRecord::OtherData(item) => tables.other_data.push(item),
        }
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_DETAIL: &str = concat!(
        "a.gpx!",
        r#"{"name":"R1","numPoints":12,"len":340.0,"loop":false}route!"#,
        r#"{"name":"R2","numPoints":5,"len":80.0,"loop":true}route!"#,
        r#"{"name":"T1","numPoints":30,"len":1200.0,"loop":false}track!"#,
        "b.gpx!",
        "c.gpx!",
        r#"{"name":"T9","numPoints":2,"len":10.0,"loop":false}track!"#,
    );

    #[test]
    fn test_detail_table_numbering() {
        let decoded = materialize_detail_table(FULL_DETAIL);
        assert!(decoded.issues.is_empty());
        let labels: Vec<_> = decoded
            .rows
            .iter()
            .map(|row| (row.file_name.as_str(), row.label()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("a.gpx", "Route 1".to_string()),
                ("a.gpx", "Route 2".to_string()),
                ("a.gpx", "Track 1".to_string()),
                ("c.gpx", "Track 1".to_string()),
            ]
        );
        assert_eq!(decoded.rows[0].record.num_points, 12);
        assert_eq!(decoded.rows[0].record.length, 340.0);
        assert!(decoded.rows[1].record.is_loop);
    }

    #[test]
    fn test_unknown_suffix_is_reported_not_misclassified() {
        let stream = concat!(
            "a.gpx!",
            r#"{"name":"W","numPoints":1,"len":0.0,"loop":false}waypt!"#,
            r#"{"name":"R","numPoints":1,"len":0.0,"loop":false}route!"#,
        );
        let decoded = materialize_detail_table(stream);
        assert_eq!(decoded.rows.len(), 1);
        assert_eq!(decoded.rows[0].record.name, "R");
        assert_eq!(
            decoded.issues,
            vec![DecodeError::UnknownTag {
                index: 1,
                tag: "waypt".to_string()
            }]
        );
    }

    #[test]
    fn test_malformed_elements_skipped() {
        let stream = concat!(
            r#"{"name":"early","numPoints":1,"len":0.0,"loop":false}route!"#,
            "a.gpx!",
            r#"{"name":"R1","numPoints":oops}route!"#,
            "{}!",
            r#"{"name":"R2","numPoints":1,"len":0.0,"loop":false}route!"#,
        );
        let decoded = materialize_detail_table(stream);
        assert_eq!(decoded.rows.len(), 1);
        assert_eq!(decoded.rows[0].label(), "Route 1");
        assert_eq!(decoded.issues.len(), 3);
        assert!(matches!(decoded.issues[0], DecodeError::OrphanComponent { index: 0 }));
    }

    #[test]
    fn test_select_document_components() {
        let elements: Vec<String> = FULL_DETAIL.split('!').map(str::to_string).collect();
        let a = select_document_components(&elements, "a.gpx");
        assert_eq!(a.len(), 3);
        assert!(a[2].ends_with("track"));
        assert!(select_document_components(&elements, "b.gpx").is_empty());
        assert_eq!(select_document_components(&elements, "c.gpx").len(), 1);
        assert!(select_document_components(&elements, "zzz.gpx").is_empty());
    }

    #[test]
    fn test_summaries() {
        let payloads = vec![
            r#"{"version":1.1,"creator":"X","numWaypoints":0,"numRoutes":2,"numTracks":1}"#,
            r#"{"version":"1.0","creator":"Y","numWaypoints":3,"numRoutes":0,"numTracks":0}"#,
        ];
        let names = vec!["a.gpx", "b.gpx"];
        let decoded = decode_summaries(&payloads, &names);
        assert!(decoded.issues.is_empty());
        assert_eq!(decoded.rows[0].file_name, "a.gpx");
        assert_eq!(decoded.rows[0].version, "1.1");
        assert_eq!(decoded.rows[0].num_routes, 2);
        assert_eq!(decoded.rows[1].version, "1.0");
        assert_eq!(decoded.rows[1].num_waypoints, 3);

        let empty: Vec<&str> = Vec::new();
        assert!(decode_summaries(&empty, &empty).is_empty());
    }

    #[test]
    fn test_summary_count_mismatch() {
        let payloads = vec![r#"{"version":"1.1"}"#, r#"{"version":"1.1"}"#];
        let names = vec!["a.gpx"];
        let decoded = decode_summaries(&payloads, &names);
        assert_eq!(decoded.rows.len(), 1);
        assert!(matches!(
            decoded.issues[0],
            DecodeError::SummaryCountMismatch { payloads: 2, file_names: 1 }
        ));
    }

    #[test]
    fn test_path_table() {
        let stream = "Route !Hill!12!340.0!false!Track !!3!20.0!true!Route !Loop!4!40.0!true!";
        let decoded = decode_path_table(stream);
        assert!(decoded.issues.is_empty());
        let labels: Vec<_> = decoded.rows.iter().map(|r| r.reference.to_string()).collect();
        assert_eq!(labels, vec!["Route 1", "Track 1", "Route 2"]);
        assert_eq!(decoded.rows[1].record.name, "");
        assert!(decoded.rows[1].record.is_loop);
        assert_eq!(decoded.rows[0].record.num_points, 12);

        assert!(decode_path_table("").is_empty());
    }

    #[test]
    fn test_path_table_bad_groups() {
        let decoded = decode_path_table("Stop !x!1!0.0!false!Route !y!many!0.0!false!Route !z!");
        assert!(decoded.rows.is_empty());
        assert_eq!(decoded.issues.len(), 3);
        assert!(matches!(decoded.issues[0], DecodeError::UnknownTag { .. }));
        assert!(matches!(
            decoded.issues[1],
            DecodeError::InvalidField { field: "numPoints", .. }
        ));
        assert!(matches!(decoded.issues[2], DecodeError::IncompletePathGroup { .. }));
    }

    #[test]
    fn test_other_data() {
        let decoded = decode_other_data(r#"{"name":"desc","value":"flat"}!{"name":"number","value":"3"}!"#);
        assert_eq!(decoded.rows.len(), 2);
        assert_eq!(decoded.rows[0].value, "flat");
        assert!(decode_other_data("").is_empty());
    }

    #[test]
    fn test_tagged() {
        let stream = concat!(
            r#"{"type":"document","fileName":"a.gpx"}"#, "\n",
            r#"{"type":"summary","fileName":"a.gpx","version":"1.1","creator":"Bang!","numWaypoints":0,"numRoutes":1,"numTracks":0}"#, "\n",
            r#"{"type":"component","kind":"route","name":"R!1","numPoints":2,"len":10.0,"loop":false}"#, "\n",
            "garbage\n",
            r#"{"type":"document","fileName":"b.gpx"}"#, "\n",
            r#"{"type":"component","kind":"route","name":"R","numPoints":2,"len":10.0,"loop":false}"#, "\n",
        );
        let tables = decode_tagged(stream);
        assert_eq!(tables.summaries.len(), 1);
        assert_eq!(tables.summaries[0].creator, "Bang!");
        assert_eq!(tables.details.len(), 2);
        assert_eq!(tables.details[0].record.name, "R!1");
        assert_eq!(tables.details[1].file_name, "b.gpx");
        assert_eq!(tables.details[1].label(), "Route 1");
        assert_eq!(tables.issues.len(), 1);
        assert!(matches!(tables.issues[0], DecodeError::MalformedLine { line: 4, .. }));
    }
}
