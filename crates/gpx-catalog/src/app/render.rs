//! Writing responses to the terminal
//!
//! `table` output is produced by decoding the legacy streams, the same way a remote consumer
//! would; `legacy` and `tagged` print the encoded streams as they are.

use super::CliError;
use super::settings::Format;
use gpx_catalog_lib::aggregate::Aggregates;
use gpx_catalog_lib::decode::{self, DecodeError};
use gpx_catalog_lib::resolver::Exclusion;
use gpx_catalog_lib::search::PathResults;
use gpx_catalog_lib::wire::{self, TaggedRecord};
use gpx_catalog_lib::{CommitReceipt, OtherData, PendingWaypoint};
use std::io::Write;

const NO_FILES: &str = "No Files";
const NO_PATHS: &str = "No Paths Between";
const NO_OTHER_DATA: &str = "No Other Data";

fn report_exclusions(exclusions: &[Exclusion]) {
    for exclusion in exclusions {
        tracing::warn!(file = %exclusion.file_name, "Skipped: {}", exclusion.reason);
    }
}

fn report_issues(issues: &[DecodeError]) {
    for issue in issues {
        tracing::warn!("Undecodable element: {issue}");
    }
}

/// Summary of every document
pub fn summaries<W: Write>(out: &mut W, format: Format, aggregates: &Aggregates) -> Result<(), CliError> {
    report_exclusions(&aggregates.exclusions);
    match format {
        Format::Tagged => {
            let records: Vec<_> = aggregates
                .documents
                .iter()
                .map(|d| TaggedRecord::Summary(d.summary.clone()))
                .collect();
            write!(out, "{}", wire::encode_tagged(&records)?)?;
        }
        Format::Legacy => {
            let streams = aggregates.legacy();
            report_exclusions(&streams.exclusions);
            for (file_name, json) in &streams.summaries {
                writeln!(out, "{file_name}{}{json}", wire::RECORD_SEPARATOR)?;
            }
        }
        Format::Table => {
            let streams = aggregates.legacy();
            report_exclusions(&streams.exclusions);
            let payloads: Vec<&str> = streams.summaries.iter().map(|(_, json)| json.as_str()).collect();
            let file_names: Vec<&str> = streams.file_names.iter().map(String::as_str).collect();
            let decoded = decode::decode_summaries(&payloads, &file_names);
            report_issues(&decoded.issues);
            if decoded.is_empty() {
                writeln!(out, "{NO_FILES}")?;
                return Ok(());
            }
            writeln!(
                out,
                "{:<32} {:<7} {:<20} {:>9} {:>6} {:>6}",
                "File", "Version", "Creator", "Waypoints", "Routes", "Tracks"
            )?;
            for row in &decoded.rows {
                writeln!(
                    out,
                    "{:<32} {:<7} {:<20} {:>9} {:>6} {:>6}",
                    row.file_name,
                    row.version,
                    row.creator,
                    row.num_waypoints,
                    row.num_routes,
                    row.num_tracks
                )?;
            }
        }
    }
    Ok(())
}

/// Names of every document
pub fn file_names<W: Write>(out: &mut W, format: Format, names: &[String]) -> Result<(), CliError> {
    match format {
        Format::Tagged => {
            let records: Vec<_> = names
                .iter()
                .map(|name| TaggedRecord::Document {
                    file_name: name.clone(),
                })
                .collect();
            write!(out, "{}", wire::encode_tagged(&records)?)?;
        }
        Format::Legacy => writeln!(out, "{}", wire::join_column(names))?,
        Format::Table if names.is_empty() => writeln!(out, "{NO_FILES}")?,
        Format::Table => {
            for name in names {
                writeln!(out, "{name}")?;
            }
        }
    }
    Ok(())
}

/// Component detail of every document, or only of `file`
pub fn detail<W: Write>(
    out: &mut W,
    format: Format,
    aggregates: &Aggregates,
    file: Option<&str>,
) -> Result<(), CliError> {
    report_exclusions(&aggregates.exclusions);
    if format == Format::Tagged {
        let mut records = aggregates.tagged_records();
        if let Some(file) = file {
            let mut current = None;
            records.retain(|record| {
                if let TaggedRecord::Document { file_name } = record {
                    current = Some(file_name.clone());
                }
                current.as_deref() == Some(file)
            });
        }
        write!(out, "{}", wire::encode_tagged(&records)?)?;
        return Ok(());
    }

    let streams = aggregates.legacy();
    report_exclusions(&streams.exclusions);
    if format == Format::Legacy {
        match file {
            Some(file) => {
                let elements = decode::split_elements(&streams.full_detail);
                for element in decode::select_document_components(&elements, file) {
                    write!(out, "{element}{}", wire::RECORD_SEPARATOR)?;
                }
                writeln!(out)?;
            }
            None => writeln!(out, "{}", streams.full_detail)?,
        }
        return Ok(());
    }

    let decoded = decode::materialize_detail_table(&streams.full_detail);
    report_issues(&decoded.issues);
    let rows: Vec<_> = decoded
        .rows
        .iter()
        .filter(|row| file.is_none_or(|file| row.file_name == file))
        .collect();
    if rows.is_empty() {
        writeln!(out, "{NO_FILES}")?;
        return Ok(());
    }
    writeln!(
        out,
        "{:<32} {:<10} {:<24} {:>7} {:>10} {:>5}",
        "File", "Component", "Name", "Points", "Length (m)", "Loop"
    )?;
    for row in rows {
        writeln!(
            out,
            "{:<32} {:<10} {:<24} {:>7} {:>10.1} {:>5}",
            row.file_name,
            row.label(),
            row.record.name,
            row.record.num_points,
            row.record.length,
            row.record.is_loop
        )?;
    }
    Ok(())
}

pub fn other_data<W: Write>(out: &mut W, format: Format, items: &[OtherData]) -> Result<(), CliError> {
    match format {
        Format::Tagged => {
            let records: Vec<_> = items.iter().cloned().map(TaggedRecord::OtherData).collect();
            write!(out, "{}", wire::encode_tagged(&records)?)?;
        }
        Format::Legacy => writeln!(out, "{}", wire::encode_other_data(items)?)?,
        Format::Table => {
            let decoded = decode::decode_other_data(&wire::encode_other_data(items)?);
            report_issues(&decoded.issues);
            if decoded.is_empty() {
                writeln!(out, "{NO_OTHER_DATA}")?;
            }
            for item in &decoded.rows {
                writeln!(out, "{:<8} {}", item.name, item.value)?;
            }
        }
    }
    Ok(())
}

/// Path search matches
pub fn paths<W: Write>(out: &mut W, format: Format, results: &PathResults) -> Result<(), CliError> {
    match format {
        Format::Tagged => write!(out, "{}", results.tagged()?)?,
        Format::Legacy => writeln!(out, "{}", results.legacy())?,
        Format::Table => {
            let decoded = decode::decode_path_table(&results.legacy());
            report_issues(&decoded.issues);
            if decoded.is_empty() {
                writeln!(out, "{NO_PATHS}")?;
                return Ok(());
            }
            writeln!(
                out,
                "{:<10} {:<24} {:>7} {:>10} {:>5}",
                "Component", "Name", "Points", "Length (m)", "Loop"
            )?;
            for row in &decoded.rows {
                writeln!(
                    out,
                    "{:<10} {:<24} {:>7} {:>10.1} {:>5}",
                    row.reference.to_string(),
                    row.record.name,
                    row.record.num_points,
                    row.record.length,
                    row.record.is_loop
                )?;
            }
        }
    }
    Ok(())
}

/// Pending waypoints of a session
pub fn pending<W: Write>(out: &mut W, format: Format, waypoints: &[PendingWaypoint]) -> Result<(), CliError> {
    match format {
        Format::Tagged => {
            let line = serde_json::json!({ "type": "pending", "waypoints": waypoints });
            writeln!(out, "{line}")?;
        }
        Format::Legacy => writeln!(out, "{}", wire::encode_waypoint_blob(waypoints)?)?,
        Format::Table => {
            writeln!(out, "{} pending waypoint(s)", waypoints.len())?;
            for (i, waypoint) in waypoints.iter().enumerate() {
                writeln!(out, "{:>4}  {:>11.6} {:>11.6}", i + 1, waypoint.lat, waypoint.lon)?;
            }
        }
    }
    Ok(())
}

/// Outcome of a route commit; `None` when nothing was committed
pub fn receipt<W: Write>(out: &mut W, format: Format, receipt: Option<&CommitReceipt>) -> Result<(), CliError> {
    let Some(receipt) = receipt else {
        return done(out, format, false);
    };
    match format {
        Format::Tagged => {
            let line = serde_json::json!({
                "type": "commit",
                "fileName": receipt.file_name,
                "routeName": receipt.route_name,
                "waypoints": receipt.waypoints,
            });
            writeln!(out, "{line}")?;
        }
        Format::Legacy => writeln!(out, "TRUE")?,
        Format::Table => writeln!(
            out,
            "Added route {:?} with {} waypoint(s) to {}",
            receipt.route_name, receipt.waypoints, receipt.file_name
        )?,
    }
    Ok(())
}

/// Whether a mutation was applied
pub fn done<W: Write>(out: &mut W, format: Format, applied: bool) -> Result<(), CliError> {
    match format {
        Format::Tagged => writeln!(out, "{}", serde_json::json!({ "type": "status", "applied": applied }))?,
        Format::Legacy => writeln!(out, "{}", if applied { "TRUE" } else { gpx_catalog_lib::SENTINEL_ABSENT })?,
        Format::Table => writeln!(out, "{}", if applied { "Done" } else { "Nothing to do" })?,
    }
    Ok(())
}
