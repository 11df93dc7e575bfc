//! Per-request aggregation across the resolved document set
//!
//! [`collect`] queries every document once and keeps the typed results; the legacy and
//! tagged encodings are both rendered from that single pass.

use crate::resolver::{Exclusion, ResolvedSet};
use crate::wire::{self, TaggedRecord};
use crate::{ComponentRecord, DocumentAdapter, DocumentSummary, Result};
use rayon::prelude::*;

/// Typed results for one document
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentAggregate {
    pub file_name: String,
    pub summary: DocumentSummary,
    pub components: Vec<ComponentRecord>,
    pub components_by_name: Vec<ComponentRecord>,
}

/// Typed results for every valid document, in resolution order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregates {
    pub documents: Vec<DocumentAggregate>,
    pub exclusions: Vec<Exclusion>,
}

/// `\0`-joined summary columns across documents
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SummaryColumns {
    pub versions: String,
    pub creators: String,
    pub num_waypoints: String,
    pub num_routes: String,
    pub num_tracks: String,
    pub file_names: String,
}

/// The legacy response streams
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LegacyStreams {
    /// `(file_name, summary JSON)` in order
    pub summaries: Vec<(String, String)>,
    pub file_names: Vec<String>,
    pub columns: SummaryColumns,
    /// `file_name!` followed by the suffixed component records, for every document
    pub full_detail: String,
    /// Name-only records split on the separator
    pub name_detail: Vec<String>,
    /// Documents dropped because a field cannot be framed
    pub exclusions: Vec<Exclusion>,
}

struct LegacyDocument<'a> {
    file_name: &'a str,
    summary: &'a DocumentSummary,
    summary_json: String,
    detail: String,
    name_detail: String,
}

/// Query detail for every resolved document
///
/// A document whose detail query fails after validation is moved to the exclusions.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn collect(adapter: &dyn DocumentAdapter, resolved: ResolvedSet) -> Aggregates {
    let ResolvedSet {
        documents,
        mut exclusions,
    } = resolved;

    let results: Vec<_> = documents
        .into_par_iter()
        .map(|document| {
            let detail = adapter.detail(&document.path).and_then(|components| {
                let by_name = adapter.detail_by_name(&document.path)?;
                Ok((components, by_name))
            });
            (document, detail)
        })
        .collect();

    let mut aggregates = Aggregates::default();
    for (document, detail) in results {
        match detail {
            Ok((components, components_by_name)) => aggregates.documents.push(DocumentAggregate {
                file_name: document.file_name,
                summary: document.summary,
                components,
                components_by_name,
            }),
            Err(err) => {
                tracing::debug!(file = %document.file_name, "Detail query failed: {err}");
                exclusions.push(Exclusion {
                    file_name: document.file_name,
                    reason: err.to_string(),
                });
            }
        }
    }
    aggregates.exclusions = exclusions;
    aggregates
}

fn encode_legacy_document(document: &DocumentAggregate) -> Result<LegacyDocument<'_>> {
    wire::check_file_name(&document.file_name)?;
    Ok(LegacyDocument {
        file_name: &document.file_name,
        summary: &document.summary,
        summary_json: wire::summary_payload(&document.summary)?,
        detail: wire::encode_document_detail(&document.file_name, &document.components)?,
        name_detail: wire::encode_detail_by_name(&document.components_by_name)?,
    })
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Aggregates {
    pub fn file_names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.file_name.clone()).collect()
    }

    /// Render the legacy streams, leaving out documents with unframeable fields
    pub fn legacy(&self) -> LegacyStreams {
        let mut encoded = Vec::with_capacity(self.documents.len());
        let mut exclusions = Vec::new();
        for document in &self.documents {
            match encode_legacy_document(document) {
                Ok(legacy) => encoded.push(legacy),
                Err(err) => {
                    tracing::debug!(file = %document.file_name, "Left out of legacy streams: {err}");
                    exclusions.push(Exclusion {
                        file_name: document.file_name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let summaries = encoded
            .iter()
            .map(|d| (d.file_name.to_string(), d.summary_json.clone()))
            .collect();
        let file_names: Vec<String> = encoded.iter().map(|d| d.file_name.to_string()).collect();
        let columns = SummaryColumns {
            versions: wire::join_column(encoded.iter().map(|d| d.summary.version.as_str())),
            creators: wire::join_column(encoded.iter().map(|d| d.summary.creator.as_str())),
            num_waypoints: wire::join_column(
                encoded.iter().map(|d| d.summary.num_waypoints.to_string()),
            ),
            num_routes: wire::join_column(encoded.iter().map(|d| d.summary.num_routes.to_string())),
            num_tracks: wire::join_column(encoded.iter().map(|d| d.summary.num_tracks.to_string())),
            file_names: wire::join_column(&file_names),
        };
        let full_detail: String = encoded.iter().map(|d| d.detail.as_str()).collect();
        let name_detail = encoded
            .iter()
            .map(|d| d.name_detail.as_str())
            .collect::<String>()
            .split(wire::RECORD_SEPARATOR)
            .filter(|element| !element.is_empty())
            .map(str::to_string)
            .collect();

        LegacyStreams {
            summaries,
            file_names,
            columns,
            full_detail,
            name_detail,
            exclusions,
        }
    }

    /// Tagged records: per document a `document` line, its `summary`, then its components
    pub fn tagged_records(&self) -> Vec<TaggedRecord> {
        let mut records = Vec::new();
        for document in &self.documents {
            records.push(TaggedRecord::Document {
                file_name: document.file_name.clone(),
            });
            records.push(TaggedRecord::Summary(document.summary.clone()));
            records.extend(
                document
                    .components
                    .iter()
                    .cloned()
                    .map(TaggedRecord::Component),
            );
        }
        records
    }

    pub fn tagged(&self) -> Result<String> {
        wire::encode_tagged(&self.tagged_records())
    }
}
