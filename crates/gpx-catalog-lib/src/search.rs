//! Path search fanned out across the resolved document set

use crate::resolver::ResolvedSet;
use crate::wire::{self, TaggedRecord};
use crate::{ComponentRecord, DocumentAdapter, PathQuery, Result};
use rayon::prelude::*;

/// Matches of one document
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentMatches {
    pub file_name: String,
    pub matches: Vec<ComponentRecord>,
}

/// Matches of every document with at least one, in resolution order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathResults {
    pub documents: Vec<DocumentMatches>,
}

/// Run `query` against every resolved document
///
/// A document whose search fails contributes nothing.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn find_paths(adapter: &dyn DocumentAdapter, resolved: &ResolvedSet, query: &PathQuery) -> PathResults {
    let documents = resolved
        .documents
        .par_iter()
        .filter_map(|document| match adapter.search_path(&document.path, query) {
            Ok(matches) if !matches.is_empty() => Some(DocumentMatches {
                file_name: document.file_name.clone(),
                matches,
            }),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!(file = %document.file_name, "Path search failed: {err}");
                None
            }
        })
        .collect();
    PathResults { documents }
}

impl PathResults {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn match_count(&self) -> usize {
        self.documents.iter().map(|d| d.matches.len()).sum()
    }

    /// Concatenated legacy path groups; empty when nothing matched
    pub fn legacy(&self) -> String {
        let mut out = String::new();
        for document in &self.documents {
            match wire::encode_path_matches(&document.matches) {
                Ok(encoded) => out.push_str(&encoded),
                Err(err) => {
                    tracing::debug!(file = %document.file_name, "Left out of path stream: {err}");
                }
            }
        }
        out
    }

    pub fn tagged(&self) -> Result<String> {
        let records: Vec<TaggedRecord> = self
            .documents
            .iter()
            .flat_map(|document| {
                std::iter::once(TaggedRecord::Document {
                    file_name: document.file_name.clone(),
                })
                .chain(document.matches.iter().cloned().map(TaggedRecord::Path))
            })
            .collect();
        wire::encode_tagged(&records)
    }
}
