//! Document set resolution
//!
//! Lists the `.gpx` candidates of a working directory in listing order and validates every
//! candidate through the adapter. Nothing is cached: each call reads the directory again.

use crate::{DocumentAdapter, DocumentSummary, Result, utils};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// A candidate that passed validation
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedDocument {
    pub file_name: String,
    pub path: PathBuf,
    pub summary: DocumentSummary,
}

/// A candidate left out of every response, with the reason
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exclusion {
    pub file_name: String,
    pub reason: String,
}

/// Valid documents in listing order plus the diagnostics for everything excluded
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedSet {
    pub documents: Vec<ResolvedDocument>,
    pub exclusions: Vec<Exclusion>,
}

impl ResolvedSet {
    pub fn file_names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.file_name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// File names in `dir` carrying the `.gpx` suffix, in directory listing order
///
/// Names that are not valid UTF-8 are skipped.
pub fn list_candidates(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if utils::is_gpx_file_name(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

/// Resolve the valid document set of `dir`
///
/// Candidates are validated in parallel; the result keeps listing order.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn resolve(adapter: &dyn DocumentAdapter, dir: &Path) -> Result<ResolvedSet> {
    let candidates = list_candidates(dir)?;

    let validated: Vec<_> = candidates
        .into_par_iter()
        .map(|file_name| {
            let path = dir.join(&file_name);
            let summary = adapter.validate_and_summarize(&path);
            (file_name, path, summary)
        })
        .collect();

    let mut set = ResolvedSet::default();
    for (file_name, path, summary) in validated {
        match summary {
            Ok(summary) => set.documents.push(ResolvedDocument {
                file_name,
                path,
                summary,
            }),
            Err(err) => {
                tracing::debug!(file = %file_name, "Excluding invalid document: {err}");
                set.exclusions.push(Exclusion {
                    file_name,
                    reason: err.to_string(),
                });
            }
        }
    }

    tracing::debug!(
        dir = %dir.display(),
        valid = set.documents.len(),
        excluded = set.exclusions.len(),
        "Resolved document set"
    );
    Ok(set)
}
