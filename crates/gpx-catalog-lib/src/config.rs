//! Catalog configuration

use crate::DocumentTemplate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a document catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Working directory holding the documents
    pub upload_dir: PathBuf,
    /// Schema file handed to the adapter at construction, if any
    pub schema_path: Option<PathBuf>,
    /// Upper bound for one request's adapter work
    pub adapter_timeout: Duration,
    /// Maximum distance in meters between the first and last point of a loop
    pub loop_tolerance_m: f64,
    /// GPX version written into newly created documents
    pub template_version: f64,
    /// Creator written into newly created documents
    pub template_creator: String,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Default for Config {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            schema_path: None,
            adapter_timeout: Duration::from_secs(10),
            loop_tolerance_m: 10.0,
            template_version: 1.1,
            template_creator: "gpx-catalog".to_string(),
        }
    }
}

impl Config {
    /// Template used by document creation
    pub fn template(&self) -> DocumentTemplate {
        DocumentTemplate {
            version: self.template_version,
            creator: self.template_creator.clone(),
        }
    }
}
