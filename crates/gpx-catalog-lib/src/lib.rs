//! GPX Catalog Library - Aggregation and Path Queries over a Directory of GPX Documents
//!
//! This library manages a working directory of GPX documents: it discovers which files are
//! valid documents, fans metadata and detail queries out across all of them, merges the
//! per-document results into one ordered response, holds pending waypoints for the next
//! route edit, and decodes the merged response back into typed tables.
//!
//! # Architecture
//!
//! - **[`resolver`]**: Lists `.gpx` candidates in listing order and validates each one
//! - **[`DocumentAdapter`]**: Boundary to the parser/validator, implemented by [`GpxAdapter`]
//! - **[`aggregate`]**: Builds the summary, full-detail and name-only streams
//! - **[`WaypointAccumulator`]**: Pending waypoints drained by the next route commit
//! - **[`search`]**: Bounded path search fanned out over every document
//! - **[`decode`]**: Consumer-side decoder that rebuilds typed rows from the streams
//! - **[`Catalog`]**: Async request-level operations with bounded adapter timeouts
//!
//! # Policies
//!
//! - **No caching**: every request re-resolves and re-validates the whole directory.
//! - **Ordering**: every merged output follows the resolver's listing order.
//! - **Exclusions**: invalid documents never appear in the primary output; the reasons are
//!   reported through [`resolver::Exclusion`] diagnostics.

pub mod accumulator;
pub mod adapter;
pub mod aggregate;
mod catalog;
mod config;
pub mod decode;
mod document;
pub mod resolver;
pub mod search;
pub mod utils;
pub mod wire;

// Public API exports
pub use accumulator::{CommitReceipt, PendingWaypoint, WaypointAccumulator};
pub use adapter::{DocumentAdapter, GpxAdapter};
pub use catalog::{Catalog, DEFAULT_SESSION};
pub use config::Config;
pub use document::{
    ComponentKind, ComponentRecord, ComponentRef, Document, DocumentSummary, DocumentTemplate,
    OtherData, PathQuery,
};

/// Caller-side convention for "no value supplied"
pub const SENTINEL_ABSENT: &str = "FALSE";

/// Returns true when a request parameter carries the absent sentinel
#[inline]
pub fn is_absent(value: &str) -> bool {
    value == SENTINEL_ABSENT
}

/// Error types for the catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("GPX parsing error: {0}")]
    GpxParse(#[from] gpx::errors::GpxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid schema path: {0}")]
    InvalidSchema(String),

    #[error("Not a GPX file name: {0}")]
    NotGpxFile(String),

    #[error("Invalid component reference: {0}")]
    InvalidComponentRef(String),

    #[error("No {kind} number {index} in document")]
    ComponentNotFound { kind: ComponentKind, index: usize },

    #[error("Coordinate out of range: {0}")]
    CoordinateOutOfRange(String),

    #[error("Field {field:?} contains a reserved delimiter: {value:?}")]
    ReservedDelimiter { field: &'static str, value: String },

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Route commit to {file} failed, {} pending waypoints discarded: {source}", .discarded.len())]
    RouteCommit {
        file: String,
        discarded: Vec<PendingWaypoint>,
        #[source]
        source: Box<CatalogError>,
    },

    #[error("Adapter call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Background task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
