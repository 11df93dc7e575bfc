//! GPX Catalog - Command-line front end
//!
//! This crate parses the command line, configures logging and drives the request-level
//! operations of `gpx-catalog-lib`, printing the decoded results.

mod app;

pub use app::logging::setup_logging;
pub use app::settings::Settings;
pub use app::{CliError, GpxCatalogApp};
