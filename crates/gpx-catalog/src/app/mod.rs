//! Application module
//!
//! This module wires the command line to the catalog:
//! - One-shot subcommands for every request-level operation
//! - An interactive session reading commands from stdin, so pending waypoints survive
//!   between lines
//! - Output in table, legacy or tagged form

pub(crate) mod logging;
mod render;
pub(crate) mod settings;

use crate::app::settings::{Command, Format, SessionCommand, SessionLine, Settings, path_query};
use clap::Parser;
use gpx_catalog_lib::{Catalog, CatalogError};
use std::io::Write;
use tokio::io::AsyncBufReadExt;

/// Session used by one-shot `add-route`
const ADD_ROUTE_SESSION: &str = "add-route";

/// Errors surfaced to the user
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

/// Main application structure
pub struct GpxCatalogApp {
    catalog: Catalog,
    format: Format,
    session: String,
}

impl GpxCatalogApp {
    pub fn new(settings: &Settings) -> Result<Self, CliError> {
        let config = settings.config();
        tracing::debug!(
            dir = %config.upload_dir.display(),
            timeout = ?config.adapter_timeout,
            "Opening catalog"
        );
        Ok(Self {
            catalog: Catalog::new(config)?,
            format: settings.format,
            session: gpx_catalog_lib::DEFAULT_SESSION.to_string(),
        })
    }

    /// Run the command given on the command line
    pub async fn run(settings: Settings) -> Result<(), CliError> {
        let mut app = Self::new(&settings)?;
        let mut out = std::io::stdout();
        match settings.command {
            Command::Session { id } => {
                app.session = id;
                app.run_session(&mut out).await
            }
            command => app.execute(&mut out, command).await,
        }
    }

    /// Execute one request-level command
    pub async fn execute<W: Write>(&self, out: &mut W, command: Command) -> Result<(), CliError> {
        #[cfg(feature = "profiling")]
        profiling::scope!("GpxCatalogApp::execute");
        let format = self.format;
        match command {
            Command::List => {
                let aggregates = self.catalog.aggregates().await?;
                render::summaries(out, format, &aggregates)
            }
            Command::Files => {
                let names = self.catalog.list_file_names().await?;
                render::file_names(out, format, &names)
            }
            Command::Detail { file } => {
                let aggregates = self.catalog.aggregates().await?;
                render::detail(out, format, &aggregates, file.as_deref())
            }
            Command::Rename {
                file,
                component,
                name,
            } => {
                let applied = self.catalog.rename_component(&file, &component, &name).await?;
                render::done(out, format, applied)
            }
            Command::OtherData { file, component } => {
                let items = self.catalog.other_data(&file, &component).await?;
                render::other_data(out, format, &items)
            }
            Command::Create { file } => {
                let applied = self.catalog.create_document(&file).await?;
                render::done(out, format, applied)
            }
            Command::AddRoute { file, name, points } => {
                self.catalog.end_session(ADD_ROUTE_SESSION);
                for point in &points {
                    self.catalog
                        .add_waypoint(ADD_ROUTE_SESSION, &point.lat.to_string(), &point.lon.to_string())
                        .await?;
                }
                let receipt = self.catalog.commit_route(ADD_ROUTE_SESSION, &file, &name).await;
                self.catalog.end_session(ADD_ROUTE_SESSION);
                render::receipt(out, format, receipt?.as_ref())
            }
            Command::FindPath { start, end, delta } => {
                let results = self.catalog.find_path(path_query(start, end, delta)).await?;
                render::paths(out, format, &results)
            }
            Command::Session { .. } => Err(CliError::Usage("Already in a session".to_string())),
        }
    }

    /// Execute one session line; returns false when the session should end
    pub async fn execute_line<W: Write>(&self, out: &mut W, line: &str) -> Result<bool, CliError> {
        let words = split_words(line);
        if words.is_empty() {
            return Ok(true);
        }
        let parsed = match SessionLine::try_parse_from(&words) {
            Ok(parsed) => parsed,
            Err(err) => {
                // Help and usage errors are printed, not fatal
                write!(out, "{}", err.render())?;
                return Ok(true);
            }
        };

        let format = self.format;
        match parsed.command {
            SessionCommand::Quit => return Ok(false),
            SessionCommand::AddWaypoint { lat, lon } => {
                self.catalog.add_waypoint(&self.session, &lat, &lon).await?;
                let pending = self.catalog.pending(&self.session).await?;
                render::pending(out, format, &pending)?;
            }
            SessionCommand::Pending => {
                let pending = self.catalog.pending(&self.session).await?;
                render::pending(out, format, &pending)?;
            }
            SessionCommand::Commit { file, name } => {
                let receipt = self.catalog.commit_route(&self.session, &file, &name).await?;
                render::receipt(out, format, receipt.as_ref())?;
            }
            SessionCommand::Request(command) => self.execute(out, command).await?,
        }
        Ok(true)
    }

    /// Read commands from stdin until end of input or `quit`
    async fn run_session<W: Write>(&self, out: &mut W) -> Result<(), CliError> {
        tracing::info!(session = %self.session, "Session started, reading commands from stdin");
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match self.execute_line(out, &line).await {
                Ok(true) => {}
                Ok(false) => break,
                // A failed command does not end the session
                Err(err) => tracing::error!("{err}"),
            }
            out.flush()?;
        }
        self.catalog.end_session(&self.session);
        Ok(())
    }
}

/// Split a session line on whitespace, keeping double-quoted words together
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_word = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_in(dir: &std::path::Path, format: &str) -> GpxCatalogApp {
        let settings = Settings::try_parse_from([
            "gpx-catalog",
            "--dir",
            dir.to_str().unwrap(),
            "--format",
            format,
            "files",
        ])
        .unwrap();
        GpxCatalogApp::new(&settings).unwrap()
    }

    async fn line(app: &GpxCatalogApp, text: &str) -> String {
        let mut out = Vec::new();
        app.execute_line(&mut out, text).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_split_words() {
        assert_eq!(
            split_words(r#"rename --file a.gpx --component "Route 1" --name "Big loop""#),
            vec!["rename", "--file", "a.gpx", "--component", "Route 1", "--name", "Big loop"]
        );
        assert_eq!(split_words("  "), Vec::<String>::new());
        assert_eq!(split_words(r#"x """#), vec!["x", ""]);
    }

    #[tokio::test]
    async fn test_session_flow() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), "table");

        assert_eq!(line(&app, "files").await, "No Files\n");
        assert_eq!(line(&app, "create --file a.gpx").await, "Done\n");
        assert_eq!(line(&app, "files").await, "a.gpx\n");

        assert!(line(&app, "add-waypoint 45.0 -73.0").await.starts_with("1 pending"));
        assert!(line(&app, "add-waypoint 46.0 -74.0").await.starts_with("2 pending"));
        let committed = line(&app, "commit --file a.gpx --name Loop1").await;
        assert!(committed.contains("2 waypoint(s)"));
        assert!(line(&app, "pending").await.starts_with("0 pending"));

        let detail = line(&app, "detail --file a.gpx").await;
        assert!(detail.contains("Route 1"));
        assert!(detail.contains("Loop1"));

        let renamed = line(&app, r#"rename --file a.gpx --component "Route 1" --name Sunset"#).await;
        assert_eq!(renamed, "Done\n");
        assert!(line(&app, "detail").await.contains("Sunset"));

        let mut out = Vec::new();
        assert!(!app.execute_line(&mut out, "quit").await.unwrap());
    }

    #[tokio::test]
    async fn test_session_rejects_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), "legacy");
        let mut out = Vec::new();
        assert!(app.execute_line(&mut out, "add-waypoint 91.0 0.0").await.is_err());
        assert_eq!(line(&app, "pending").await, "\n");
    }

    #[tokio::test]
    async fn test_bad_line_prints_usage() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), "table");
        let text = line(&app, "frobnicate").await;
        assert!(!text.is_empty());
    }
}
