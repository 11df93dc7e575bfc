//! Request-level catalog operations
//!
//! Each operation re-resolves the working directory, runs its adapter work on the blocking
//! pool and gives up after [`Config::adapter_timeout`]. Parameters equal to the absent
//! sentinel turn an operation into a no-op.

use crate::aggregate::{self, Aggregates};
use crate::decode::{self, Decoded, DetailRow};
use crate::resolver::{self, ResolvedSet};
use crate::search::{self, PathResults};
use crate::{
    CatalogError, CommitReceipt, ComponentRef, Config, DocumentAdapter, GpxAdapter, OtherData,
    PathQuery, PendingWaypoint, Result, WaypointAccumulator, is_absent, utils,
};
use dashmap::DashMap;
use std::sync::Arc;

/// Session used when the caller does not name one
pub const DEFAULT_SESSION: &str = "default";

/// Async front for every request-level operation
pub struct Catalog {
    adapter: Arc<dyn DocumentAdapter>,
    config: Arc<Config>,
    sessions: DashMap<String, Arc<WaypointAccumulator>>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Create a catalog backed by [`GpxAdapter`]
    pub fn new(config: Config) -> Result<Self> {
        let adapter = GpxAdapter::from_config(&config)?;
        Ok(Self::with_adapter(Arc::new(adapter), config))
    }

    /// Create a catalog backed by any adapter
    pub fn with_adapter(adapter: Arc<dyn DocumentAdapter>, config: Config) -> Self {
        Self {
            adapter,
            config: Arc::new(config),
            sessions: DashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accumulator of `session`, created on first use
    pub fn session(&self, session: &str) -> Arc<WaypointAccumulator> {
        self.sessions
            .entry(session.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Forget a session and its pending waypoints
    pub fn end_session(&self, session: &str) -> bool {
        self.sessions.remove(session).is_some()
    }

    /// Run `op` on the blocking pool, bounded by the adapter timeout
    async fn run_blocking<T, F>(&self, name: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DocumentAdapter, &Config) -> Result<T> + Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        let config = Arc::clone(&self.config);
        let limit = config.adapter_timeout;
        let task = tokio::task::spawn_blocking(move || op(adapter.as_ref(), &config));

        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => Err(CatalogError::Join(err.to_string())),
            Err(_) => {
                tracing::warn!(operation = name, ?limit, "Adapter call timed out");
                Err(CatalogError::Timeout(limit))
            }
        }
    }

    /// Valid documents with their summaries, plus exclusion diagnostics
    pub async fn list_summaries(&self) -> Result<ResolvedSet> {
        self.run_blocking("list_summaries", |adapter, config| {
            resolver::resolve(adapter, &config.upload_dir)
        })
        .await
    }

    pub async fn list_file_names(&self) -> Result<Vec<String>> {
        Ok(self.list_summaries().await?.file_names())
    }

    /// Summaries and component detail of every valid document
    pub async fn aggregates(&self) -> Result<Aggregates> {
        self.run_blocking("aggregates", |adapter, config| {
            let resolved = resolver::resolve(adapter, &config.upload_dir)?;
            Ok(aggregate::collect(adapter, resolved))
        })
        .await
    }

    /// Detail table decoded from the full-detail stream
    pub async fn detail_table(&self) -> Result<Decoded<DetailRow>> {
        let streams = self.aggregates().await?.legacy();
        Ok(decode::materialize_detail_table(&streams.full_detail))
    }

    /// Rename one component of `file_name`
    ///
    /// # Returns
    /// `false` when any parameter is absent and nothing was changed.
    pub async fn rename_component(&self, file_name: &str, component: &str, new_name: &str) -> Result<bool> {
        if [file_name, component, new_name].into_iter().any(is_absent) {
            return Ok(false);
        }
        let component: ComponentRef = component.parse()?;
        let file_name = checked_file_name(file_name)?;
        let new_name = new_name.to_string();
        self.run_blocking("rename_component", move |adapter, config| {
            adapter.rename(&config.upload_dir.join(&file_name), &component, &new_name)
        })
        .await?;
        Ok(true)
    }

    /// Descriptive child elements of one component; empty when a parameter is absent
    pub async fn other_data(&self, file_name: &str, component: &str) -> Result<Vec<OtherData>> {
        if is_absent(file_name) || is_absent(component) {
            return Ok(Vec::new());
        }
        let component: ComponentRef = component.parse()?;
        let file_name = checked_file_name(file_name)?;
        self.run_blocking("other_data", move |adapter, config| {
            adapter.other_data(&config.upload_dir.join(&file_name), &component)
        })
        .await
    }

    /// Queue a waypoint in `session` and return that session's blob
    ///
    /// Runs on the blocking pool, since a commit in flight holds the session lock for the
    /// whole file write. A timed-out call may still queue its waypoint once the lock frees.
    pub async fn add_waypoint(&self, session: &str, lat: &str, lon: &str) -> Result<String> {
        let accumulator = self.session(session);
        let lat = lat.to_string();
        let lon = lon.to_string();
        self.run_blocking("add_waypoint", move |_, _| accumulator.add_waypoint(&lat, &lon))
            .await
    }

    /// Snapshot of the waypoints pending in `session`
    pub async fn pending(&self, session: &str) -> Result<Vec<PendingWaypoint>> {
        let accumulator = self.session(session);
        self.run_blocking("pending", move |_, _| Ok(accumulator.pending()))
            .await
    }

    /// Drain `session` into a new route of `file_name`
    pub async fn commit_route(&self, session: &str, file_name: &str, route_name: &str) -> Result<Option<CommitReceipt>> {
        let accumulator = self.session(session);
        let file_name = file_name.to_string();
        let route_name = route_name.to_string();
        self.run_blocking("commit_route", move |adapter, config| {
            accumulator.commit_route(adapter, &config.upload_dir, &file_name, &route_name)
        })
        .await
    }

    /// Create an empty document from the configured template
    ///
    /// # Returns
    /// `false` when the file name is absent.
    pub async fn create_document(&self, file_name: &str) -> Result<bool> {
        if is_absent(file_name) {
            return Ok(false);
        }
        let file_name = checked_file_name(file_name)?;
        self.run_blocking("create_document", move |adapter, config| {
            adapter.create_from_template(&config.template(), &config.upload_dir.join(&file_name))
        })
        .await?;
        Ok(true)
    }

    /// Path search across every valid document
    pub async fn find_path(&self, query: PathQuery) -> Result<PathResults> {
        query.validate()?;
        self.run_blocking("find_path", move |adapter, config| {
            let resolved = resolver::resolve(adapter, &config.upload_dir)?;
            let results = search::find_paths(adapter, &resolved, &query);
            tracing::debug!(
                documents = resolved.documents.len(),
                matches = results.match_count(),
                "Path search finished"
            );
            Ok(results)
        })
        .await
    }
}

/// Only plain `.gpx` names inside the working directory are accepted
fn checked_file_name(file_name: &str) -> Result<String> {
    let plain = !file_name.contains(['/', '\\']) && file_name != ".." && file_name != ".";
    if plain && utils::is_gpx_file_name(file_name) {
        Ok(file_name.to_string())
    } else {
        Err(CatalogError::NotGpxFile(file_name.to_string()))
    }
}
