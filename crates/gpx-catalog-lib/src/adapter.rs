//! Boundary to the document parser and validator
//!
//! Every document read or write goes through [`DocumentAdapter`]. [`GpxAdapter`] implements it
//! on top of the `gpx` crate; tests and alternative backends can provide their own.

use crate::{
    CatalogError, ComponentRecord, ComponentRef, Config, Document, DocumentSummary,
    DocumentTemplate, OtherData, PathQuery, PendingWaypoint, Result, utils,
};
use std::path::{Path, PathBuf};

/// Parser, validator and mutator for single documents
///
/// Read-path errors make the document contribute nothing to a response. Write-path errors
/// fail the request.
pub trait DocumentAdapter: Send + Sync {
    /// Validate the document and return its summary
    fn validate_and_summarize(&self, path: &Path) -> Result<DocumentSummary>;

    /// Routes first, then tracks, each in document order
    fn detail(&self, path: &Path) -> Result<Vec<ComponentRecord>>;

    /// Component list used by the name-only stream
    fn detail_by_name(&self, path: &Path) -> Result<Vec<ComponentRecord>> {
        self.detail(path)
    }

    fn other_data(&self, path: &Path, component: &ComponentRef) -> Result<Vec<OtherData>>;

    fn rename(&self, path: &Path, component: &ComponentRef, new_name: &str) -> Result<()>;

    /// Write a new empty document; never overwrites an existing file
    fn create_from_template(&self, template: &DocumentTemplate, target: &Path) -> Result<()>;

    /// Append one route built from `waypoints`, in order
    fn add_route(&self, path: &Path, route_name: &str, waypoints: &[PendingWaypoint])
    -> Result<()>;

    /// Components whose ends lie within the query tolerance
    fn search_path(&self, path: &Path, query: &PathQuery) -> Result<Vec<ComponentRecord>>;
}

/// [`DocumentAdapter`] backed by the `gpx` crate
#[derive(Debug, Clone)]
pub struct GpxAdapter {
    schema_path: Option<PathBuf>,
    loop_tolerance_m: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl GpxAdapter {
    /// Create an adapter bound to an optional schema file
    ///
    /// # Arguments
    /// * `schema_path` - Must end in `.xsd` and exist when given
    /// * `loop_tolerance_m` - Maximum first-to-last distance of a loop, in meters
    pub fn new(schema_path: Option<PathBuf>, loop_tolerance_m: f64) -> Result<Self> {
        let adapter = Self {
            schema_path,
            loop_tolerance_m,
        };
        adapter.check_schema()?;
        Ok(adapter)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.schema_path.clone(), config.loop_tolerance_m)
    }

    pub fn schema_path(&self) -> Option<&Path> {
        self.schema_path.as_deref()
    }

    fn check_schema(&self) -> Result<()> {
        let Some(schema) = &self.schema_path else {
            return Ok(());
        };
        let name = schema.to_string_lossy();
        if !utils::is_schema_file_name(&name) {
            return Err(CatalogError::InvalidSchema(format!("{name} is not an .xsd file")));
        }
        if !schema.is_file() {
            return Err(CatalogError::InvalidSchema(format!("{name} does not exist")));
        }
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Document> {
        self.check_schema()?;
        Document::open(path)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl DocumentAdapter for GpxAdapter {
    fn validate_and_summarize(&self, path: &Path) -> Result<DocumentSummary> {
        let document = self.load(path)?;
        Ok(document.summary(&file_name_of(path)))
    }

    fn detail(&self, path: &Path) -> Result<Vec<ComponentRecord>> {
        Ok(self.load(path)?.components(self.loop_tolerance_m))
    }

    fn other_data(&self, path: &Path, component: &ComponentRef) -> Result<Vec<OtherData>> {
        self.load(path)?.other_data(component)
    }

    fn rename(&self, path: &Path, component: &ComponentRef, new_name: &str) -> Result<()> {
        let mut document = self.load(path)?;
        document.rename(component, new_name)?;
        document.save(path)?;
        tracing::info!(file = %path.display(), %component, new_name, "Component renamed");
        Ok(())
    }

    fn create_from_template(&self, template: &DocumentTemplate, target: &Path) -> Result<()> {
        self.check_schema()?;
        let mut document = Document::from_template(template)?;
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target)
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    CatalogError::AlreadyExists(target.display().to_string())
                }
                _ => CatalogError::Io(err),
            })?;
        if let Err(err) = document.write_to(file) {
            let _ = std::fs::remove_file(target);
            return Err(err);
        }
        tracing::info!(file = %target.display(), "Document created");
        Ok(())
    }

    fn add_route(
        &self,
        path: &Path,
        route_name: &str,
        waypoints: &[PendingWaypoint],
    ) -> Result<()> {
        let mut document = self.load(path)?;
        let points: Vec<(f64, f64)> = waypoints.iter().map(|w| (w.lat, w.lon)).collect();
        document.push_route(route_name, &points)?;
        document.save(path)
    }

    fn search_path(&self, path: &Path, query: &PathQuery) -> Result<Vec<ComponentRecord>> {
        query.validate()?;
        Ok(self
            .load(path)?
            .components_between(query, self.loop_tolerance_m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComponentKind;
    use std::io::Write;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="X" xmlns="http://www.topografix.com/GPX/1/1">
  <rte>
    <name>Morning</name>
    <cmt>paved</cmt>
    <rtept lat="45.0" lon="-73.0"></rtept>
    <rtept lat="45.001" lon="-73.0"></rtept>
  </rte>
  <trk>
    <name>Evening</name>
    <trkseg>
      <trkpt lat="46.0" lon="-74.0"></trkpt>
      <trkpt lat="46.001" lon="-74.0"></trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

    fn write_sample(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_schema_must_be_xsd() {
        let dir = tempfile::tempdir().unwrap();
        let xml = dir.path().join("gpx.xml");
        std::fs::write(&xml, "").unwrap();
        assert!(matches!(
            GpxAdapter::new(Some(xml), 10.0),
            Err(CatalogError::InvalidSchema(_))
        ));

        let missing = dir.path().join("missing.xsd");
        assert!(GpxAdapter::new(Some(missing), 10.0).is_err());

        let xsd = dir.path().join("gpx.xsd");
        std::fs::write(&xsd, "").unwrap();
        let adapter = GpxAdapter::new(Some(xsd.clone()), 10.0).unwrap();
        assert_eq!(adapter.schema_path(), Some(xsd.as_path()));
    }

    #[test]
    fn test_search_path_delta_in_kilometers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), "a.gpx");
        let adapter = GpxAdapter::new(None, 10.0).unwrap();

        // About 1 km north of where "Morning" starts
        let mut query = PathQuery {
            start_lat: 45.009,
            start_lon: -73.0,
            end_lat: 0.0,
            end_lon: 0.0,
            delta: 2.0,
        };
        let found = adapter.search_path(&path, &query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Morning");

        query.delta = 0.5;
        assert!(adapter.search_path(&path, &query).unwrap().is_empty());
    }

    #[test]
    fn test_summary_and_detail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), "a.gpx");
        let adapter = GpxAdapter::new(None, 10.0).unwrap();

        let summary = adapter.validate_and_summarize(&path).unwrap();
        assert_eq!(summary.file_name, "a.gpx");
        assert_eq!(summary.creator, "X");
        assert_eq!(summary.num_routes, 1);
        assert_eq!(summary.num_tracks, 1);

        let detail = adapter.detail(&path).unwrap();
        assert_eq!(detail.len(), 2);
        assert_eq!(detail[0].kind, ComponentKind::Route);
        assert_eq!(detail[0].name, "Morning");
        // 0.001 degrees of latitude is ~111 m
        assert_eq!(detail[0].length, 110.0);
        assert_eq!(detail[1].kind, ComponentKind::Track);
        assert_eq!(adapter.detail_by_name(&path).unwrap(), detail);
    }

    #[test]
    fn test_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gpx");
        std::fs::write(&path, "<gpx").unwrap();
        let adapter = GpxAdapter::new(None, 10.0).unwrap();
        assert!(adapter.validate_and_summarize(&path).is_err());
    }

    #[test]
    fn test_other_data_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), "a.gpx");
        let adapter = GpxAdapter::new(None, 10.0).unwrap();
        let route = ComponentRef::new(ComponentKind::Route, 1);

        let data = adapter.other_data(&path, &route).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].name, "cmt");
        assert_eq!(data[0].value, "paved");

        adapter.rename(&path, &route, "Sunrise").unwrap();
        assert_eq!(adapter.detail(&path).unwrap()[0].name, "Sunrise");
        assert!(
            adapter
                .rename(&path, &ComponentRef::new(ComponentKind::Track, 5), "x")
                .is_err()
        );
    }

    #[test]
    fn test_create_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("new.gpx");
        let adapter = GpxAdapter::new(None, 10.0).unwrap();
        let template = DocumentTemplate {
            version: 1.1,
            creator: "tester".to_string(),
        };

        adapter.create_from_template(&template, &target).unwrap();
        let summary = adapter.validate_and_summarize(&target).unwrap();
        assert_eq!(summary.creator, "tester");
        assert_eq!(summary.num_routes, 0);

        assert!(matches!(
            adapter.create_from_template(&template, &target),
            Err(CatalogError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_add_route_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), "a.gpx");
        let adapter = GpxAdapter::new(None, 10.0).unwrap();

        adapter
            .add_route(
                &path,
                "Loop1",
                &[
                    PendingWaypoint::new(10.0, 10.0),
                    PendingWaypoint::new(10.01, 10.0),
                ],
            )
            .unwrap();
        let detail = adapter.detail(&path).unwrap();
        assert_eq!(detail.len(), 3);
        assert_eq!(detail[1].name, "Loop1");
        assert_eq!(detail[1].num_points, 2);

        let query = PathQuery {
            start_lat: 10.0,
            start_lon: 10.0,
            end_lat: -10.0,
            end_lon: -10.0,
            delta: 0.05,
        };
        let found = adapter.search_path(&path, &query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Loop1");

        assert!(
            adapter
                .add_route(&path, "Bad", &[PendingWaypoint::new(91.0, 0.0)])
                .is_err()
        );
        assert_eq!(adapter.detail(&path).unwrap().len(), 3);
    }
}
