//! Project persistence behind a path picker.
//!
//! The picker stands in for the native open/save dialogs: `None` means the
//! user cancelled, which the store reports as `Ok(false)` / `Ok(None)`
//! rather than as an error.

use std::path::{Path, PathBuf};

use chrono::Utc;

use super::{IdGenerator, Project, UuidGenerator};
use crate::Result;

/// Chooses where a project is written to or read from.
pub trait PathPicker: Send + Sync {
    /// Destination for saving; `default_name` is the suggested file name.
    fn save_path(&self, default_name: &str) -> Option<PathBuf>;

    /// Existing project file to open.
    fn open_path(&self) -> Option<PathBuf>;
}

/// Always answers with the same path, or cancels when it has none.
#[derive(Debug, Clone, Default)]
pub struct FixedPathPicker {
    path: Option<PathBuf>,
}

impl FixedPathPicker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A picker that behaves like a dismissed dialog.
    pub fn cancelled() -> Self {
        Self { path: None }
    }
}

impl PathPicker for FixedPathPicker {
    fn save_path(&self, _default_name: &str) -> Option<PathBuf> {
        self.path.clone()
    }

    fn open_path(&self) -> Option<PathBuf> {
        self.path.clone()
    }
}

/// Native file dialogs.
#[cfg(feature = "dialogs")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeDialogPicker;

#[cfg(feature = "dialogs")]
impl PathPicker for NativeDialogPicker {
    fn save_path(&self, default_name: &str) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Save Project")
            .set_file_name(default_name)
            .add_filter("ForensicMap Project", &["json"])
            .save_file()
    }

    fn open_path(&self) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Load Project")
            .add_filter("ForensicMap Project", &["json"])
            .pick_file()
    }
}

/// Create, save and load operations offered to the UI.
pub trait ProjectStore {
    fn create(&self, name: &str) -> Project;

    /// Returns `Ok(false)` when the user cancelled.
    fn save(&self, project: &Project) -> Result<bool>;

    /// Returns `Ok(None)` when the user cancelled.
    fn load(&self) -> Result<Option<Project>>;
}

/// Stores projects as pretty-printed JSON files.
pub struct FileProjectStore<P: PathPicker> {
    picker: P,
    ids: Box<dyn IdGenerator>,
}

impl<P: PathPicker> FileProjectStore<P> {
    pub fn new(picker: P) -> Self {
        Self::with_ids(picker, Box::new(UuidGenerator))
    }

    pub fn with_ids(picker: P, ids: Box<dyn IdGenerator>) -> Self {
        Self { picker, ids }
    }
}

impl<P: PathPicker> ProjectStore for FileProjectStore<P> {
    fn create(&self, name: &str) -> Project {
        Project::create(name, self.ids.as_ref(), Utc::now())
    }

    fn save(&self, project: &Project) -> Result<bool> {
        let Some(path) = self.picker.save_path(&format!("{}.json", project.name)) else {
            log::info!("save of project {} cancelled", project.id);
            return Ok(false);
        };
        write_project(&path, project)?;
        log::info!("saved project {} to {}", project.id, path.display());
        Ok(true)
    }

    fn load(&self) -> Result<Option<Project>> {
        let Some(path) = self.picker.open_path() else {
            log::info!("project load cancelled");
            return Ok(None);
        };
        let project = read_project(&path)?;
        log::info!(
            "loaded project {} ({} points) from {}",
            project.id,
            project.points.len(),
            path.display()
        );
        Ok(Some(project))
    }
}

pub fn write_project(path: &Path, project: &Project) -> Result<()> {
    std::fs::write(path, project.to_json()?)?;
    Ok(())
}

pub fn read_project(path: &Path) -> Result<Project> {
    let content = std::fs::read_to_string(path)?;
    Project::from_json(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{GeoPosition, Measurement, SequentialIds};
    use crate::View;

    fn store(path: Option<PathBuf>) -> FileProjectStore<FixedPathPicker> {
        let picker = path.map(FixedPathPicker::new).unwrap_or_else(FixedPathPicker::cancelled);
        FileProjectStore::with_ids(picker, Box::new(SequentialIds::new("test")))
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let store = store(Some(path.clone()));
        let ids = SequentialIds::new("pt");

        let mut project = store.create("Scene");
        assert_eq!(project.id, "test-1");
        project
            .add_measurement(
                "P1",
                Measurement::Baseline { x: 10.0, y: 0.0 },
                None,
                &ids,
                Utc::now(),
            )
            .unwrap();
        project
            .add_measurement(
                "P2",
                Measurement::Triangulation { dist_a: 3.25, dist_b: 7.5 },
                Some(GeoPosition::new(-58.8341, -27.4693)),
                &ids,
                Utc::now(),
            )
            .unwrap();
        project
            .add_asset("pickup", &View::new(-58.8344, -27.469213, 16.0), &ids, Utc::now())
            .unwrap();

        assert!(store.save(&project).unwrap());
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded, project);
        let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(serde_json::to_value(&loaded).unwrap(), saved);
        assert_eq!(serde_json::to_value(&project).unwrap(), saved);
    }

    #[test]
    fn test_cancelled_dialogs_are_not_errors() {
        let store = store(None);
        let project = store.create("Cancelled");
        assert!(!store.save(&project).unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_load_reports_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(store(Some(path)).load().is_err());

        let missing = dir.path().join("missing.json");
        assert!(store(Some(missing)).load().is_err());
    }
}
