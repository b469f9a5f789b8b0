//! Model sources.
//!
//! [`ModelSource`] is the seam between the predictor and wherever trained
//! models live. [`FileModelRegistry`] keeps them on disk as
//! `<root>/<model_name>/<version>/<artifact>`.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, WellbeingError};
use crate::logging::OperationTimer;
use crate::model::{Classifier, ModelArtifact};

/// File names tried, in order, before searching a version directory
const ARTIFACT_NAMES: [&str; 3] = ["model.json", "model.yaml", "model.yml"];
const ARTIFACT_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Fetches a trained model by logical name.
pub trait ModelSource: Send + Sync {
    /// Load the model called `name`
    fn load(&self, name: &str) -> Result<Arc<dyn Classifier>>;
}

/// Enumerates and removes stored model versions.
pub trait ModelCatalog {
    /// Every stored version whose model name starts with `prefix`
    fn list_models(&self, prefix: &str) -> Result<Vec<ModelVersion>>;

    /// Remove one stored version; `false` when it was already gone
    fn delete_version(&self, model: &ModelVersion) -> Result<bool>;
}

/// One stored version of one model
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelVersion {
    /// Logical model name
    pub name: String,
    /// Version number, starting at 1
    pub version: u32,
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// Directory-backed model registry pinned to one version
#[derive(Debug, Clone)]
pub struct FileModelRegistry {
    root: PathBuf,
    version: u32,
}

impl FileModelRegistry {
    /// Registry rooted at `root` serving `version` of every model
    pub fn new(root: impl Into<PathBuf>, version: u32) -> Self {
        Self {
            root: root.into(),
            version,
        }
    }

    /// Registry root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Version served by [`ModelSource::load`]
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    fn version_dir(&self, name: &str, version: u32) -> PathBuf {
        self.root.join(name).join(version.to_string())
    }

    /// Store `artifact` as `name` at `version`, replacing any previous file
    pub fn save(&self, name: &str, version: u32, artifact: &ModelArtifact) -> Result<PathBuf> {
        let dir = self.version_dir(name, version);
        fs::create_dir_all(&dir)?;
        let path = dir.join(ARTIFACT_NAMES[0]);
        fs::write(&path, serde_json::to_string_pretty(artifact)?)?;
        info!(model = name, version, path = %path.display(), "Saved model artifact");
        Ok(path)
    }

    fn artifact_path(dir: &Path) -> Result<Option<PathBuf>> {
        for name in ARTIFACT_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }

        let mut found = Vec::new();
        collect_artifacts(dir, &mut found)?;
        found.sort();
        Ok(found.into_iter().next())
    }
}

fn collect_artifacts(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_artifacts(&path, found)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| ARTIFACT_EXTENSIONS.contains(&e))
        {
            found.push(path);
        }
    }
    Ok(())
}

impl ModelCatalog for FileModelRegistry {
    fn list_models(&self, prefix: &str) -> Result<Vec<ModelVersion>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(prefix) {
                continue;
            }
            for version_entry in fs::read_dir(entry.path())? {
                let version_entry = version_entry?;
                if !version_entry.file_type()?.is_dir() {
                    continue;
                }
                match version_entry.file_name().to_string_lossy().parse::<u32>() {
                    Ok(version) => found.push(ModelVersion {
                        name: name.clone(),
                        version,
                    }),
                    Err(_) => debug!(
                        path = %version_entry.path().display(),
                        "Skipping non-numeric version directory"
                    ),
                }
            }
        }
        found.sort();
        Ok(found)
    }

    // the model directory goes with its last version
    fn delete_version(&self, model: &ModelVersion) -> Result<bool> {
        let dir = self.version_dir(&model.name, model.version);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        let model_dir = self.root.join(&model.name);
        if fs::read_dir(&model_dir)?.next().is_none() {
            fs::remove_dir(&model_dir)?;
        }
        info!(model = %model, "Deleted model version");
        Ok(true)
    }
}

impl ModelSource for FileModelRegistry {
    fn load(&self, name: &str) -> Result<Arc<dyn Classifier>> {
        let _timer = OperationTimer::new("load_model");
        let dir = self.version_dir(name, self.version);
        if !dir.is_dir() {
            return Err(WellbeingError::ModelNotFound {
                name: name.to_string(),
                version: self.version,
            });
        }

        let path = Self::artifact_path(&dir)?.ok_or_else(|| {
            warn!(model = name, dir = %dir.display(), "Version directory holds no artifact");
            WellbeingError::ModelSource(format!("no model artifact under {}", dir.display()))
        })?;

        let artifact = ModelArtifact::load(&path)?;
        info!(model = name, version = self.version, path = %path.display(), "Loaded model");
        Ok(Arc::new(artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ARTIFACT: &str = r#"{
        "estimator": {
            "kind": "logistic",
            "feature_names": ["stress_num"],
            "coefficients": [[1.0], [0.0], [-1.0]],
            "intercepts": [0.0, 0.0, 0.0]
        }
    }"#;

    #[test]
    fn test_missing_model_is_not_found() {
        let dir = TempDir::new().unwrap();
        let registry = FileModelRegistry::new(dir.path(), 1);
        let err = registry.load("absent").unwrap_err();
        assert!(matches!(err, WellbeingError::ModelNotFound { version: 1, .. }));
    }

    #[test]
    fn test_nested_artifact_is_found() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("mood").join("1").join("export").join("pipeline");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("clf.json"), ARTIFACT).unwrap();

        let registry = FileModelRegistry::new(dir.path(), 1);
        let model = registry.load("mood").unwrap();
        assert_eq!(model.expected_columns().unwrap(), &["stress_num".to_string()]);
    }

    #[test]
    fn test_empty_version_dir_is_a_source_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("mood").join("1")).unwrap();
        let registry = FileModelRegistry::new(dir.path(), 1);
        assert!(matches!(
            registry.load("mood").unwrap_err(),
            WellbeingError::ModelSource(_)
        ));
    }

    #[test]
    fn test_list_skips_non_numeric_versions() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("mood").join("2")).unwrap();
        fs::create_dir_all(dir.path().join("mood").join("latest")).unwrap();
        let registry = FileModelRegistry::new(dir.path(), 1);
        let listed = registry.list_models("mo").unwrap();
        assert_eq!(
            listed,
            vec![ModelVersion {
                name: "mood".to_string(),
                version: 2
            }]
        );
    }
}
