//! Bulk removal of stored model versions by name prefix.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::registry::{ModelCatalog, ModelVersion};
use crate::validation::InputValidator;

/// What happened to one model version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// Dry run: the version would be deleted
    WouldDelete {
        /// Model name
        name: String,
        /// Model version
        version: u32,
    },
    /// The version is gone (whether or not this run removed it)
    Deleted {
        /// Model name
        name: String,
        /// Model version
        version: u32,
    },
    /// Deleting the version failed
    Failed {
        /// Model name
        name: String,
        /// Model version
        version: u32,
        /// Error reported by the catalog
        reason: String,
    },
}

impl CleanupOutcome {
    /// Metrics label for this outcome
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::WouldDelete { .. } => "would_delete",
            Self::Deleted { .. } => "deleted",
            Self::Failed { .. } => "failed",
        }
    }

    /// True for [`CleanupOutcome::Failed`]
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for CleanupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WouldDelete { name, version } => write!(f, "would delete {name} v{version}"),
            Self::Deleted { name, version } => write!(f, "deleted {name} v{version}"),
            Self::Failed {
                name,
                version,
                reason,
            } => write!(f, "failed to delete {name} v{version}: {reason}"),
        }
    }
}

/// Delete (or with `dry_run`, list) every model version whose name starts with `prefix`.
///
/// Each version is handled independently: a failed delete is reported and the
/// rest still run. Only a failure to list the catalog aborts.
pub fn cleanup(catalog: &dyn ModelCatalog, prefix: &str, dry_run: bool) -> Result<Vec<CleanupOutcome>> {
    InputValidator::validate_model_prefix(prefix)?;
    let metrics = MetricsCollector::default();

    let versions = catalog.list_models(prefix)?;
    info!(prefix, dry_run, count = versions.len(), "Cleaning up model versions");

    let outcomes: Vec<CleanupOutcome> = versions
        .into_iter()
        .map(|model| {
            let outcome = remove(catalog, model, dry_run);
            metrics.record_cleanup_outcome(outcome.status());
            outcome
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    if failed > 0 {
        warn!(prefix, failed, "Some model versions could not be deleted");
    }
    Ok(outcomes)
}

fn remove(catalog: &dyn ModelCatalog, model: ModelVersion, dry_run: bool) -> CleanupOutcome {
    let ModelVersion { name, version } = model.clone();
    if dry_run {
        return CleanupOutcome::WouldDelete { name, version };
    }
    match catalog.delete_version(&model) {
        Ok(removed) => {
            if !removed {
                info!(model = %model, "Model version was already gone");
            }
            CleanupOutcome::Deleted { name, version }
        }
        Err(e) => {
            warn!(model = %model, error = %e, "Failed to delete model version");
            CleanupOutcome::Failed {
                name,
                version,
                reason: e.to_string(),
            }
        }
    }
}
