//! Registry listing and prefix cleanup

use std::fs;

use mockall::mock;
use tempfile::TempDir;
use wellbeing_explorer::cleanup::{cleanup, CleanupOutcome};
use wellbeing_explorer::model::ModelArtifact;
use wellbeing_explorer::registry::{FileModelRegistry, ModelCatalog, ModelSource, ModelVersion};
use wellbeing_explorer::WellbeingError;

mock! {
    Catalog {}

    impl ModelCatalog for Catalog {
        fn list_models(&self, prefix: &str) -> wellbeing_explorer::Result<Vec<ModelVersion>>;
        fn delete_version(&self, model: &ModelVersion) -> wellbeing_explorer::Result<bool>;
    }
}

const ARTIFACT: &str = r#"{
    "feature_names": ["stress_num"],
    "estimator": {
        "kind": "logistic",
        "coefficients": [[0.5]],
        "intercepts": [0.0]
    }
}"#;

fn version(name: &str, version: u32) -> ModelVersion {
    ModelVersion {
        name: name.to_string(),
        version,
    }
}

fn seeded_registry(dir: &TempDir) -> FileModelRegistry {
    let registry = FileModelRegistry::new(dir.path(), 1);
    let artifact = ModelArtifact::from_json(ARTIFACT).unwrap();
    for (name, v) in [
        ("mcphases_mood_modea", 1),
        ("mcphases_mood_modea", 2),
        ("mcphases_mood_modeb", 1),
        ("mcphases_energy_modea", 1),
    ] {
        registry.save(name, v, &artifact).unwrap();
    }
    registry
}

#[test]
fn test_list_models_by_prefix() {
    let dir = TempDir::new().unwrap();
    let registry = seeded_registry(&dir);
    fs::create_dir_all(dir.path().join("mcphases_mood_modea/latest")).unwrap();

    let listed = registry.list_models("mcphases_mood").unwrap();
    assert_eq!(
        listed,
        vec![
            version("mcphases_mood_modea", 1),
            version("mcphases_mood_modea", 2),
            version("mcphases_mood_modeb", 1),
        ]
    );
    assert!(registry.list_models("nothing").unwrap().is_empty());
}

#[test]
fn test_list_models_missing_root_is_empty() {
    let dir = TempDir::new().unwrap();
    let registry = FileModelRegistry::new(dir.path().join("absent"), 1);
    assert!(registry.list_models("any").unwrap().is_empty());
}

#[test]
fn test_dry_run_deletes_nothing() {
    let dir = TempDir::new().unwrap();
    let registry = seeded_registry(&dir);

    let outcomes = cleanup(&registry, "mcphases_mood", true).unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, CleanupOutcome::WouldDelete { .. })));
    assert_eq!(registry.list_models("mcphases").unwrap().len(), 4);
}

#[test]
fn test_cleanup_deletes_matching_versions_only() {
    let dir = TempDir::new().unwrap();
    let registry = seeded_registry(&dir);

    let outcomes = cleanup(&registry, "mcphases_mood_modea", false).unwrap();
    assert_eq!(
        outcomes,
        vec![
            CleanupOutcome::Deleted {
                name: "mcphases_mood_modea".to_string(),
                version: 1
            },
            CleanupOutcome::Deleted {
                name: "mcphases_mood_modea".to_string(),
                version: 2
            },
        ]
    );
    assert!(!dir.path().join("mcphases_mood_modea").exists());
    assert!(registry.load("mcphases_mood_modeb").is_ok());
    assert!(matches!(
        registry.load("mcphases_mood_modea"),
        Err(WellbeingError::ModelNotFound { .. })
    ));

    // second run finds nothing left
    assert!(cleanup(&registry, "mcphases_mood_modea", false).unwrap().is_empty());
}

#[test]
fn test_cleanup_rejects_bad_prefix_before_listing() {
    let mut catalog = MockCatalog::new();
    catalog.expect_list_models().never();
    assert!(matches!(
        cleanup(&catalog, "", false),
        Err(WellbeingError::Validation { .. })
    ));
    assert!(cleanup(&catalog, "../models", false).is_err());
}

#[test]
fn test_failed_delete_does_not_stop_the_rest() {
    let mut catalog = MockCatalog::new();
    catalog
        .expect_list_models()
        .times(1)
        .returning(|prefix| Ok(vec![version(prefix, 1), version(prefix, 2), version(prefix, 3)]));
    catalog.expect_delete_version().times(3).returning(|model| match model.version {
        2 => Err(WellbeingError::ModelSource("permission denied".to_string())),
        3 => Ok(false),
        _ => Ok(true),
    });

    let outcomes = cleanup(&catalog, "mood", false).unwrap();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].status(), "deleted");
    assert!(outcomes[1].is_failure());
    assert!(outcomes[1].to_string().contains("permission denied"));
    // already gone counts as deleted
    assert_eq!(
        outcomes[2],
        CleanupOutcome::Deleted {
            name: "mood".to_string(),
            version: 3
        }
    );
}

#[test]
fn test_listing_failure_aborts() {
    let mut catalog = MockCatalog::new();
    catalog
        .expect_list_models()
        .returning(|_| Err(WellbeingError::ModelSource("registry offline".to_string())));
    catalog.expect_delete_version().never();
    assert!(matches!(
        cleanup(&catalog, "mood", false),
        Err(WellbeingError::ModelSource(_))
    ));
}

#[test]
fn test_outcome_serializes_with_status_tag() {
    let outcome = CleanupOutcome::WouldDelete {
        name: "mood".to_string(),
        version: 4,
    };
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["status"], "would_delete");
    assert_eq!(value["version"], 4);
}
