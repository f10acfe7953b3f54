use std::sync::Arc;
use treeshape::*;
use test_utils::*;

/// Validation Engine Tests
/// Cardinality, claiming, unexpected entries, access failures and
/// sequential/parallel equivalence

async fn validate_store(store: MemoryObjectStore, schema: &Schema, root: &str) -> ValidationReport {
    ValidationEngine::new(Arc::new(store)).validate(schema, root).await
}

#[tokio::test]
async fn test_conforming_tree_has_no_violations() {
    init_logging();
    let report = validate_store(image_dataset_store(), &image_dataset_schema(), "images").await;

    assert!(report.is_valid(), "{}", report);
    assert!(report.violations.is_empty());
    assert_eq!(
        report.paths_for("image"),
        vec![
            "images/2024-01-01/cat.jpg",
            "images/2024-01-01/dog.jpg",
            "images/2024-01-02/bird.jpg"
        ]
    );
    assert_eq!(report.paths_for("labels"), vec!["images/labels.csv"]);
    assert_eq!(report.listings, 3);
    assert_eq!(report.entries_visited, 7);
}

#[tokio::test]
async fn test_exactly_one_missing() {
    let store = MemoryObjectStore::from_keys(["images/2024-01-01/cat.jpg"]);
    let report = validate_store(store, &image_dataset_schema(), "images").await;

    let missing = report.violations_of(ViolationKind::MissingRequiredEntry);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].path, "images");
    assert_eq!(missing[0].node.as_deref(), Some("labels"));
    assert_eq!(missing[0].depth, 1);
    assert_eq!(report.violations.len(), 1);
    assert!(!report.is_valid());
}

#[tokio::test]
async fn test_exactly_one_ambiguous() {
    let validated = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorder = validated.clone();
    let schema = Schema::new(
        SchemaNode::literal_directory("ds").with_child(
            SchemaNode::file(r"labels.*\.csv$")
                .unwrap()
                .with_semantic_name("labels")
                .with_validator(
                    "record",
                    Arc::new(move |handle: &EntryHandle<'_>| {
                        recorder.lock().unwrap().push(handle.entry.path.clone());
                        ValidatorOutcome::pass()
                    }),
                ),
        ),
    )
    .unwrap();
    let store = MemoryObjectStore::from_keys(["ds/labels_a.csv", "ds/labels_b.csv"]);
    let report = validate_store(store, &schema, "ds").await;

    assert_eq!(report.count(ViolationKind::AmbiguousMatch), 1);
    assert_eq!(report.count(ViolationKind::UnexpectedEntry), 0);
    assert_eq!(report.violations.len(), 1);
    let ambiguous = &report.violations[0];
    assert_eq!(ambiguous.path, "ds");
    assert!(ambiguous.reason.contains("labels_a.csv, labels_b.csv"));

    // Every candidate is reported and validated; only the surplus one carries the ambiguity
    assert_eq!(report.paths_for("labels"), vec!["ds/labels_a.csv", "ds/labels_b.csv"]);
    assert_eq!(
        *validated.lock().unwrap(),
        vec!["ds/labels_a.csv".to_string(), "ds/labels_b.csv".to_string()]
    );
    let surplus = report.matches.iter().find(|m| m.path == "ds/labels_b.csv").unwrap();
    assert_eq!(surplus.violations, vec![ambiguous.clone()]);
    let first = report.matches.iter().find(|m| m.path == "ds/labels_a.csv").unwrap();
    assert!(first.violations.is_empty());
}

#[tokio::test]
async fn test_unexpected_entry_reported() {
    let mut store = image_dataset_store();
    store.insert("images/notes.txt", 5);
    let report = validate_store(store, &image_dataset_schema(), "images").await;

    let unexpected = report.violations_of(ViolationKind::UnexpectedEntry);
    assert_eq!(unexpected.len(), 1);
    assert_eq!(unexpected[0].path, "images/notes.txt");
    assert_eq!(unexpected[0].severity, Severity::Error);
    assert!(unexpected[0].node.is_none());

    let unmatched: Vec<&MatchResult> = report.matches.iter().filter(|m| m.node.is_none()).collect();
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].violations.len(), 1);
}

#[tokio::test]
async fn test_allow_unknown_suppresses_unexpected() {
    let schema = Schema::new(
        SchemaNode::literal_directory("ds")
            .allowing_unknown(true)
            .with_child(SchemaNode::literal_file("manifest.json")),
    )
    .unwrap();
    let store = MemoryObjectStore::from_keys(["ds/manifest.json", "ds/scratch.tmp", "ds/cache/x"]);
    let report = validate_store(store, &schema, "ds").await;

    assert!(report.is_valid(), "{}", report);
    assert!(report.violations.is_empty());
}

#[tokio::test]
async fn test_lenient_config_downgrades_unexpected() {
    let mut store = image_dataset_store();
    store.insert("images/.DS_Store", 6);
    let report = ValidationEngine::new(Arc::new(store))
        .with_config(EngineConfig::lenient())
        .validate(&image_dataset_schema(), "images")
        .await;

    assert!(report.is_valid());
    assert_eq!(report.warnings().count(), 1);
    assert_eq!(report.errors().count(), 0);
}

#[tokio::test]
async fn test_kind_mismatch_is_missing_plus_unexpected() {
    // A directory where the labels file should be
    let mut store = MemoryObjectStore::new();
    store
        .insert("images/labels.csv/part-0", 1)
        .insert("images/2024-01-01/cat.jpg", 1);

    let report = validate_store(store, &image_dataset_schema(), "images").await;
    assert_eq!(report.count(ViolationKind::MissingRequiredEntry), 1);
    let unexpected = report.violations_of(ViolationKind::UnexpectedEntry);
    assert_eq!(unexpected.len(), 1);
    assert_eq!(unexpected[0].path, "images/labels.csv");
    assert!(unexpected[0].reason.starts_with("directory 'labels.csv'"));
}

#[tokio::test]
async fn test_depth_bound_limits_listings() {
    let mut store = image_dataset_store();
    store
        .insert("images/2024-01-01/nested/deeper/x.jpg", 1)
        .insert("images/2024-01-02/raw/", 0);
    let fs = Arc::new(CountingFileSystem::new(Arc::new(store)));

    let report = ValidationEngine::new(fs.clone())
        .validate(&image_dataset_schema(), "images")
        .await;

    assert_eq!(
        fs.listed(),
        vec!["images", "images/2024-01-01", "images/2024-01-02"]
    );
    assert_eq!(report.listings, 3);
    // The extra directories are unexpected but never descended into
    assert_eq!(report.count(ViolationKind::UnexpectedEntry), 2);
}

#[tokio::test]
async fn test_childless_directory_node_is_not_listed() {
    let schema = Schema::new(
        SchemaNode::literal_directory("ds").with_child(SchemaNode::literal_directory("opaque")),
    )
    .unwrap();
    let store = MemoryObjectStore::from_keys(["ds/opaque/a", "ds/opaque/b/c"]);
    let fs = Arc::new(CountingFileSystem::new(Arc::new(store)));

    let report = ValidationEngine::new(fs.clone()).validate(&schema, "ds").await;
    assert!(report.is_valid(), "{}", report);
    assert_eq!(fs.listed(), vec!["ds"]);
}

#[tokio::test]
async fn test_reports_are_idempotent() {
    let mut store = image_dataset_store();
    store.insert("images/extra.bin", 1).insert("images/2024-01-03/", 0);
    let engine = ValidationEngine::new(Arc::new(store));
    let schema = image_dataset_schema();

    let first = engine.validate(&schema, "images").await;
    let second = engine.validate(&schema, "images").await;
    assert_eq!(first, second);
    assert!(!first.is_valid());
}

#[tokio::test]
async fn test_parallel_matches_sequential() {
    init_logging();
    let mut store = MemoryObjectStore::new();
    store.insert("images/labels.csv", 1);
    for day in 1..=20 {
        let dir = format!("images/2024-02-{:02}", day);
        for shot in 0..(day % 4) {
            store.insert(&format!("{}/shot_{}.jpg", dir, shot), 10);
        }
        if day % 4 == 0 {
            store.insert(&format!("{}/", dir), 0);
        }
        if day % 5 == 0 {
            store.insert(&format!("{}/thumbs.db", dir), 1);
        }
    }
    let schema = image_dataset_schema();

    let sequential = ValidationEngine::new(Arc::new(store.clone()))
        .validate(&schema, "images")
        .await;
    let parallel = ValidationEngine::new(Arc::new(store))
        .with_config(EngineConfig {
            max_concurrent_walks: 3,
            ..EngineConfig::parallel()
        })
        .validate(&schema, "images")
        .await;

    assert_eq!(sequential, parallel);
    assert!(sequential.count(ViolationKind::MissingRequiredEntry) > 0);
    assert!(sequential.count(ViolationKind::UnexpectedEntry) > 0);
}

#[tokio::test]
async fn test_concurrent_listings_bounded_across_levels() {
    let mut store = MemoryObjectStore::new();
    for outer in 0..4 {
        for inner in 0..4 {
            store.insert(&format!("ds/o{}/i{}/f.bin", outer, inner), 1);
        }
    }
    let schema = Schema::new(
        SchemaNode::literal_directory("ds").with_child(
            SchemaNode::directory("o")
                .unwrap()
                .with_cardinality(Cardinality::ZeroOrMore)
                .with_child(
                    SchemaNode::directory("i")
                        .unwrap()
                        .with_cardinality(Cardinality::ZeroOrMore)
                        .with_child(SchemaNode::literal_file("f.bin")),
                ),
        ),
    )
    .unwrap();
    let fs = Arc::new(SlowListingFileSystem::new(
        Arc::new(store),
        std::time::Duration::from_millis(20),
    ));

    let report = ValidationEngine::new(fs.clone())
        .with_config(EngineConfig {
            max_concurrent_walks: 2,
            ..EngineConfig::parallel()
        })
        .validate(&schema, "ds")
        .await;

    assert!(report.is_valid(), "{}", report);
    assert_eq!(report.listings, 21);
    assert!(fs.peak() <= 2, "peak of {} concurrent listings", fs.peak());
}

#[tokio::test]
async fn test_listing_failure_is_scoped_to_subtree() {
    let mut store = image_dataset_store();
    store.inject_failure(
        "images/2024-01-01",
        AccessError::PermissionDenied("images/2024-01-01".to_string()),
    );
    let report = validate_store(store, &image_dataset_schema(), "images").await;

    let access = report.violations_of(ViolationKind::AccessError);
    assert_eq!(access.len(), 1);
    assert_eq!(access[0].path, "images/2024-01-01");
    assert_eq!(access[0].node.as_deref(), Some("capture"));
    assert_eq!(report.violations.len(), 1);
    // The sibling capture directory is still validated
    assert_eq!(report.paths_for("image"), vec!["images/2024-01-02/bird.jpg"]);
}

#[tokio::test]
async fn test_custom_validator_failure() {
    let registry = ValidatorRegistry::with_builtins();
    let non_empty = registry.resolve("non_empty").unwrap();
    let schema = Schema::new(
        SchemaNode::literal_directory("ds")
            .with_child(SchemaNode::literal_file("labels.csv").with_validator("non_empty", non_empty)),
    )
    .unwrap();

    let mut store = MemoryObjectStore::new();
    store.insert("ds/labels.csv", 0);
    let report = validate_store(store, &schema, "ds").await;

    let failed = report.violations_of(ViolationKind::CustomValidationFailed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].path, "ds/labels.csv");
    assert!(failed[0].reason.contains("validator 'non_empty' failed"));
    assert!(failed[0].reason.contains("is empty"));

    let matched = report
        .matches
        .iter()
        .find(|m| m.path == "ds/labels.csv")
        .unwrap();
    assert_eq!(matched.validator_outcome.as_ref().map(|o| o.passed), Some(false));
}

#[tokio::test]
async fn test_stat_failure_skips_validator() {
    let schema = Schema::new(SchemaNode::literal_directory("ds").with_child(
        SchemaNode::literal_file("labels.csv").with_validator(
            "never_called",
            Arc::new(|_: &EntryHandle<'_>| -> ValidatorOutcome { panic!("validator must not run") }),
        ),
    ))
    .unwrap();
    let mut store = MemoryObjectStore::new();
    store.insert("ds/labels.csv", 3).inject_failure(
        "ds/labels.csv",
        AccessError::Unavailable("ds/labels.csv".to_string(), "timeout".to_string()),
    );

    let report = validate_store(store, &schema, "ds").await;
    let access = report.violations_of(ViolationKind::AccessError);
    assert_eq!(access.len(), 1);
    assert_eq!(access[0].path, "ds/labels.csv");
    assert!(access[0].reason.contains("timeout"));
}

#[tokio::test]
async fn test_root_validator_receives_root_metadata() {
    let schema = Schema::new(SchemaNode::literal_directory("ds").allowing_unknown(true).with_validator(
        "is_root",
        Arc::new(|handle: &EntryHandle<'_>| {
            if handle.depth == 0 && handle.metadata.is_dir() {
                ValidatorOutcome::pass()
            } else {
                ValidatorOutcome::fail("not the root")
            }
        }),
    ))
    .unwrap();
    let store = MemoryObjectStore::from_keys(["ds/anything"]);
    let report = validate_store(store, &schema, "ds").await;
    assert!(report.is_valid(), "{}", report);
    assert_eq!(report.matches[0].path, "ds");
}

#[tokio::test]
async fn test_missing_root() {
    let report = validate_store(image_dataset_store(), &image_dataset_schema(), "videos").await;
    assert_eq!(report.count(ViolationKind::MissingRequiredEntry), 1);
    assert_eq!(report.violations[0].path, "videos");
    assert_eq!(report.listings, 0);
}

#[tokio::test]
async fn test_root_is_a_file() {
    let report =
        validate_store(image_dataset_store(), &image_dataset_schema(), "images/labels.csv").await;
    assert_eq!(report.count(ViolationKind::KindMismatch), 1);
    assert_eq!(report.listings, 0);
}

#[tokio::test]
async fn test_local_tree_with_literal_first_policy() {
    let tree = create_test_tree(&["README.md", "notes.md", "src/"]);
    let schema = Schema::new(
        SchemaNode::literal_directory("project")
            .with_child(
                SchemaNode::file(r".*\.md$")
                    .unwrap()
                    .with_semantic_name("docs")
                    .with_cardinality(Cardinality::ZeroOrMore),
            )
            .with_child(SchemaNode::literal_file("README.md").with_semantic_name("readme"))
            .with_child(SchemaNode::literal_directory("src")),
    )
    .unwrap();
    let root = path_str(tree.path());

    let default_report = ValidationEngine::new(Arc::new(LocalFileSystem::new()))
        .validate(&schema, &root)
        .await;
    assert_eq!(default_report.count(ViolationKind::MissingRequiredEntry), 1);

    let config = EngineConfig {
        overlap_policy: OverlapPolicy::LiteralFirst,
        ..EngineConfig::default()
    };
    let literal_report = ValidationEngine::new(Arc::new(LocalFileSystem::new()))
        .with_config(config)
        .validate(&schema, &root)
        .await;
    assert!(literal_report.is_valid(), "{}", literal_report);
    assert_eq!(literal_report.paths_for("readme").len(), 1);
}

#[tokio::test]
async fn test_report_json_output() {
    let mut store = image_dataset_store();
    store.insert("images/stray.txt", 1);
    let report = validate_store(store, &image_dataset_schema(), "images").await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["root"], "images");
    assert_eq!(json["violations"][0]["kind"], "UnexpectedEntry");
    assert_eq!(json["violations"][0]["path"], "images/stray.txt");
    assert_eq!(json["listings"], 3);

    let text = report.to_string();
    assert!(text.starts_with("images: invalid (1 errors, 0 warnings)"));
    assert!(text.contains("UNEXPECTED_ENTRY at images/stray.txt"));
}
