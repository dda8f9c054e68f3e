use irrigation_cli::cache::CacheRegistry;
use irrigation_cli::config::{DataModelFile, Settings, parse_config};
use irrigation_cli::moisture::MoistureBackend;
use irrigation_cli::service::DataService;
use irrigation_cli::test_utils::RecordingOwner;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

#[tokio::test]
async fn test_declarations_from_file_drive_a_service() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("models.toml");
    fs::write(
        &path,
        r#"
[[data_models]]
alias = "reading"
modelType = "moisture"
idProperty = "view:readingId"

[[data_models]]
alias = "page"
collectionType = "moisture"
usePull = true
criteria = { sorting = "id", pagination = { page = 2, pageSize = 3 } }
"#,
    )
    .unwrap();

    let file: DataModelFile = parse_config(&path).unwrap();
    assert_eq!(file.data_models.len(), 2);

    let registry = CacheRegistry::new();
    registry.register("moisture", MoistureBackend::with_generated(10));
    let service = DataService::builder(registry)
        .view_state(json!({"readingId": 4}))
        .data_models(file.data_models)
        .initialize(RecordingOwner::new())
        .unwrap();
    service.settle().await;

    assert_eq!(service.fetched_property("reading", "id"), Some(json!(4)));
    let page: Vec<_> = service
        .fetched("page")
        .unwrap()
        .entities()
        .iter()
        .filter_map(|e| e.get("id"))
        .collect();
    assert_eq!(page, vec![json!(4), json!(5), json!(6)]);
}

#[test]
fn test_settings_file_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "page_size = 25\nlog_level = \"debug\"\n").unwrap();

    let settings = Settings::load(Some(&path)).unwrap();
    assert_eq!(
        settings,
        Settings {
            page_size: 25,
            log_level: "debug".to_string(),
            ..Settings::default()
        }
    );
}

#[test]
fn test_settings_reject_unknown_keys() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "pageSize = 25\n").unwrap();

    let err = Settings::load(Some(&path)).unwrap_err();
    assert!(format!("{err:#}").contains("pageSize"));
}
