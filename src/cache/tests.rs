//! Tests for the master cache, private views and registry.

use super::*;
use crate::test_utils::{RecordingTransport, record};
use serde_json::json;

fn ids(values: &[i64]) -> Vec<EntityId> {
    values.iter().map(|&v| EntityId::Int(v)).collect()
}

fn transport() -> Arc<RecordingTransport> {
    RecordingTransport::with_records([
        record(1, json!({"moisture": 100})),
        record(2, json!({"moisture": 200})),
        record(3, json!({"moisture": 300})),
    ])
}

#[tokio::test]
async fn test_fetch_inserts_and_dedups() {
    let transport = transport();
    let master = MasterCache::new("moisture", transport.clone());

    let loaded = master.fetch(&ids(&[1, 2, 1])).await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(master.len(), 2);
    assert_eq!(transport.id_calls(), vec![ids(&[1, 2])]);
}

#[tokio::test]
async fn test_fetch_updates_existing_entity_in_place() {
    let transport = transport();
    let master = MasterCache::new("moisture", transport.clone());
    master.fetch(&ids(&[1])).await.unwrap();
    let first = master.get(&EntityId::Int(1)).unwrap();

    transport.upsert(record(1, json!({"moisture": 999})));
    master.fetch(&ids(&[1])).await.unwrap();

    let second = master.get(&EntityId::Int(1)).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.get("moisture"), Some(json!(999)));
}

#[tokio::test]
async fn test_pull_requests_only_missing_ids() {
    let transport = transport();
    let master = MasterCache::new("moisture", transport.clone());

    master.pull(&ids(&[1, 2])).await.unwrap();
    master.pull(&ids(&[1, 2, 3])).await.unwrap();
    master.pull(&ids(&[3])).await.unwrap();

    assert_eq!(transport.id_calls(), vec![ids(&[1, 2]), ids(&[3])]);
}

#[tokio::test]
async fn test_transport_failure_is_wrapped() {
    let transport = transport();
    transport.fail_with("backend down");
    let master = MasterCache::new("moisture", transport);

    let err = master.fetch(&ids(&[1])).await.unwrap_err();
    match err {
        DataError::Transport { entity_type, message } => {
            assert_eq!(entity_type, "moisture");
            assert!(message.contains("backend down"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_private_view_tracks_and_filters() {
    let master = MasterCache::new("moisture", transport());
    let view = master.create_private_view("owner:list");

    let entities = view.track_and_fetch(ids(&[2, 1, 2])).await.unwrap();
    let got: Vec<EntityId> = entities.iter().filter_map(|e| e.id().cloned()).collect();
    assert_eq!(got, ids(&[2, 1]));
    assert_eq!(view.tracked_ids(), ids(&[2, 1]));

    // Another view shares the master cache but sees only its own ids.
    let other = master.create_private_view("other:list");
    other.track_and_pull(ids(&[3])).await.unwrap();
    assert_eq!(view.len(), 2);
    assert_eq!(other.len(), 1);
    assert_eq!(master.len(), 3);
}

#[tokio::test]
async fn test_tracking_is_eager() {
    let master = MasterCache::new("moisture", transport());
    let view = master.create_private_view("owner:list");

    let pending = view.track_and_retrieve(ids(&[1]), RetrievalMode::AlwaysFetch);
    assert_eq!(view.tracked_ids(), ids(&[1]));
    assert!(view.is_empty());
    pending.await.unwrap();
    assert_eq!(view.len(), 1);
}

#[tokio::test]
async fn test_dispose_unregisters_view() {
    let master = MasterCache::new("moisture", transport());
    let view = master.create_private_view("owner-a:list");
    let _other = master.create_private_view("owner-b:list");
    assert_eq!(master.view_keys(), vec!["owner-a:list".to_string(), "owner-b:list".to_string()]);

    view.dispose();
    assert!(view.is_disposed());
    assert_eq!(master.view_keys(), vec!["owner-b:list".to_string()]);
    assert!(matches!(view.track_and_pull(ids(&[1])).await, Err(DataError::Disposed)));
}

#[test]
fn test_recreating_view_disposes_previous() {
    let master = MasterCache::new("moisture", transport());
    let first = master.create_private_view("owner:list");
    let second = master.create_private_view("owner:list");
    assert!(first.is_disposed());
    assert!(!second.is_disposed());
    assert_eq!(master.view_keys(), vec!["owner:list".to_string()]);

    // A late dispose of the replaced view leaves the new registration alone.
    first.dispose();
    assert_eq!(master.view_keys(), vec!["owner:list".to_string()]);
}

#[test]
fn test_dropped_views_are_pruned() {
    let master = MasterCache::new("moisture", transport());
    drop(master.create_private_view("gone-a:list"));
    drop(master.create_private_view("gone-b:list"));
    assert_eq!(master.registered_views(), 2);

    let _live = master.create_private_view("owner:list");
    assert_eq!(master.registered_views(), 1);
    assert_eq!(master.view_keys(), vec!["owner:list".to_string()]);
}

#[test]
fn test_registry_first_registration_wins() {
    let registry = CacheRegistry::new();
    let first = registry.register("moisture", transport());
    let second = registry.register("moisture", RecordingTransport::new());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.entity_types(), vec!["moisture".to_string()]);
}

#[test]
fn test_registry_require_and_suggest() {
    let registry = CacheRegistry::new();
    registry.register("moisture", transport());

    assert!(registry.require("moisture").is_ok());
    assert!(matches!(registry.require("plot"), Err(DataError::UnknownEntityType { .. })));
    assert_eq!(registry.closest_match("moisure"), Some("moisture".to_string()));
    assert_eq!(registry.closest_match("zzz"), None);
}

#[tokio::test]
async fn test_criteria_passes_through() {
    let transport = transport();
    transport.respond_with_ids(ids(&[3, 1]));
    let master = MasterCache::new("moisture", transport.clone());

    let response = master.fetch_ids_by_criteria(json!({"page": 1})).await.unwrap();
    assert_eq!(response.ids, ids(&[3, 1]));
    assert_eq!(response.row_count(), Some(2));
    assert_eq!(transport.criteria_calls(), vec![json!({"page": 1})]);
}
