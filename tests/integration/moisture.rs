use irrigation_cli::cache::CacheRegistry;
use irrigation_cli::config::DataModel;
use irrigation_cli::core::EntityId;
use irrigation_cli::moisture::{MoistureBackend, MoistureListView, MoistureReading, sampled_summary};
use irrigation_cli::service::DataService;
use irrigation_cli::test_utils::RecordingOwner;
use serde_json::json;
use std::sync::Arc;

fn registry(backend: Arc<MoistureBackend>) -> Arc<CacheRegistry> {
    let registry = CacheRegistry::new();
    registry.register("moisture", backend);
    registry
}

#[tokio::test]
async fn test_list_owners_share_master_cache() {
    let registry = registry(MoistureBackend::with_generated(25));

    let first = MoistureListView::new(10).unwrap();
    let first_service = first.attach(registry.clone()).unwrap();
    let second = MoistureListView::new(10).unwrap();
    let second_service = second.attach(registry.clone()).unwrap();
    first_service.settle().await;
    second_service.settle().await;

    second.set_page(&second_service, 3);
    second_service.settle().await;

    let master = registry.get("moisture").unwrap();
    assert_eq!(master.len(), 15);
    assert_eq!(master.view_keys().len(), 2);

    assert!(first.output().contains("page 1 of 3 (25 total)"));
    assert!(second.output().contains("page 3 of 3 (25 total)"));
    assert!(second.output().contains("#25 "));
    assert!(!second.output().contains("#10 "));

    second_service.dispose();
    assert_eq!(master.view_keys(), vec![format!("{}:moisture", first_service.cid())]);
}

#[tokio::test]
async fn test_criteria_sorting_through_service() {
    let backend = MoistureBackend::with_generated(30);
    let service = DataService::builder(registry(backend.clone()))
        .data_model(DataModel::new("driest").collection_type("moisture").criteria(json!({
            "sorting": [{"column": "moisture", "direction": "desc"}, "id"],
            "pagination": {"pageSize": 3}
        })))
        .initialize(RecordingOwner::new())
        .unwrap();

    // "id" as a bare string inside the array is not a sort object.
    service.settle().await;
    assert!(service.fetched("driest").is_none());

    let service = DataService::builder(registry(backend.clone()))
        .data_model(DataModel::new("driest").collection_type("moisture").criteria(json!({
            "sorting": [{"column": "moisture", "direction": "desc"}, {"column": "id"}],
            "pagination": {"pageSize": 3}
        })))
        .initialize(RecordingOwner::new())
        .unwrap();
    service.settle().await;

    let driest = service.fetched("driest").unwrap();
    assert_eq!(driest.len(), 3);
    let max = backend.readings().iter().map(|r| r.moisture).max().unwrap();
    assert_eq!(driest.entities()[0].get("moisture"), Some(json!(max)));

    let view = service.private_view("driest").unwrap();
    assert_eq!(view.full_list_size(), Some(30));
}

#[tokio::test]
async fn test_new_reading_appears_after_refetch() {
    let backend = MoistureBackend::with_generated(4);
    let list = MoistureListView::new(10).unwrap();
    let service = list.attach(registry(backend.clone())).unwrap();
    service.settle().await;
    assert!(list.output().contains("(4 total)"));

    let created = backend.create(&json!({"moisture": 1000})).unwrap();
    service.force_fetch("moisture").unwrap();
    service.settle().await;

    assert!(list.output().contains("(5 total)"));
    let ids: Vec<EntityId> = service
        .fetched("moisture")
        .unwrap()
        .entities()
        .iter()
        .filter_map(|e| e.id().cloned())
        .collect();
    assert_eq!(ids.last(), Some(&EntityId::Int(created.id)));
}

#[test]
fn test_summary_over_generated_series() {
    let backend = MoistureBackend::with_generated(100);
    let readings: Vec<MoistureReading> = backend.readings();
    let buckets = sampled_summary(&readings, 25);

    assert_eq!(buckets.len(), 4);
    assert!(buckets.iter().all(|b| b.count == 25));
    assert!(buckets.windows(2).all(|w| w[0].created_at < w[1].created_at));
    for bucket in &buckets {
        let (low, mean, high) = bucket.dryness_band();
        assert!(low <= mean && mean <= high);
        assert!(mean > 0.0 && mean < 1.0);
    }
}
