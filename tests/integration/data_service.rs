use irrigation_cli::cache::CacheRegistry;
use irrigation_cli::config::DataModel;
use irrigation_cli::core::{ConfigProblem, DataError, EntityId};
use irrigation_cli::service::{DataService, FetchOptions, FetchOutcome, Fetched};
use irrigation_cli::test_utils::{RecordingOwner, RecordingTransport, init_test_logging, record};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Fixture {
    plots: Arc<RecordingTransport>,
    sensors: Arc<RecordingTransport>,
    registry: Arc<CacheRegistry>,
}

fn fixture() -> Fixture {
    let plots = RecordingTransport::with_records([
        record(1, json!({"name": "north", "sensorIds": [10, 11]})),
        record(2, json!({"name": "south", "sensorIds": [12]})),
        record(7, json!({"name": "east", "sensorIds": []})),
    ]);
    let sensors = RecordingTransport::with_records([
        record(7, json!({"moisture": 70})),
        record(10, json!({"moisture": 100})),
        record(11, json!({"moisture": 200})),
        record(12, json!({"moisture": 300})),
    ]);
    let registry = CacheRegistry::new();
    registry.register("plot", plots.clone());
    registry.register("sensor", sensors.clone());
    Fixture {
        plots,
        sensors,
        registry,
    }
}

fn ids(values: &[i64]) -> Vec<EntityId> {
    values.iter().map(|&v| EntityId::Int(v)).collect()
}

fn ids_of(value: &Fetched) -> Vec<EntityId> {
    value.entities().iter().filter_map(|e| e.id().cloned()).collect()
}

fn problems(error: DataError) -> Vec<ConfigProblem> {
    match error {
        DataError::InvalidDataModels { problems } => problems,
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn test_untyped_alias_reports_single_problem() {
    let f = fixture();
    let err = DataService::builder(f.registry)
        .data_model(DataModel::new("orphan"))
        .data_model(DataModel::new("plot").model_type("plot").id(1))
        .initialize(RecordingOwner::new())
        .unwrap_err();

    let problems = problems(err);
    assert_eq!(problems.len(), 1);
    assert!(problems[0].to_string().contains("orphan"));
}

#[tokio::test]
async fn test_parent_change_refetches_child_once_and_clears_chain() {
    init_test_logging(None);
    let f = fixture();
    let service = DataService::builder(f.registry)
        .view_state(json!({"plotId": 1}))
        .data_models([
            DataModel::new("plot").model_type("plot").id_property("view:plotId"),
            DataModel::new("sensors").collection_type("sensor").id_property("plot:sensorIds"),
            DataModel::new("summary")
                .depends_on("sensors:moisture")
                .fetcher(|service, _, _, _| Ok(FetchOutcome::Ready(service.fetched("sensors")))),
        ])
        .initialize(RecordingOwner::new())
        .unwrap();
    service.settle().await;
    assert_eq!(f.sensors.id_calls(), vec![ids(&[10, 11])]);
    assert_eq!(ids_of(&service.fetched("summary").unwrap()), ids(&[10, 11]));

    service.view_state().set("plotId", 2);
    service.settle().await;
    assert_eq!(f.plots.id_calls(), vec![ids(&[1]), ids(&[2])]);
    assert_eq!(f.sensors.id_calls(), vec![ids(&[10, 11]), ids(&[12])]);
    assert_eq!(ids_of(&service.fetched("sensors").unwrap()), ids(&[12]));

    service.view_state().set("plotId", Value::Null);
    service.settle().await;
    assert!(service.fetched("plot").is_none());
    assert!(service.fetched("sensors").is_none());
    assert!(service.fetched("summary").is_none());
}

#[tokio::test]
async fn test_pull_and_fetch_modes() {
    let f = fixture();
    let service = DataService::builder(f.registry.clone())
        .data_models([
            DataModel::new("pulled").collection_type("sensor").ids(json!([10, 11])).use_pull(true),
            DataModel::new("fetched").collection_type("plot").ids(json!([1, 2])),
        ])
        .initialize(RecordingOwner::new())
        .unwrap();
    service.settle().await;

    service.fetch("pulled", FetchOptions::default()).unwrap();
    service.fetch("fetched", FetchOptions::default()).unwrap();
    service.settle().await;

    assert_eq!(f.sensors.id_calls(), vec![ids(&[10, 11])]);
    assert_eq!(f.plots.id_calls(), vec![ids(&[1, 2]), ids(&[1, 2])]);

    service.force_fetch("pulled").unwrap();
    service.settle().await;
    assert_eq!(f.sensors.id_calls().len(), 2);
}

#[tokio::test]
async fn test_single_entity_cardinality() {
    let f = fixture();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let service = DataService::builder(f.registry.clone())
        .data_models([
            DataModel::new("missing").model_type("plot").id(99),
            DataModel::new("found").model_type("plot").id(2),
            DataModel::new("ambiguous").model_type("sensor").criteria(json!({"kind": "any"})),
        ])
        .initialize(RecordingOwner::new())
        .unwrap();
    let _subscriptions: Vec<_> = ["missing", "ambiguous"]
        .into_iter()
        .map(|alias| {
            let errors = Arc::clone(&errors);
            service.on_fetch_error(alias, move |error| errors.lock().unwrap().push(error.clone()))
        })
        .collect();
    f.sensors.respond_with_ids(ids(&[10, 11]));
    service.settle().await;

    assert!(service.fetched("missing").is_none());
    assert!(service.fetched("ambiguous").is_none());
    assert_eq!(service.fetched_property("found", "name"), Some(json!("south")));

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| matches!(e, DataError::Cardinality { found: 0, .. })));
    assert!(errors.iter().any(|e| matches!(e, DataError::Cardinality { found: 2, .. })));

    f.sensors.respond_with_ids(ids(&[12]));
    service.force_fetch("ambiguous").unwrap();
    service.settle().await;
    assert_eq!(service.fetched_property("ambiguous", "moisture"), Some(json!(300)));
}

#[tokio::test]
async fn test_stored_reference_and_refetch_retriggers_dependents() {
    let f = fixture();
    let dependent_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&dependent_calls);
    let service = DataService::builder(f.registry)
        .data_models([
            DataModel::new("a").collection_type("sensor").criteria(json!({"page": 1})),
            DataModel::new("b").depends_on("a:moisture").fetcher(move |_, _, _, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(FetchOutcome::Ready(None))
            }),
        ])
        .initialize(RecordingOwner::new())
        .unwrap();

    let resolved: Arc<Mutex<Vec<Fetched>>> = Arc::default();
    let _fetched = {
        let resolved = Arc::clone(&resolved);
        service.on_fetched("a", move |value| resolved.lock().unwrap().push(value.clone()))
    };
    service.settle().await;

    let first = resolved.lock().unwrap()[0].clone();
    assert!(service.fetched("a").unwrap().same_as(&first));
    let calls_after_first = dependent_calls.load(Ordering::SeqCst);
    assert!(calls_after_first >= 1);

    service.force_fetch("a").unwrap();
    service.settle().await;

    let second = resolved.lock().unwrap()[1].clone();
    assert!(!second.same_as(&first));
    assert_eq!(ids_of(&second), ids_of(&first));
    assert!(service.fetched("a").unwrap().same_as(&second));
    assert!(dependent_calls.load(Ordering::SeqCst) > calls_after_first);
}

#[tokio::test]
async fn test_dispose_releases_private_views() {
    let f = fixture();
    let first = DataService::builder(f.registry.clone())
        .data_model(DataModel::new("sensors").collection_type("sensor").ids(json!([10])))
        .initialize(RecordingOwner::new())
        .unwrap();
    let owner = RecordingOwner::new();
    let second = DataService::builder(f.registry.clone())
        .data_model(DataModel::new("sensors").collection_type("sensor").ids(json!([11])))
        .initialize(owner.clone())
        .unwrap();
    first.settle().await;
    second.settle().await;

    let master = f.registry.get("sensor").unwrap();
    assert_eq!(master.view_keys().len(), 2);
    assert_eq!(master.len(), 2);

    first.dispose();
    let keys = master.view_keys();
    assert_eq!(keys, vec![format!("{}:sensors", second.cid())]);
    assert!(keys.iter().all(|key| !key.starts_with(first.cid())));
    assert_eq!(owner.disposals(), 0);
}

#[tokio::test]
async fn test_absent_parent_blocks_child_until_populated() {
    let f = fixture();
    let service = DataService::builder(f.registry)
        .data_models([
            DataModel::new("parent").model_type("plot").id_property("view:plotId"),
            DataModel::new("child").model_type("sensor").id_property("parent:id"),
        ])
        .initialize(RecordingOwner::new())
        .unwrap();
    service.settle().await;
    assert_eq!(f.sensors.call_count(), 0);

    service.view_state().set("plotId", 7);
    service.settle().await;

    assert_eq!(f.sensors.id_calls(), vec![ids(&[7])]);
    assert_eq!(service.fetched_property("child", "moisture"), Some(json!(70)));
}

#[test]
fn test_cycle_rejected_at_initialization() {
    let f = fixture();
    let err = DataService::builder(f.registry)
        .data_models([
            DataModel::new("a").model_type("plot").id_property("c:id"),
            DataModel::new("b").model_type("plot").id_property("a:id"),
            DataModel::new("c").model_type("plot").id_property("b:id"),
        ])
        .initialize(RecordingOwner::new())
        .unwrap_err();

    let problems = problems(err);
    assert!(matches!(&problems[..], [ConfigProblem::CircularDependency { .. }]));
}

#[tokio::test]
async fn test_stale_completion_is_discarded() {
    let f = fixture();
    let service = DataService::builder(f.registry)
        .data_model(DataModel::new("plot").model_type("plot").id_property("view:plotId"))
        .initialize(RecordingOwner::new())
        .unwrap();
    service.settle().await;

    f.plots.delay_next(Duration::from_millis(50));
    service.view_state().set("plotId", 1);
    service.view_state().set("plotId", 2);
    service.settle().await;

    assert_eq!(f.plots.id_calls(), vec![ids(&[1]), ids(&[2])]);
    assert_eq!(service.fetched_property("plot", "name"), Some(json!("south")));
}
