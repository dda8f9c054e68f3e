//! Tests for data model parsing.

use super::*;
use crate::cache::{CacheRegistry, RetrievalMode};
use crate::config::DataModel;
use crate::core::{ConfigProblem, DataError, DataResult};
use crate::service::FetchOutcome;
use crate::test_utils::RecordingTransport;
use serde_json::json;
use std::sync::Arc;

fn registry() -> Arc<CacheRegistry> {
    let registry = CacheRegistry::new();
    registry.register("moisture", RecordingTransport::new());
    registry.register("plot", RecordingTransport::new());
    registry
}

fn problems(result: DataResult<ParsedAliases>) -> Vec<ConfigProblem> {
    match result {
        Err(DataError::InvalidDataModels { problems }) => problems,
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("expected a configuration error"),
    }
}

#[test]
fn test_implicit_roots_always_present() {
    let parsed = parse_data_models(&[], &registry()).unwrap();
    assert!(parsed.get("model").unwrap().is_implicit());
    assert!(parsed.get("view").unwrap().is_implicit());
    assert!(parsed.roots().is_empty());
}

#[test]
fn test_strategy_selection() {
    let models = vec![
        DataModel::new("one").model_type("plot").id(1),
        DataModel::new("many").collection_type("plot").ids(json!([1, 2])),
        DataModel::new("page").collection_type("moisture").criteria(json!({"page": 1})),
        DataModel::new("single").model_type("moisture").criteria(json!({"latest": true})),
        DataModel::new("custom").fetcher(|_, _, _, _| Ok(FetchOutcome::Ready(None))),
    ];
    let parsed = parse_data_models(&models, &registry()).unwrap();

    let strategy = |alias: &str| parsed.get(alias).unwrap().strategy.name();
    assert_eq!(strategy("one"), "by_id");
    assert_eq!(strategy("many"), "by_ids");
    assert_eq!(strategy("page"), "by_criteria");
    assert_eq!(strategy("single"), "by_criteria_single");
    assert_eq!(strategy("custom"), "custom");

    assert!(parsed.get("page").unwrap().is_criteria);
    assert!(parsed.get("many").unwrap().is_collection);
    assert!(matches!(parsed.get("custom").unwrap().id_source, IdSource::Always));
    assert_eq!(parsed.roots(), vec!["one", "many", "page", "single", "custom"]);
}

#[test]
fn test_missing_type_is_single_problem() {
    let models = vec![DataModel::new("orphan")];
    let problems = problems(parse_data_models(&models, &registry()));
    assert_eq!(
        problems,
        vec![ConfigProblem::MissingType {
            alias: "orphan".into()
        }]
    );
}

#[test]
fn test_all_problems_reported_together() {
    let models = vec![
        DataModel::default().model_type("plot"),
        DataModel::new("a").model_type("plot").id(1),
        DataModel::new("a").model_type("plot").id(2),
        DataModel::new("b").collection_type("moisure"),
        DataModel::new("c").model_type("plot").id_property("view"),
        DataModel::new("d").model_type("plot").id(1).depends_on("view:"),
    ];
    let problems = problems(parse_data_models(&models, &registry()));

    assert_eq!(problems.len(), 5);
    assert_eq!(problems[0], ConfigProblem::MissingAlias { index: 0 });
    assert_eq!(problems[1], ConfigProblem::DuplicateAlias { alias: "a".into() });
    assert_eq!(
        problems[2],
        ConfigProblem::UnknownEntityType {
            alias: "b".into(),
            entity_type: "moisure".into(),
            suggestion: Some("moisture".into()),
        }
    );
    assert!(matches!(&problems[3], ConfigProblem::InvalidIdProperty { alias, .. } if alias == "c"));
    assert!(matches!(&problems[4], ConfigProblem::InvalidDependency { alias, .. } if alias == "d"));
}

#[test]
fn test_reserved_alias_is_duplicate() {
    let models = vec![DataModel::new("view").model_type("plot")];
    let problems = problems(parse_data_models(&models, &registry()));
    assert_eq!(problems, vec![ConfigProblem::DuplicateAlias { alias: "view".into() }]);
}

#[test]
fn test_id_property_wires_edges() {
    let models = vec![
        DataModel::new("plot").model_type("plot").id_property("view:plotId"),
        DataModel::new("readings")
            .collection_type("moisture")
            .id_property("plot:readingIds")
            .depends_on("view:refresh")
            .use_pull(true),
    ];
    let parsed = parse_data_models(&models, &registry()).unwrap();

    let readings = parsed.get("readings").unwrap();
    assert_eq!(readings.retrieval_mode, RetrievalMode::PullMissingOnly);
    assert!(matches!(
        &readings.id_source,
        IdSource::Property { parent, property } if parent == "plot" && property == "readingIds"
    ));
    assert_eq!(readings.parents.len(), 2);

    let view = parsed.get("view").unwrap();
    assert_eq!(view.dependent_aliases(), vec!["plot", "readings"]);
    assert!(parsed.roots().is_empty());
    assert_eq!(parsed.graph().edge_count(), 3);
}

#[test]
fn test_explicit_id_takes_precedence() {
    let models = vec![
        DataModel::new("plot")
            .model_type("plot")
            .id(4)
            .id_property("view:plotId")
            .criteria(json!({"x": 1})),
    ];
    let parsed = parse_data_models(&models, &registry()).unwrap();
    let plot = parsed.get("plot").unwrap();
    assert!(matches!(plot.id_source, IdSource::Value(_)));
    assert!(!plot.is_criteria);
    assert!(plot.is_root());
}

#[test]
fn test_forward_reference_allowed() {
    let models = vec![
        DataModel::new("child").model_type("plot").id_property("parent:childId"),
        DataModel::new("parent").model_type("plot").id(1),
    ];
    let parsed = parse_data_models(&models, &registry()).unwrap();
    assert_eq!(parsed.get("parent").unwrap().dependent_aliases(), vec!["child"]);
}

#[test]
fn test_unknown_parent_suggests_alias() {
    let models = vec![
        DataModel::new("parent").model_type("plot").id(1),
        DataModel::new("child").model_type("plot").id_property("parnet:childId"),
    ];
    let problems = problems(parse_data_models(&models, &registry()));
    assert_eq!(
        problems,
        vec![ConfigProblem::UnknownParent {
            alias: "child".into(),
            parent: "parnet".into(),
            suggestion: Some("parent".into()),
        }]
    );
}

#[test]
fn test_cycle_rejected() {
    let models = vec![
        DataModel::new("a").model_type("plot").id_property("b:id"),
        DataModel::new("b").model_type("plot").id_property("a:id"),
    ];
    let problems = problems(parse_data_models(&models, &registry()));
    assert_eq!(problems.len(), 1);
    match &problems[0] {
        ConfigProblem::CircularDependency { chain } => {
            assert_eq!(chain.first(), chain.last());
            assert!(chain.contains(&"a".to_string()));
            assert!(chain.contains(&"b".to_string()));
        }
        other => panic!("unexpected problem: {other:?}"),
    }
}

#[test]
fn test_duplicate_dependency_edges_collapse() {
    let models = vec![
        DataModel::new("list")
            .collection_type("moisture")
            .criteria(json!({"page": 1}))
            .depends_on("view:page")
            .depends_on("view:page"),
    ];
    let parsed = parse_data_models(&models, &registry()).unwrap();
    assert_eq!(parsed.get("list").unwrap().parents.len(), 1);
    assert_eq!(parsed.get("view").unwrap().dependents.len(), 1);
}

#[test]
fn test_fetcher_with_type_keeps_entity_type() {
    let models = vec![
        DataModel::new("custom")
            .collection_type("moisture")
            .fetcher(|_, _, _, _| Ok(FetchOutcome::Ready(None))),
    ];
    let parsed = parse_data_models(&models, &registry()).unwrap();
    let spec = parsed.get("custom").unwrap();
    assert_eq!(spec.entity_type.as_deref(), Some("moisture"));
    assert!(matches!(spec.strategy, FetchStrategy::Custom(_)));
}
