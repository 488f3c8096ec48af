use rulewright::store::StoreCall;
use rulewright::{
    Clause, Error, Filter, FilterBuffer, MemoryStore, SelectorManager, SetOp, StoreError, Token,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn north_sessions() -> Filter {
    Filter::new()
        .resource_type("session")
        .label("campus", "north")
}

#[tokio::test]
async fn single_unsaved_filter_becomes_a_selector() {
    init_tracing();
    let store = MemoryStore::new();
    // Ids 1..=6 are taken, so the new filter gets 7.
    store.seed_filter(Filter::new().resource_type("room").with_id(6));
    let mut buffer = FilterBuffer::new();
    buffer.add(north_sessions());

    let outcome = buffer.reconcile_and_save(&store, "", &[]).await.unwrap();

    assert_eq!(outcome.created, vec![7]);
    assert_eq!(outcome.selector.operation, vec![Clause::single(7)]);
    assert_eq!(outcome.selector.name, "session[campus:north]{*}");
    assert_eq!(store.count("DELETE"), 0);
    assert_eq!(
        store
            .calls()
            .into_iter()
            .filter(|c| c.method == "POST")
            .collect::<Vec<_>>(),
        vec![
            StoreCall::new("POST", "/api/filters"),
            StoreCall::new("POST", "/api/selectors"),
        ]
    );
}

#[tokio::test]
async fn referenced_filters_kept_and_orphans_deleted() {
    init_tracing();
    let store = MemoryStore::new();
    let three = store.seed_filter(north_sessions().with_id(3));
    let five = store.seed_filter(Filter::new().resource_type("room").with_id(5));

    let mut buffer = FilterBuffer::new();
    buffer.add(three);
    buffer.add(five);
    buffer.add(Filter::new().resource_type("lecturer").ranks([1]));

    let clauses = vec![Clause::new(vec![
        Token::Filter(3),
        Token::Op(SetOp::Intersection),
        Token::Draft(2),
    ])];
    let outcome = buffer
        .reconcile_and_save(&store, "north sessions with lecturers", &clauses)
        .await
        .unwrap();

    assert_eq!(outcome.created, vec![6]);
    assert_eq!(outcome.deleted, vec![5]);
    assert_eq!(
        outcome.selector.operation,
        vec![Clause::new(vec![
            Token::Filter(3),
            Token::Op(SetOp::Intersection),
            Token::Filter(6),
        ])]
    );
    assert_eq!(
        store.calls(),
        vec![
            StoreCall::new("POST", "/api/filters"),
            StoreCall::new("POST", "/api/selectors"),
            StoreCall::new("PUT", "/api/filters/3"),
            StoreCall::new("DELETE", "/api/filters/5"),
            StoreCall::new("PUT", "/api/filters/6"),
        ]
    );
    let selector_id = outcome.selector.id;
    let stored = store.filters();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|f| f.selector_id == selector_id));
}

#[tokio::test]
async fn partial_failure_is_reported_distinctly() {
    init_tracing();
    let store = MemoryStore::new();
    let three = store.seed_filter(north_sessions().with_id(3));
    let five = store.seed_filter(Filter::new().resource_type("room").with_id(5));
    store.fail_on("DELETE", "/api/filters/5");

    let mut buffer = FilterBuffer::new();
    buffer.add(three);
    buffer.add(five);

    let err = buffer
        .reconcile_and_save(&store, "north", &[Clause::single(3)])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "selector 1 saved but 1 filters failed to update");
    match err {
        Error::PartialReconciliation { outcome, failures } => {
            assert_eq!(outcome.filters.len(), 1);
            assert_eq!(failures[0].0.id, Some(5));
            assert!(matches!(failures[0].1, StoreError::Injected(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
    // The selector exists and the orphan survived.
    assert_eq!(store.selectors().len(), 1);
    assert_eq!(store.filters().len(), 2);
}

#[tokio::test]
async fn bare_operator_clause_is_rejected_before_saving() {
    let store = MemoryStore::new();
    let mut manager = SelectorManager::default();
    manager.add_filter(north_sessions());
    let builder = manager.builder_mut();
    builder.push_operator(0, SetOp::Union).unwrap();

    assert!(matches!(
        manager.save(&store, "bad").await,
        Err(Error::Validation(_))
    ));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn text_expression_saves_end_to_end() {
    let store = MemoryStore::new();
    let existing = store.seed_filter(Filter::new().resource_type("room").label("building", "A"));

    let mut manager = SelectorManager::default();
    manager
        .load_text(&format!(
            "session[campus:north]{{1,2}} - @{}\n# second clause\nlecturer[*:*]",
            existing.id.unwrap()
        ))
        .unwrap();
    assert_eq!(
        manager.preview_text(&store).await,
        "session[campus:north]{1,2} - room[building:A]{*}\nlecturer[*:*]{*}"
    );

    let saved = manager.save(&store, "").await.unwrap();
    assert_eq!(saved.selector.operation.len(), 2);
    assert_eq!(saved.filters.len(), 3);
    assert_eq!(
        saved.selector.name,
        "session[campus:north]{1,2} - room[building:A]{*}\nlecturer[*:*]{*}"
    );
}
