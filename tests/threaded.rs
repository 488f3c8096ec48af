use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Map;

use rulewright::{
    ConstraintKind, EditorConfig, Filter, MemoryStore, RuleMetadata, Session, SetOp, Store,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sessions_share_one_store_across_tasks() {
    let store = Arc::new(MemoryStore::new());
    let config = EditorConfig::default();

    let mut handles = vec![];
    for worker in 0..8_u32 {
        let shared: Arc<dyn Store> = store.clone();
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            let mut session = Session::new(shared, &config);
            session.add_filter(
                Filter::new()
                    .resource_type("session")
                    .label("group", format!("g{worker}")),
            );
            session.add_filter(Filter::new().resource_type("room").ranks([worker + 1]));
            let builder = session.selectors_mut().builder_mut();
            builder.push_draft(0, 0).unwrap();
            builder.push_operator(0, SetOp::Union).unwrap();
            builder.push_draft(0, 1).unwrap();
            session.save_selector("").await.unwrap();

            session
                .select_constraint(ConstraintKind::NoOverlap, &Map::new())
                .unwrap();
            session.set_metadata(RuleMetadata::named(format!("worker {worker}")));
            session.save_rule().await.unwrap()
        }));
    }

    let mut rule_ids = HashSet::new();
    for handle in handles {
        let rule = handle.await.unwrap();
        assert_eq!(rule.selectors.len(), 1);
        assert!(rule_ids.insert(rule.id.unwrap()));
    }

    assert_eq!(store.rules().len(), 8);
    assert_eq!(store.selectors().len(), 8);
    let filters = store.filters();
    assert_eq!(filters.len(), 16);
    for selector in store.selectors() {
        let owned = filters
            .iter()
            .filter(|f| f.selector_id == selector.id)
            .count();
        assert_eq!(owned, 2, "selector {:?} should own both filters", selector.id);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn session_futures_are_send() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let session = Session::new(store, &EditorConfig::default());
    let rules = tokio::spawn(async move { session.list_rules().await })
        .await
        .unwrap()
        .unwrap();
    assert!(rules.is_empty());
}
