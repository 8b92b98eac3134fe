//! Facade smoke tests, gated on `SPARGRES_TEST_URL`.

#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use spargres::model::{GraphName, Literal, NamedNode, Quad};
use spargres::engine::QueryResults;
use spargres::storage::QuadScanSpec;
use spargres::SpaceStore;

async fn open(space_id: &str) -> Option<SpaceStore> {
    let url = std::env::var("SPARGRES_TEST_URL").ok()?;
    let store = SpaceStore::connect(&url, space_id).await.unwrap();
    store.storage().drop_tables().await.unwrap();
    store.storage().ensure_created().await.unwrap();
    Some(store)
}

#[tokio::test]
async fn insert_query_update_cycle() {
    let Some(store) = open("facade").await else {
        return;
    };
    assert!(store.is_empty().await.unwrap());

    let alice = NamedNode::new("http://example.com/alice").unwrap();
    let name = NamedNode::new("http://example.com/name").unwrap();
    store
        .insert_quads(&[Quad::new(
            alice.clone(),
            name.clone(),
            Literal::new_simple_literal("Alice"),
            GraphName::DefaultGraph,
        )])
        .await
        .unwrap();
    assert_eq!(store.len().await.unwrap(), 1);

    let outcome = store
        .query("SELECT ?n WHERE { ?s <http://example.com/name> ?n }")
        .await
        .unwrap();
    let QueryResults::Solutions(rows) = outcome.results else {
        panic!("expected solutions");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["n"]["value"], "Alice");

    store
        .update("DELETE DATA { <http://example.com/alice> <http://example.com/name> \"Alice\" }")
        .await
        .unwrap();
    assert!(store.is_empty().await.unwrap());

    assert!(store
        .quads_matching(&QuadScanSpec::any())
        .await
        .unwrap()
        .is_empty());
}
