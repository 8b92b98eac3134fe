//! End-to-end SPARQL tests against a live PostgreSQL server, gated on
//! `SPARGRES_TEST_URL`. Without the variable every test is a silent skip.

#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use oxrdf::{GraphName, Literal, NamedNode, Quad};
use serde_json::Value;
use spargres_engine::{
    EngineOptions, ExecutionLimits, QueryResults, SparqlEngine,
};
use spargres_storage::{PoolSettings, SpaceStorage, StoragePools};
use std::sync::Arc;

async fn open(space_id: &str) -> Option<(SparqlEngine, SpaceStorage)> {
    let url = std::env::var("SPARGRES_TEST_URL").ok()?;
    let pools = Arc::new(StoragePools::connect(&PoolSettings::new(url)).unwrap());
    let engine = SparqlEngine::new(
        pools,
        EngineOptions {
            table_prefix: "sgqtest".to_owned(),
            include_sql_in_errors: true,
            ..EngineOptions::default()
        },
    )
    .unwrap();
    let space = engine.space(space_id).unwrap();
    space.drop_tables().await.unwrap();
    space.ensure_created().await.unwrap();
    Some((engine, space))
}

fn node(suffix: &str) -> NamedNode {
    NamedNode::new(format!("http://example.com/{suffix}")).unwrap()
}

fn int_quad(subject: &str, predicate: &str, object: i64, graph: &str) -> Quad {
    Quad::new(
        node(subject),
        node(predicate),
        Literal::from(object),
        GraphName::NamedNode(node(graph)),
    )
}

fn solutions(results: &QueryResults) -> &[Value] {
    match results {
        QueryResults::Solutions(rows) => rows,
        other => panic!("expected solutions, got {other:?}"),
    }
}

#[tokio::test]
async fn count_and_distinct_over_duplicates() {
    let Some((engine, space)) = open("s1").await else {
        return;
    };
    space
        .add_rdf_quads_batch(&[
            int_quad("a", "p", 1, "g"),
            int_quad("a", "p", 2, "g"),
            int_quad("a", "p", 1, "g"),
        ])
        .await
        .unwrap();

    let outcome = engine
        .execute_sparql_query(
            "s1",
            "SELECT (COUNT(*) AS ?n) WHERE { GRAPH <http://example.com/g> { \
             <http://example.com/a> <http://example.com/p> ?o } }",
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    let rows = solutions(&outcome.results).to_vec();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["n"]["value"], "3");

    let outcome = engine
        .execute_sparql_query(
            "s1",
            "SELECT DISTINCT ?o WHERE { GRAPH <http://example.com/g> { \
             <http://example.com/a> <http://example.com/p> ?o } }",
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    let mut values: Vec<String> = solutions(&outcome.results)
        .iter()
        .map(|row| row["o"]["value"].as_str().unwrap().to_owned())
        .collect();
    values.sort();
    assert_eq!(values, ["1", "2"]);
}

#[tokio::test]
async fn optional_with_filter_keeps_unmatched_rows() {
    let Some((engine, space)) = open("s2").await else {
        return;
    };
    space
        .add_rdf_quads_batch(&[
            Quad::new(
                node("alice"),
                node("name"),
                Literal::new_simple_literal("Alice"),
                GraphName::DefaultGraph,
            ),
            int_quad("alice", "age", 30, "g_ignored"),
        ])
        .await
        .unwrap();

    let outcome = engine
        .execute_sparql_query(
            "s2",
            "SELECT ?n ?a WHERE { ?s <http://example.com/name> ?n \
             OPTIONAL { ?s <http://example.com/age> ?a FILTER(?a > 50) } }",
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    let rows = solutions(&outcome.results).to_vec();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["n"]["value"], "Alice");
    // The optional side did not match: ?a stays unbound on the row.
    assert!(rows[0].get("a").is_none());
}

#[tokio::test]
async fn ask_uses_limit_one_semantics() {
    let Some((engine, space)) = open("s3").await else {
        return;
    };
    let outcome = engine
        .execute_sparql_query("s3", "ASK { ?s ?p ?o }", ExecutionLimits::default())
        .await
        .unwrap();
    assert_eq!(outcome.results, QueryResults::Boolean(false));

    space
        .add_rdf_quads_batch(&[int_quad("a", "p", 1, "g")])
        .await
        .unwrap();
    let outcome = engine
        .execute_sparql_query("s3", "ASK { ?s ?p ?o }", ExecutionLimits::default())
        .await
        .unwrap();
    assert_eq!(outcome.results, QueryResults::Boolean(true));
}

#[tokio::test]
async fn default_graph_is_the_union_of_contexts() {
    let Some((engine, space)) = open("union_graphs").await else {
        return;
    };
    space
        .add_rdf_quads_batch(&[
            int_quad("a", "p", 1, "g1"),
            int_quad("b", "p", 2, "g2"),
            Quad::new(
                node("c"),
                node("p"),
                Literal::from(3),
                GraphName::DefaultGraph,
            ),
        ])
        .await
        .unwrap();

    let outcome = engine
        .execute_sparql_query(
            "union_graphs",
            "SELECT ?s WHERE { ?s <http://example.com/p> ?o }",
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    assert_eq!(solutions(&outcome.results).len(), 3);

    // GRAPH ?g enumerates only named graphs, not the reserved default.
    let outcome = engine
        .execute_sparql_query(
            "union_graphs",
            "SELECT DISTINCT ?g WHERE { GRAPH ?g { ?s ?p ?o } }",
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    assert_eq!(solutions(&outcome.results).len(), 2);
}

#[tokio::test]
async fn minus_respects_the_shared_variable_rule() {
    let Some((engine, space)) = open("minus").await else {
        return;
    };
    space
        .add_rdf_quads_batch(&[
            int_quad("s1", "a", 1, "g"),
            int_quad("s2", "a", 2, "g"),
            int_quad("s2", "b", 9, "g"),
        ])
        .await
        .unwrap();

    let outcome = engine
        .execute_sparql_query(
            "minus",
            "SELECT ?s WHERE { ?s <http://example.com/a> ?x \
             MINUS { ?s <http://example.com/b> ?y } }",
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    let rows = solutions(&outcome.results).to_vec();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["s"]["value"], "http://example.com/s1");

    // No shared variable: MINUS removes nothing.
    let outcome = engine
        .execute_sparql_query(
            "minus",
            "SELECT ?s WHERE { ?s <http://example.com/a> ?x \
             MINUS { ?t <http://example.com/b> ?y } }",
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    assert_eq!(solutions(&outcome.results).len(), 2);
}

#[tokio::test]
async fn bound_tracks_optional_matches() {
    let Some((engine, space)) = open("bound").await else {
        return;
    };
    space
        .add_rdf_quads_batch(&[
            int_quad("s1", "a", 1, "g"),
            int_quad("s1", "b", 2, "g"),
            int_quad("s2", "a", 3, "g"),
        ])
        .await
        .unwrap();

    let outcome = engine
        .execute_sparql_query(
            "bound",
            "SELECT ?s WHERE { ?s <http://example.com/a> ?x \
             OPTIONAL { ?s <http://example.com/b> ?y } FILTER(BOUND(?y)) }",
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    let rows = solutions(&outcome.results).to_vec();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["s"]["value"], "http://example.com/s1");
}

#[tokio::test]
async fn order_by_with_limit_offset_windows_the_stream() {
    let Some((engine, space)) = open("paging").await else {
        return;
    };
    let batch: Vec<Quad> = (0..10)
        .map(|i| {
            Quad::new(
                node(&format!("s{i}")),
                node("p"),
                Literal::new_simple_literal(format!("v{i}")),
                GraphName::DefaultGraph,
            )
        })
        .collect();
    space.add_rdf_quads_batch(&batch).await.unwrap();

    let outcome = engine
        .execute_sparql_query(
            "paging",
            "SELECT ?o WHERE { ?s <http://example.com/p> ?o } \
             ORDER BY ?o LIMIT 3 OFFSET 2",
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    let values: Vec<String> = solutions(&outcome.results)
        .iter()
        .map(|row| row["o"]["value"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(values, ["v2", "v3", "v4"]);
}

#[tokio::test]
async fn row_cap_truncates_with_indicator() {
    let Some((engine, space)) = open("limits").await else {
        return;
    };
    let batch: Vec<Quad> = (0..50)
        .map(|i| int_quad(&format!("s{i}"), "p", i, "g"))
        .collect();
    space.add_rdf_quads_batch(&batch).await.unwrap();

    let outcome = engine
        .execute_sparql_query(
            "limits",
            "SELECT ?s WHERE { ?s <http://example.com/p> ?o }",
            ExecutionLimits {
                max_rows: 10,
                max_memory_mb: 500,
            },
        )
        .await
        .unwrap();
    assert!(outcome.truncated);
    assert_eq!(solutions(&outcome.results).len(), 10);
}

#[tokio::test]
async fn update_round_trip() {
    let Some((engine, _space)) = open("updates").await else {
        return;
    };
    engine
        .execute_sparql_update(
            "updates",
            "INSERT DATA { <http://example.com/old> <http://example.com/p> \"v\" }",
        )
        .await
        .unwrap();
    engine
        .execute_sparql_update(
            "updates",
            "DELETE { ?s ?p ?o } INSERT { <http://example.com/new> ?p ?o } \
             WHERE { ?s ?p ?o FILTER(?s = <http://example.com/old>) }",
        )
        .await
        .unwrap();

    let outcome = engine
        .execute_sparql_query(
            "updates",
            "SELECT ?s WHERE { ?s <http://example.com/p> \"v\" }",
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    let rows = solutions(&outcome.results).to_vec();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["s"]["value"], "http://example.com/new");
}

#[tokio::test]
async fn construct_instantiates_per_row() {
    let Some((engine, space)) = open("construct").await else {
        return;
    };
    space
        .add_rdf_quads_batch(&[
            Quad::new(
                node("a"),
                node("name"),
                Literal::new_simple_literal("A"),
                GraphName::DefaultGraph,
            ),
            Quad::new(
                node("b"),
                node("name"),
                Literal::new_simple_literal("B"),
                GraphName::DefaultGraph,
            ),
        ])
        .await
        .unwrap();

    let outcome = engine
        .execute_sparql_query(
            "construct",
            "CONSTRUCT { ?s <http://example.com/label> ?n } \
             WHERE { ?s <http://example.com/name> ?n }",
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    let QueryResults::Triples(triples) = outcome.results else {
        panic!("expected triples");
    };
    assert_eq!(triples.len(), 2);
    assert_eq!(
        triples[0]["predicate"]["value"],
        "http://example.com/label"
    );
}

#[tokio::test]
async fn sql_escape_hatch_returns_json_rows() {
    let Some((engine, space)) = open("rawsql").await else {
        return;
    };
    space
        .add_rdf_quads_batch(&[int_quad("a", "p", 1, "g")])
        .await
        .unwrap();
    let (rows, truncated) = engine
        .execute_sql_query(
            "rawsql",
            &format!("SELECT count(*) AS n FROM {}", space.tables().rdf_quad()),
            ExecutionLimits::default(),
        )
        .await
        .unwrap();
    assert!(!truncated);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["n"], 1);
}
