//! Tests for the UPDATE lowering: each SPARQL UPDATE form turns into the
//! expected sequence of batch steps.

#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use oxrdf::GraphName;
use spargebra::Update;
use spargres_common::SpaceTables;
use spargres_translator::{compile_update, ClearTarget, UpdatePlan, UpdateStep};

fn tables() -> SpaceTables {
    SpaceTables::new("vg", "s1").unwrap()
}

fn compile(sparql: &str) -> UpdatePlan {
    let update = Update::parse(sparql, None).unwrap();
    compile_update(&tables(), &update).unwrap()
}

#[test]
fn insert_data_is_one_batch() {
    let plan = compile(
        "INSERT DATA { <http://example.com/a> <http://example.com/p> 1 . \
         <http://example.com/a> <http://example.com/p> 2 }",
    );
    assert_eq!(plan.steps.len(), 1);
    let UpdateStep::InsertQuads(quads) = &plan.steps[0] else {
        panic!("expected an insert batch");
    };
    assert_eq!(quads.len(), 2);
    // Quads without an explicit graph keep the default graph; the storage
    // layer rewrites it to the reserved global graph on insert.
    assert!(quads.iter().all(|q| q.graph_name == GraphName::DefaultGraph));
}

#[test]
fn insert_data_with_graph_keeps_the_graph() {
    let plan = compile(
        "INSERT DATA { GRAPH <http://example.com/g> { \
         <http://example.com/a> <http://example.com/p> \"x\" } }",
    );
    let UpdateStep::InsertQuads(quads) = &plan.steps[0] else {
        panic!("expected an insert batch");
    };
    assert_eq!(
        quads[0].graph_name.to_string(),
        "<http://example.com/g>"
    );
}

#[test]
fn delete_data_is_one_removal_batch() {
    let plan = compile(
        "DELETE DATA { <http://example.com/a> <http://example.com/p> \"x\" }",
    );
    assert_eq!(plan.steps.len(), 1);
    assert!(matches!(&plan.steps[0], UpdateStep::DeleteQuads(quads) if quads.len() == 1));
}

#[test]
fn delete_insert_where_compiles_a_bindings_query() {
    let plan = compile(
        "DELETE { ?s <http://example.com/old> ?o } \
         INSERT { ?s <http://example.com/new> ?o } \
         WHERE { ?s <http://example.com/old> ?o }",
    );
    let UpdateStep::DeleteInsertWhere {
        bindings,
        delete_templates,
        insert_templates,
    } = &plan.steps[0]
    else {
        panic!("expected a delete/insert step");
    };
    assert!(bindings.sql.starts_with("SELECT"));
    assert!(bindings.sql.contains("vg__s1__rdf_quad"));
    assert_eq!(delete_templates.len(), 1);
    assert_eq!(insert_templates.len(), 1);
    assert_eq!(bindings.columns.len(), 2);
}

#[test]
fn clear_and_drop_address_their_targets() {
    let plan = compile("CLEAR GRAPH <http://example.com/g>");
    assert!(matches!(
        &plan.steps[0],
        UpdateStep::Clear {
            target: ClearTarget::Graph(graph),
            ..
        } if graph.as_str() == "http://example.com/g"
    ));

    let plan = compile("DROP ALL");
    assert!(matches!(
        &plan.steps[0],
        UpdateStep::Drop {
            target: ClearTarget::AllGraphs,
            ..
        }
    ));

    let plan = compile("CREATE GRAPH <http://example.com/g>");
    assert!(matches!(&plan.steps[0], UpdateStep::CreateGraph { .. }));
}

#[test]
fn copy_lowers_to_drop_plus_delete_insert() {
    let plan = compile("COPY <http://example.com/g1> TO <http://example.com/g2>");
    assert_eq!(plan.steps.len(), 2);
    assert!(matches!(&plan.steps[0], UpdateStep::Drop { .. }));
    let UpdateStep::DeleteInsertWhere { bindings, .. } = &plan.steps[1] else {
        panic!("expected the copy bindings step");
    };
    // The source graph pins the context of the bindings query.
    let uuid = spargres_common::TermValue::uri("http://example.com/g1").uuid();
    assert!(bindings.sql.contains(&format!("context_uuid = '{uuid}'")));
}

#[test]
fn load_records_source_and_destination() {
    let plan = compile("LOAD <http://example.com/data.ttl> INTO GRAPH <http://example.com/g>");
    let UpdateStep::Load {
        source,
        destination,
        silent,
    } = &plan.steps[0]
    else {
        panic!("expected a load step");
    };
    assert_eq!(source.as_str(), "http://example.com/data.ttl");
    assert_eq!(
        destination.to_string(),
        "<http://example.com/g>"
    );
    assert!(!silent);
}

#[test]
fn multiple_operations_stay_ordered() {
    let plan = compile(
        "CLEAR GRAPH <http://example.com/g>; \
         INSERT DATA { GRAPH <http://example.com/g> { \
         <http://example.com/a> <http://example.com/p> \"x\" } }",
    );
    assert_eq!(plan.steps.len(), 2);
    assert!(matches!(&plan.steps[0], UpdateStep::Clear { .. }));
    assert!(matches!(&plan.steps[1], UpdateStep::InsertQuads(_)));
}
