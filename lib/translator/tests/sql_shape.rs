//! SQL-shape tests for the SPARQL-to-SQL compiler.
//!
//! These are pure: they parse SPARQL, compile it against a fixed table
//! configuration, and assert over the generated SQL text.

#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use spargebra::Query;
use spargres_common::{SpaceTables, TermValue, GLOBAL_GRAPH_IRI};
use spargres_translator::{compile_query, CompiledQuery, QueryForm};

fn tables() -> SpaceTables {
    SpaceTables::new("vg", "s1").unwrap()
}

fn compile(sparql: &str) -> CompiledQuery {
    let query = Query::parse(sparql, None).unwrap();
    compile_query(&tables(), &query).unwrap()
}

#[test]
fn single_triple_pattern_scans_one_quad_alias() {
    let compiled = compile("SELECT ?s ?o WHERE { ?s <http://example.com/p> ?o }");
    assert_eq!(compiled.form, QueryForm::Select);
    assert!(compiled.sql.contains("FROM vg__s1__rdf_quad q0"));
    assert!(compiled.sql.contains("JOIN vg__s1__term s_0 ON s_0.term_uuid = q0.subject_uuid"));
    assert!(compiled.sql.contains("p_0.term_text = 'http://example.com/p'"));
    assert!(compiled.sql.contains("p_0.term_type = 'U'"));
    // One quad alias: multiset semantics need no DISTINCT.
    assert!(!compiled.sql.starts_with("SELECT DISTINCT"));
    assert!(!compiled.sql.contains("CROSS JOIN"));
}

#[test]
fn shared_variables_join_on_term_uuids() {
    let compiled = compile(
        "SELECT ?s WHERE { ?s <http://example.com/p> ?o . ?o <http://example.com/q> ?v }",
    );
    assert!(compiled.sql.contains("CROSS JOIN vg__s1__rdf_quad q1"));
    // The join rides on the UUID columns, never on term_text.
    assert!(compiled.sql.contains("q0.object_uuid = q1.subject_uuid"));
    // Two quad aliases composed with CROSS JOIN restore multiset semantics
    // through DISTINCT.
    assert!(compiled.sql.starts_with("SELECT DISTINCT"));
}

#[test]
fn constant_literal_constrains_lang_and_datatype() {
    let compiled =
        compile("SELECT ?s WHERE { ?s <http://example.com/p> \"x\" }");
    assert!(compiled.sql.contains("o_0.term_text = 'x'"));
    assert!(compiled.sql.contains("o_0.term_type = 'L'"));
    assert!(compiled.sql.contains("o_0.lang IS NULL"));
    assert!(compiled.sql.contains("o_0.datatype_uuid IS NULL"));
}

#[test]
fn graph_constant_pins_context_uuid() {
    let compiled = compile(
        "SELECT ?o WHERE { GRAPH <http://example.com/g> { <http://example.com/a> ?p ?o } }",
    );
    let uuid = TermValue::uri("http://example.com/g").uuid();
    assert!(compiled.sql.contains(&format!("q0.context_uuid = '{uuid}'")));
}

#[test]
fn graph_variable_binds_context_and_skips_reserved_graph() {
    let compiled = compile("SELECT ?g WHERE { GRAPH ?g { ?s ?p ?o } }");
    assert!(compiled.sql.contains("JOIN vg__s1__term c_0 ON c_0.term_uuid = q0.context_uuid"));
    let global = TermValue::uri(GLOBAL_GRAPH_IRI).uuid();
    assert!(compiled.sql.contains(&format!("q0.context_uuid <> '{global}'")));
    assert!(compiled.sql.contains("c_0.term_text AS \"g\""));
}

#[test]
fn no_graph_clause_means_union_over_all_contexts() {
    let compiled = compile("SELECT ?s WHERE { ?s ?p ?o }");
    assert!(!compiled.sql.contains("context_uuid"));
}

#[test]
fn optional_compiles_to_left_joined_subquery() {
    let compiled = compile(
        "SELECT ?n ?a WHERE { ?s <http://example.com/name> ?n \
         OPTIONAL { ?s <http://example.com/age> ?a } }",
    );
    assert!(compiled.sql.contains("LEFT JOIN (SELECT"));
    assert!(compiled.sql.contains(") opt0 ON "));
}

#[test]
fn optional_filter_stays_inside_the_subquery() {
    let compiled = compile(
        "SELECT ?n ?a WHERE { ?s <http://example.com/name> ?n \
         OPTIONAL { ?s <http://example.com/age> ?a FILTER(?a > 50) } }",
    );
    // The filter is a join condition: it must live inside the LEFT JOIN
    // subquery, not in the outer WHERE. The optional side continues the
    // outer alias numbering, so its triple is q1/o_1.
    let subquery_start = compiled.sql.find("LEFT JOIN (").unwrap();
    let subquery_end = compiled.sql.find(") opt0").unwrap();
    let guard = "CAST(o_1.term_text AS numeric)";
    let inside = &compiled.sql[subquery_start..subquery_end];
    assert!(inside.contains(guard));
    let outside_tail = &compiled.sql[subquery_end..];
    assert!(!outside_tail.contains(guard));
}

#[test]
fn union_pads_missing_variables_with_nulls() {
    let compiled = compile(
        "SELECT ?a ?b WHERE { { ?s <http://example.com/p> ?a } UNION { ?s <http://example.com/q> ?b } }",
    );
    assert!(compiled.sql.contains("UNION ALL"));
    assert!(compiled.sql.contains("CAST(NULL AS TEXT)"));
    assert!(compiled.sql.contains(") u0"));
}

#[test]
fn minus_with_shared_variable_is_anti_join() {
    let compiled = compile(
        "SELECT ?s WHERE { ?s <http://example.com/a> ?x MINUS { ?s <http://example.com/b> ?y } }",
    );
    assert!(compiled.sql.contains("NOT EXISTS (SELECT 1 FROM"));
    // The right side's aliases (q1/s_1) are distinct from the outer q0/s_0,
    // so the anti-join genuinely correlates on the shared variable instead
    // of comparing the subquery's own alias to itself.
    assert!(compiled.sql.contains("s_1.term_text = s_0.term_text"));
}

#[test]
fn exists_filter_correlates_on_shared_variables() {
    let compiled = compile(
        "SELECT ?s WHERE { ?s <http://example.com/a> ?x \
         FILTER(EXISTS { ?s <http://example.com/b> ?z }) }",
    );
    assert!(compiled.sql.contains("EXISTS (SELECT 1 FROM"));
    assert!(compiled.sql.contains("s_1.term_text = s_0.term_text"));
}

#[test]
fn minus_without_shared_variable_is_a_no_op() {
    let compiled = compile(
        "SELECT ?s WHERE { ?s <http://example.com/a> ?x MINUS { ?t <http://example.com/b> ?y } }",
    );
    assert!(!compiled.sql.contains("NOT EXISTS"));
}

#[test]
fn values_becomes_a_table_constructor() {
    let compiled = compile(
        "SELECT ?s ?v WHERE { ?s <http://example.com/p> ?v VALUES ?v { \"a\" \"b\" } }",
    );
    assert!(compiled.sql.contains("(VALUES ('a'), ('b')) AS v0(c0)"));
}

#[test]
fn bind_projects_the_computed_expression() {
    let compiled = compile(
        "SELECT ?len WHERE { ?s <http://example.com/p> ?o BIND(STRLEN(?o) AS ?len) }",
    );
    assert!(compiled.sql.contains("LENGTH(o_0.term_text)"));
}

#[test]
fn numeric_filter_uses_guarded_cast() {
    let compiled =
        compile("SELECT ?o WHERE { ?s <http://example.com/p> ?o FILTER(?o > 10) }");
    assert!(compiled.sql.contains("CAST(o_0.term_text AS numeric)"));
    assert!(compiled.sql.contains("THEN CAST"));
    assert!(compiled.sql.contains("> 10"));
}

#[test]
fn regex_with_case_insensitive_flag_uses_tilde_star() {
    let compiled = compile(
        "SELECT ?o WHERE { ?s ?p ?o FILTER(REGEX(?o, \"^ali\", \"i\")) }",
    );
    assert!(compiled.sql.contains("o_0.term_text ~* '^ali'"));
}

#[test]
fn order_limit_offset_round_trip() {
    let compiled = compile(
        "SELECT ?o WHERE { ?s ?p ?o } ORDER BY DESC(?o) LIMIT 10 OFFSET 5",
    );
    assert!(compiled.sql.contains("ORDER BY o_0.term_text DESC"));
    assert!(compiled.sql.ends_with("LIMIT 10 OFFSET 5"));
}

#[test]
fn count_star_aggregates_without_group_keys() {
    let compiled = compile("SELECT (COUNT(*) AS ?n) WHERE { ?s ?p ?o }");
    // Numeric results are cast to text so every value column decodes the
    // same way.
    assert!(compiled.sql.contains("CAST(COUNT(*) AS TEXT) AS \"n\""));
    assert!(!compiled.sql.contains("GROUP BY"));
}

#[test]
fn group_by_emits_keys_and_having() {
    let compiled = compile(
        "SELECT ?s (COUNT(?o) AS ?n) WHERE { ?s ?p ?o } GROUP BY ?s HAVING(COUNT(?o) > 2)",
    );
    assert!(compiled.sql.contains("GROUP BY s_0.term_text"));
    assert!(compiled.sql.contains("HAVING"));
    assert!(!compiled.sql.contains("WHERE (COUNT"));
}

#[test]
fn ask_wraps_with_limit_one() {
    let compiled = compile("ASK { ?s ?p ?o }");
    assert_eq!(compiled.form, QueryForm::Ask);
    assert!(compiled.sql.starts_with("SELECT 1 FROM"));
    assert!(compiled.sql.ends_with("LIMIT 1"));
}

#[test]
fn construct_projects_template_variables() {
    let compiled = compile(
        "CONSTRUCT { ?s <http://example.com/knows> ?o } WHERE { ?s <http://example.com/p> ?o }",
    );
    assert_eq!(compiled.form, QueryForm::Construct);
    assert_eq!(compiled.construct_template.len(), 1);
    assert!(compiled.sql.contains("AS \"s\""));
    assert!(compiled.sql.contains("AS \"o\""));
}

#[test]
fn paginated_construct_overfetches_rows() {
    let compiled = compile(
        "CONSTRUCT { ?s <http://example.com/knows> ?o } \
         WHERE { ?s <http://example.com/p> ?o } LIMIT 10",
    );
    let slice = compiled.construct_slice.unwrap();
    assert_eq!(slice.start, 0);
    assert_eq!(slice.length, Some(10));
    // 10 triples over a one-triple template, 1.5x buffer, plus one.
    assert!(compiled.sql.ends_with("LIMIT 16"));
}

#[test]
fn describe_joins_resources_against_subjects() {
    let compiled = compile("DESCRIBE <http://example.com/a>");
    assert_eq!(compiled.form, QueryForm::Describe);
    assert!(compiled.sql.contains("WHERE s.term_text IN (SELECT"));
    assert!(compiled.sql.contains("ORDER BY s.term_text"));
}

#[test]
fn case_colliding_variables_get_suffixed_aliases() {
    let compiled = compile(
        "SELECT ?name ?NAME WHERE { ?s <http://example.com/a> ?name . \
         ?s <http://example.com/b> ?NAME }",
    );
    assert!(compiled.sql.contains("AS \"name\""));
    assert!(compiled.sql.contains("AS \"name_1\""));
    assert_eq!(compiled.case_mapping["name"], "name");
    assert_eq!(compiled.case_mapping["name_1"], "NAME");
}

#[test]
fn term_backed_projection_carries_companion_columns() {
    let compiled = compile("SELECT ?o WHERE { ?s ?p ?o }");
    assert!(compiled.sql.contains("AS \"o__type\""));
    assert!(compiled.sql.contains("AS \"o__lang\""));
    assert!(compiled.sql.contains("AS \"o__dt\""));
    assert_eq!(compiled.columns.len(), 1);
    assert!(compiled.columns[0].term_backed);
}

#[test]
fn nested_select_is_a_self_contained_subquery() {
    let compiled = compile(
        "SELECT ?s ?total WHERE { ?s <http://example.com/p> ?o \
         { SELECT (COUNT(*) AS ?total) WHERE { ?x ?y ?z } } }",
    );
    assert!(compiled.sql.contains("CROSS JOIN (SELECT"));
    assert!(compiled.sql.contains(") sq0"));
}

#[test]
fn bound_observes_null_mappings() {
    let compiled = compile(
        "SELECT ?s WHERE { ?s <http://example.com/p> ?o \
         OPTIONAL { ?s <http://example.com/q> ?v } FILTER(BOUND(?v)) }",
    );
    assert!(compiled.sql.contains("IS NOT NULL"));
}

#[test]
fn unsupported_constructs_error_out_by_name() {
    let query = Query::parse(
        "SELECT ?s WHERE { ?s <http://example.com/p>+ ?o }",
        None,
    )
    .unwrap();
    let error = compile_query(&tables(), &query).unwrap_err();
    assert!(error.to_string().contains("property path"));

    let query = Query::parse(
        "SELECT ?s FROM <http://example.com/g> WHERE { ?s ?p ?o }",
        None,
    )
    .unwrap();
    let error = compile_query(&tables(), &query).unwrap_err();
    assert!(error.to_string().contains("FROM"));
}
