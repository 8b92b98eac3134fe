use crate::error::EngineError;
use crate::results::{decode_cell, CellTerm};
use oxrdf::{BlankNode, GraphName, NamedNode, Quad, Subject, Term};
use oxrdfio::{RdfFormat, RdfParser};
use rustc_hash::FxHashMap;
use spargebra::term::{
    GraphNamePattern, GroundQuadPattern, GroundTermPattern, NamedNodePattern, QuadPattern,
    TermPattern,
};
use spargres_common::{TermValue, GLOBAL_GRAPH_IRI};
use spargres_storage::{catalog, quads, SpaceStorage};
use spargres_translator::{BindingsQuery, ClearTarget, UpdatePlan, UpdateStep};
use tokio_postgres::{GenericClient, Row};
use tracing::{debug, warn};

/// Applies a lowered update plan inside one transaction: either every
/// operation takes effect or none does.
pub(crate) async fn apply_update(
    space: &SpaceStorage,
    plan: &UpdatePlan,
    include_sql_in_errors: bool,
) -> Result<bool, EngineError> {
    let mut client = space.pools().ingest().await?;
    let transaction = client
        .transaction()
        .await
        .map_err(spargres_common::error::StorageError::Database)?;

    let mut outcome = Ok(true);
    for step in &plan.steps {
        if let Err(error) = apply_step(&*transaction, space, step, include_sql_in_errors).await {
            outcome = Err(error);
            break;
        }
    }

    match outcome {
        Ok(value) => {
            transaction
                .commit()
                .await
                .map_err(spargres_common::error::StorageError::Database)?;
            Ok(value)
        }
        Err(error) => {
            // The transaction guard rolls back on drop; the term cache may
            // have learned terms that never committed, so it is flushed.
            drop(transaction);
            space.term_cache().clear();
            Err(error)
        }
    }
}

async fn apply_step<C: GenericClient>(
    client: &C,
    space: &SpaceStorage,
    step: &UpdateStep,
    include_sql_in_errors: bool,
) -> Result<(), EngineError> {
    let tables = space.tables();
    let cache = space.term_cache();
    match step {
        UpdateStep::InsertQuads(batch) => {
            quads::add_rdf_quads_batch(client, tables, cache, batch).await?;
        }
        UpdateStep::DeleteQuads(batch) => {
            quads::remove_rdf_quads_batch(client, tables, batch).await?;
        }
        UpdateStep::DeleteInsertWhere {
            bindings,
            delete_templates,
            insert_templates,
        } => {
            let rows = client
                .query(bindings.sql.as_str(), &[])
                .await
                .map_err(|e| EngineError::database(e, &bindings.sql, include_sql_in_errors))?;
            let (delete_batch, insert_batch) =
                instantiate_update_templates(&rows, bindings, delete_templates, insert_templates)?;
            debug!(
                solutions = rows.len(),
                deletes = delete_batch.len(),
                inserts = insert_batch.len(),
                "applying DELETE/INSERT WHERE"
            );
            if !delete_batch.is_empty() {
                quads::remove_rdf_quads_batch(client, tables, &delete_batch).await?;
            }
            if !insert_batch.is_empty() {
                quads::add_rdf_quads_batch(client, tables, cache, &insert_batch).await?;
            }
        }
        UpdateStep::Load {
            source,
            destination,
            silent,
        } => {
            match load_remote_graph(source, destination).await {
                Ok(batch) => {
                    quads::add_rdf_quads_batch(client, tables, cache, &batch).await?;
                }
                Err(error) if *silent => {
                    warn!(source = source.as_str(), %error, "LOAD SILENT swallowed a failure");
                }
                Err(error) => return Err(error),
            }
        }
        UpdateStep::Clear { target, silent: _ } => {
            clear_quads(client, space, target).await?;
        }
        UpdateStep::CreateGraph { graph, silent } => {
            let created = catalog::create_graph(client, tables, graph.as_str(), None).await?;
            if !created && !silent {
                return Err(EngineError::GraphAlreadyExists(graph.clone()));
            }
        }
        UpdateStep::Drop { target, silent: _ } => {
            clear_quads(client, space, target).await?;
            match target {
                ClearTarget::Graph(graph) => {
                    catalog::delete_graph(client, tables, graph.as_str()).await?;
                }
                ClearTarget::NamedGraphs | ClearTarget::AllGraphs => {
                    catalog::clear_graph_registry(client, tables).await?;
                }
                ClearTarget::DefaultGraph => {}
            }
        }
    }
    Ok(())
}

async fn clear_quads<C: GenericClient>(
    client: &C,
    space: &SpaceStorage,
    target: &ClearTarget,
) -> Result<(), EngineError> {
    let tables = space.tables();
    match target {
        ClearTarget::Graph(graph) => {
            quads::clear_graph_quads(client, tables, &TermValue::uri(graph.as_str())).await?;
        }
        ClearTarget::DefaultGraph => {
            quads::clear_graph_quads(client, tables, &TermValue::uri(GLOBAL_GRAPH_IRI)).await?;
        }
        ClearTarget::NamedGraphs => {
            quads::clear_named_graph_quads(client, tables).await?;
        }
        ClearTarget::AllGraphs => {
            quads::clear_all_quads(client, tables).await?;
        }
    }
    Ok(())
}

/// Turns binding rows into the delete and insert quad batches of a
/// `DELETE ... INSERT ... WHERE`. Rows that leave a template variable
/// unbound, or instantiate an invalid triple, skip that template triple.
fn instantiate_update_templates(
    rows: &[Row],
    bindings: &BindingsQuery,
    delete_templates: &[GroundQuadPattern],
    insert_templates: &[QuadPattern],
) -> Result<(Vec<Quad>, Vec<Quad>), EngineError> {
    let mut delete_batch = Vec::new();
    let mut insert_batch = Vec::new();
    for (row_index, row) in rows.iter().enumerate() {
        let mut cells: FxHashMap<&str, Option<CellTerm>> = FxHashMap::default();
        for column in &bindings.columns {
            cells.insert(column.variable.as_str(), decode_cell(row, column)?);
        }
        for template in delete_templates {
            if let Some(quad) = instantiate_ground_quad(template, &cells) {
                delete_batch.push(quad);
            }
        }
        for template in insert_templates {
            if let Some(quad) = instantiate_quad(template, &cells, row_index) {
                insert_batch.push(quad);
            }
        }
    }
    Ok((delete_batch, insert_batch))
}

fn instantiate_ground_quad(
    template: &GroundQuadPattern,
    cells: &FxHashMap<&str, Option<CellTerm>>,
) -> Option<Quad> {
    let subject = match &template.subject {
        GroundTermPattern::NamedNode(node) => Subject::NamedNode(node.clone()),
        GroundTermPattern::Variable(var) => cell_to_subject(cells.get(var.as_str())?.as_ref()?)?,
        _ => return None,
    };
    let predicate = resolve_predicate(&template.predicate, cells)?;
    let object = match &template.object {
        GroundTermPattern::NamedNode(node) => Term::NamedNode(node.clone()),
        GroundTermPattern::Literal(literal) => Term::Literal(literal.clone()),
        GroundTermPattern::Variable(var) => cell_to_term(cells.get(var.as_str())?.as_ref()?)?,
        _ => return None,
    };
    let graph_name = resolve_graph(&template.graph_name, cells)?;
    Some(Quad {
        subject,
        predicate,
        object,
        graph_name,
    })
}

fn instantiate_quad(
    template: &QuadPattern,
    cells: &FxHashMap<&str, Option<CellTerm>>,
    row_index: usize,
) -> Option<Quad> {
    let subject = match &template.subject {
        TermPattern::NamedNode(node) => Subject::NamedNode(node.clone()),
        TermPattern::BlankNode(node) => {
            Subject::BlankNode(scoped_blank_node(node.as_str(), row_index))
        }
        TermPattern::Variable(var) => cell_to_subject(cells.get(var.as_str())?.as_ref()?)?,
        _ => return None,
    };
    let predicate = resolve_predicate(&template.predicate, cells)?;
    let object = match &template.object {
        TermPattern::NamedNode(node) => Term::NamedNode(node.clone()),
        TermPattern::Literal(literal) => Term::Literal(literal.clone()),
        TermPattern::BlankNode(node) => {
            Term::BlankNode(scoped_blank_node(node.as_str(), row_index))
        }
        TermPattern::Variable(var) => cell_to_term(cells.get(var.as_str())?.as_ref()?)?,
        _ => return None,
    };
    let graph_name = resolve_graph(&template.graph_name, cells)?;
    Some(Quad {
        subject,
        predicate,
        object,
        graph_name,
    })
}

/// Template blank nodes are fresh per solution row.
fn scoped_blank_node(label: &str, row_index: usize) -> BlankNode {
    BlankNode::new(format!("{label}_r{row_index}"))
        .unwrap_or_else(|_| BlankNode::default())
}

fn resolve_predicate(
    pattern: &NamedNodePattern,
    cells: &FxHashMap<&str, Option<CellTerm>>,
) -> Option<NamedNode> {
    match pattern {
        NamedNodePattern::NamedNode(node) => Some(node.clone()),
        NamedNodePattern::Variable(var) => match cells.get(var.as_str())?.as_ref()? {
            CellTerm::Uri(iri) => NamedNode::new(iri).ok(),
            _ => None,
        },
    }
}

fn resolve_graph(
    pattern: &GraphNamePattern,
    cells: &FxHashMap<&str, Option<CellTerm>>,
) -> Option<GraphName> {
    match pattern {
        GraphNamePattern::NamedNode(node) => Some(GraphName::NamedNode(node.clone())),
        GraphNamePattern::DefaultGraph => Some(GraphName::DefaultGraph),
        GraphNamePattern::Variable(var) => match cells.get(var.as_str())?.as_ref()? {
            CellTerm::Uri(iri) => NamedNode::new(iri).ok().map(GraphName::NamedNode),
            _ => None,
        },
    }
}

fn cell_to_subject(cell: &CellTerm) -> Option<Subject> {
    match cell {
        CellTerm::Uri(iri) => NamedNode::new(iri).ok().map(Subject::NamedNode),
        CellTerm::BlankNode(label) => BlankNode::new(label).ok().map(Subject::BlankNode),
        CellTerm::Literal { .. } => None,
    }
}

fn cell_to_term(cell: &CellTerm) -> Option<Term> {
    match cell {
        CellTerm::Uri(iri) => NamedNode::new(iri).ok().map(Term::NamedNode),
        CellTerm::BlankNode(label) => BlankNode::new(label).ok().map(Term::BlankNode),
        CellTerm::Literal {
            value,
            lang,
            datatype,
        } => Some(Term::Literal(match (lang, datatype) {
            (Some(lang), _) => oxrdf::Literal::new_language_tagged_literal(value, lang).ok()?,
            (None, Some(datatype)) => {
                oxrdf::Literal::new_typed_literal(value, NamedNode::new(datatype).ok()?)
            }
            (None, None) => oxrdf::Literal::new_simple_literal(value),
        })),
    }
}

/// Fetches and parses a remote RDF document for `LOAD`.
async fn load_remote_graph(
    source: &NamedNode,
    destination: &GraphName,
) -> Result<Vec<Quad>, EngineError> {
    let url = source.as_str();
    let response = reqwest::get(url).await.map_err(|e| EngineError::Load {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let body = response.bytes().await.map_err(|e| EngineError::Load {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;

    let format = content_type
        .as_deref()
        .and_then(|value| RdfFormat::from_media_type(value))
        .or_else(|| {
            url.rsplit('.')
                .next()
                .and_then(RdfFormat::from_extension)
        })
        .ok_or_else(|| EngineError::Load {
            url: url.to_owned(),
            reason: format!(
                "unsupported content type {}",
                content_type.as_deref().unwrap_or("unknown")
            ),
        })?;

    let mut batch = Vec::new();
    for quad in RdfParser::from_format(format).for_reader(body.as_ref()) {
        let mut quad = quad.map_err(|e| EngineError::Load {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        if *destination != GraphName::DefaultGraph {
            quad.graph_name = destination.clone();
        }
        batch.push(quad);
    }
    debug!(source = url, quads = batch.len(), "fetched remote graph");
    Ok(batch)
}
