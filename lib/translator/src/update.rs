use crate::assembler::{compile_select_for_bindings, BindingsQuery};
use crate::error::TranslationError;
use spargebra::algebra::GraphTarget;
use spargebra::term::{
    GroundQuad, GroundQuadPattern, GroundSubject, GroundTerm, Quad as QuadTemplate, QuadPattern,
};
use spargebra::{GraphUpdateOperation, Update};
use spargres_common::SpaceTables;
use oxrdf::{GraphName, NamedNode, Quad, Subject, Term};

/// The graphs a CLEAR or DROP operation addresses.
#[derive(Debug, Clone)]
pub enum ClearTarget {
    Graph(NamedNode),
    DefaultGraph,
    NamedGraphs,
    AllGraphs,
}

/// An ordered sequence of low-level storage operations equivalent to one
/// SPARQL UPDATE request. The whole plan applies atomically.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub steps: Vec<UpdateStep>,
}

/// One lowered update operation.
#[derive(Debug, Clone)]
pub enum UpdateStep {
    /// `INSERT DATA`: one quad batch insert.
    InsertQuads(Vec<Quad>),
    /// `DELETE DATA`: one quad batch removal.
    DeleteQuads(Vec<Quad>),
    /// `DELETE ... INSERT ... WHERE`: run the bindings query, instantiate
    /// the delete templates then the insert templates per binding row, and
    /// apply both as batches.
    DeleteInsertWhere {
        bindings: BindingsQuery,
        delete_templates: Vec<GroundQuadPattern>,
        insert_templates: Vec<QuadPattern>,
    },
    /// `LOAD <source> [INTO GRAPH <destination>]`: fetch, parse, bulk insert.
    Load {
        source: NamedNode,
        destination: GraphName,
        silent: bool,
    },
    /// `CLEAR`: delete quads by context.
    Clear { target: ClearTarget, silent: bool },
    /// `CREATE GRAPH`: register a named graph.
    CreateGraph { graph: NamedNode, silent: bool },
    /// `DROP GRAPH`: clear plus registry removal.
    Drop { target: ClearTarget, silent: bool },
}

/// Lowers a parsed SPARQL UPDATE into storage steps. COPY, MOVE and ADD
/// arrive from the parser already rewritten into DROP and INSERT/WHERE
/// sequences, so the seven core operations cover the full surface.
pub fn compile_update(
    tables: &SpaceTables,
    update: &Update,
) -> Result<UpdatePlan, TranslationError> {
    let mut steps = Vec::with_capacity(update.operations.len());
    for operation in &update.operations {
        steps.push(compile_operation(tables, operation)?);
    }
    Ok(UpdatePlan { steps })
}

fn compile_operation(
    tables: &SpaceTables,
    operation: &GraphUpdateOperation,
) -> Result<UpdateStep, TranslationError> {
    match operation {
        GraphUpdateOperation::InsertData { data } => Ok(UpdateStep::InsertQuads(
            data.iter()
                .map(quad_from_template)
                .collect::<Result<_, _>>()?,
        )),
        GraphUpdateOperation::DeleteData { data } => Ok(UpdateStep::DeleteQuads(
            data.iter()
                .map(quad_from_ground)
                .collect::<Result<_, _>>()?,
        )),
        GraphUpdateOperation::DeleteInsert {
            delete,
            insert,
            using,
            pattern,
        } => {
            if using.is_some() {
                return Err(TranslationError::unsupported("USING dataset clauses"));
            }
            let bindings = compile_select_for_bindings(tables, pattern)?;
            Ok(UpdateStep::DeleteInsertWhere {
                bindings,
                delete_templates: delete.clone(),
                insert_templates: insert.clone(),
            })
        }
        GraphUpdateOperation::Load {
            silent,
            source,
            destination,
        } => Ok(UpdateStep::Load {
            source: source.clone(),
            destination: graph_name_from(destination),
            silent: *silent,
        }),
        GraphUpdateOperation::Clear { silent, graph } => Ok(UpdateStep::Clear {
            target: clear_target(graph),
            silent: *silent,
        }),
        GraphUpdateOperation::Create { silent, graph } => Ok(UpdateStep::CreateGraph {
            graph: graph.clone(),
            silent: *silent,
        }),
        GraphUpdateOperation::Drop { silent, graph } => Ok(UpdateStep::Drop {
            target: clear_target(graph),
            silent: *silent,
        }),
    }
}

fn clear_target(target: &GraphTarget) -> ClearTarget {
    match target {
        GraphTarget::NamedNode(node) => ClearTarget::Graph(node.clone()),
        GraphTarget::DefaultGraph => ClearTarget::DefaultGraph,
        GraphTarget::NamedGraphs => ClearTarget::NamedGraphs,
        GraphTarget::AllGraphs => ClearTarget::AllGraphs,
    }
}

fn graph_name_from(graph_name: &spargebra::term::GraphName) -> GraphName {
    match graph_name {
        spargebra::term::GraphName::NamedNode(node) => GraphName::NamedNode(node.clone()),
        spargebra::term::GraphName::DefaultGraph => GraphName::DefaultGraph,
    }
}

/// Converts an INSERT DATA quad (no variables, blank nodes allowed) into a
/// storable quad.
fn quad_from_template(quad: &QuadTemplate) -> Result<Quad, TranslationError> {
    let subject = match &quad.subject {
        Subject::NamedNode(node) => Subject::NamedNode(node.clone()),
        Subject::BlankNode(node) => Subject::BlankNode(node.clone()),
        _ => {
            return Err(TranslationError::unsupported(
                "RDF-star triple term in INSERT DATA",
            ))
        }
    };
    let object = match &quad.object {
        Term::NamedNode(node) => Term::NamedNode(node.clone()),
        Term::BlankNode(node) => Term::BlankNode(node.clone()),
        Term::Literal(literal) => Term::Literal(literal.clone()),
        _ => {
            return Err(TranslationError::unsupported(
                "RDF-star triple term in INSERT DATA",
            ))
        }
    };
    Ok(Quad {
        subject,
        predicate: quad.predicate.clone(),
        object,
        graph_name: graph_name_from(&quad.graph_name),
    })
}

/// Converts a DELETE DATA quad (no variables, no blank nodes) into a
/// storable quad.
fn quad_from_ground(quad: &GroundQuad) -> Result<Quad, TranslationError> {
    let subject = match &quad.subject {
        GroundSubject::NamedNode(node) => Subject::NamedNode(node.clone()),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(TranslationError::unsupported(
                "RDF-star triple term in DELETE DATA",
            ))
        }
    };
    let object = match &quad.object {
        GroundTerm::NamedNode(node) => Term::NamedNode(node.clone()),
        GroundTerm::Literal(literal) => Term::Literal(literal.clone()),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(TranslationError::unsupported(
                "RDF-star triple term in DELETE DATA",
            ))
        }
    };
    Ok(Quad {
        subject,
        predicate: quad.predicate.clone(),
        object,
        graph_name: graph_name_from(&quad.graph_name),
    })
}
