use crate::term_cache::TermCache;
use crate::terms::{collect_with_datatype, ensure_terms};
use itertools::Itertools;
use oxrdf::{Quad, QuadRef, SubjectRef};
use rustc_hash::FxHashMap;
use spargres_common::error::{CorruptionError, StorageError};
use spargres_common::{SpaceTables, TermValue};
use tokio_postgres::types::ToSql;
use tokio_postgres::GenericClient;
use tracing::debug;
use uuid::Uuid;

/// Rows inserted per multi-row statement (four parameters per row).
const QUAD_INSERT_CHUNK: usize = 2000;

/// The four stored positions of a quad.
struct QuadTerms {
    subject: TermValue,
    predicate: TermValue,
    object: TermValue,
    context: TermValue,
}

impl QuadTerms {
    fn from_quad(quad: QuadRef<'_>) -> Result<Self, CorruptionError> {
        let subject = match quad.subject {
            SubjectRef::NamedNode(node) => TermValue::from_term(node.into())?,
            SubjectRef::BlankNode(node) => TermValue::from_term(node.into())?,
            _ => {
                return Err(CorruptionError::msg(
                    "Triple terms are not supported in the subject position",
                ))
            }
        };
        Ok(Self {
            subject,
            predicate: TermValue::from_term(quad.predicate.into())?,
            object: TermValue::from_term(quad.object)?,
            // An unbound graph is rewritten to the reserved global graph.
            context: TermValue::from_graph_name(quad.graph_name),
        })
    }

    fn uuids(&self) -> [Uuid; 4] {
        [
            self.subject.uuid(),
            self.predicate.uuid(),
            self.object.uuid(),
            self.context.uuid(),
        ]
    }
}

/// Inserts a batch of quads.
///
/// The whole batch costs one existence probe over the unique term set (term
/// cache hits shrink it further) plus one multi-row insert per table,
/// independent of how many duplicates the input carries. Terms are inserted
/// before quads so that every quad row references existing dictionary rows
/// by construction.
pub async fn add_rdf_quads_batch<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    cache: &TermCache,
    quads: &[Quad],
) -> Result<u64, StorageError> {
    if quads.is_empty() {
        return Ok(0);
    }

    let mut unique_terms: FxHashMap<Uuid, TermValue> = FxHashMap::default();
    let mut rows: Vec<[Uuid; 4]> = Vec::with_capacity(quads.len());
    for quad in quads {
        let terms = QuadTerms::from_quad(quad.as_ref())?;
        rows.push(terms.uuids());
        collect_with_datatype(&mut unique_terms, terms.subject);
        collect_with_datatype(&mut unique_terms, terms.predicate);
        collect_with_datatype(&mut unique_terms, terms.object);
        collect_with_datatype(&mut unique_terms, terms.context);
    }

    ensure_terms(client, tables, cache, &unique_terms).await?;

    let mut inserted = 0;
    for chunk in &rows.iter().chunks(QUAD_INSERT_CHUNK) {
        let chunk: Vec<_> = chunk.collect();
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * 4);
        let mut values = String::new();
        for (i, row) in chunk.iter().enumerate() {
            if i > 0 {
                values.push_str(", ");
            }
            let base = i * 4;
            values.push_str(&format!(
                "(${}, ${}, ${}, ${})",
                base + 1,
                base + 2,
                base + 3,
                base + 4
            ));
            params.extend(row.iter().map(|uuid| uuid as &(dyn ToSql + Sync)));
        }
        let sql = format!(
            "INSERT INTO {} (subject_uuid, predicate_uuid, object_uuid, context_uuid) VALUES {}",
            tables.rdf_quad(),
            values
        );
        inserted += client.execute(sql.as_str(), &params).await?;
    }
    debug!(
        space = tables.space_id(),
        quads = quads.len(),
        terms = unique_terms.len(),
        "inserted quad batch"
    );
    Ok(inserted)
}

/// Removes a batch of quads, one stored row per input occurrence.
///
/// Identical 4-tuples in the input are grouped and exactly that many rows
/// are deleted per group, so removing one duplicate leaves the other copies
/// in place.
pub async fn remove_rdf_quads_batch<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    quads: &[Quad],
) -> Result<u64, StorageError> {
    let mut groups: FxHashMap<[Uuid; 4], i64> = FxHashMap::default();
    for quad in quads {
        let terms = QuadTerms::from_quad(quad.as_ref())?;
        *groups.entry(terms.uuids()).or_insert(0) += 1;
    }

    let sql = format!(
        "DELETE FROM {quad} WHERE ctid IN (\
         SELECT ctid FROM {quad} \
         WHERE subject_uuid = $1 AND predicate_uuid = $2 AND object_uuid = $3 AND context_uuid = $4 \
         LIMIT $5)",
        quad = tables.rdf_quad()
    );
    let mut removed = 0;
    for ([s, p, o, c], count) in groups {
        removed += client.execute(sql.as_str(), &[&s, &p, &o, &c, &count]).await?;
    }
    Ok(removed)
}

/// Removes every quad whose subject is the given URI.
pub async fn remove_quads_by_subject<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    subject_iri: &str,
) -> Result<u64, StorageError> {
    let sql = format!(
        "DELETE FROM {quad} WHERE subject_uuid IN (\
         SELECT term_uuid FROM {term} WHERE term_text = $1 AND term_type = 'U')",
        quad = tables.rdf_quad(),
        term = tables.term()
    );
    Ok(client.execute(sql.as_str(), &[&subject_iri]).await?)
}

/// Number of quads in the space, across all graphs.
pub async fn quad_count<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
) -> Result<i64, StorageError> {
    let sql = format!("SELECT count(*) FROM {}", tables.rdf_quad());
    Ok(client.query_one(sql.as_str(), &[]).await?.get(0))
}

/// Number of quads stored under one context.
pub async fn graph_quad_count<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    context: &TermValue,
) -> Result<i64, StorageError> {
    let uuid = context.uuid();
    let sql = format!(
        "SELECT count(*) FROM {} WHERE context_uuid = $1",
        tables.rdf_quad()
    );
    Ok(client.query_one(sql.as_str(), &[&uuid]).await?.get(0))
}

/// Deletes every quad stored under one context.
pub async fn clear_graph_quads<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    context: &TermValue,
) -> Result<u64, StorageError> {
    let uuid = context.uuid();
    let sql = format!("DELETE FROM {} WHERE context_uuid = $1", tables.rdf_quad());
    Ok(client.execute(sql.as_str(), &[&uuid]).await?)
}

/// Deletes every quad stored under a named graph, leaving the reserved
/// global graph untouched.
pub async fn clear_named_graph_quads<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
) -> Result<u64, StorageError> {
    let global = TermValue::uri(spargres_common::GLOBAL_GRAPH_IRI).uuid();
    let sql = format!("DELETE FROM {} WHERE context_uuid <> $1", tables.rdf_quad());
    Ok(client.execute(sql.as_str(), &[&global]).await?)
}

/// Deletes every quad in the space.
pub async fn clear_all_quads<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
) -> Result<u64, StorageError> {
    let sql = format!("DELETE FROM {}", tables.rdf_quad());
    Ok(client.execute(sql.as_str(), &[]).await?)
}
