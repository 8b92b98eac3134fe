use crate::term_cache::TermCache;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use spargres_common::error::StorageError;
use spargres_common::{SpaceTables, TermKind, TermValue};
use tokio_postgres::types::ToSql;
use tokio_postgres::GenericClient;
use tracing::debug;
use uuid::Uuid;

/// Rows inserted per multi-row statement. Five parameters per row keeps this
/// far below the protocol's parameter limit.
const TERM_INSERT_CHUNK: usize = 1000;

/// Outcome of a term deletion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermDeletion {
    Deleted,
    /// The term is still referenced from at least one quad position and was
    /// left in place.
    StillReferenced,
    NotFound,
}

/// Interns a single term, returning its UUID. Idempotent: an already present
/// term is reported as success.
pub async fn add_term<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    cache: &TermCache,
    term: &TermValue,
) -> Result<Uuid, StorageError> {
    let uuid = term.uuid();
    let mut unique = FxHashMap::default();
    collect_with_datatype(&mut unique, term.clone());
    ensure_terms(client, tables, cache, &unique).await?;
    Ok(uuid)
}

/// Returns the UUID of the term if it is present in the dictionary.
pub async fn get_term_uuid<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    term: &TermValue,
) -> Result<Option<Uuid>, StorageError> {
    let uuid = term.uuid();
    let sql = format!(
        "SELECT term_uuid FROM {} WHERE term_uuid = $1",
        tables.term()
    );
    let row = client.query_opt(sql.as_str(), &[&uuid]).await?;
    Ok(row.map(|_| uuid))
}

/// Deletes a term unless a quad still references it in any position.
pub async fn delete_term<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    cache: &TermCache,
    term: &TermValue,
) -> Result<TermDeletion, StorageError> {
    let uuid = term.uuid();
    if get_term_uuid(client, tables, term).await?.is_none() {
        return Ok(TermDeletion::NotFound);
    }
    let referenced_sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE subject_uuid = $1 OR predicate_uuid = $1 OR object_uuid = $1 OR context_uuid = $1)",
        tables.rdf_quad()
    );
    let referenced: bool = client.query_one(referenced_sql.as_str(), &[&uuid]).await?.get(0);
    if referenced {
        return Ok(TermDeletion::StillReferenced);
    }
    let delete_sql = format!("DELETE FROM {} WHERE term_uuid = $1", tables.term());
    client.execute(delete_sql.as_str(), &[&uuid]).await?;
    cache.clear_term(term);
    Ok(TermDeletion::Deleted)
}

/// Resolves dictionary rows for a set of UUIDs, joining each typed literal
/// with its datatype's lexical form.
pub async fn resolve_terms<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    uuids: &[Uuid],
) -> Result<FxHashMap<Uuid, TermValue>, StorageError> {
    if uuids.is_empty() {
        return Ok(FxHashMap::default());
    }
    let sql = format!(
        "SELECT t.term_uuid, t.term_text, t.term_type, t.lang, dt.term_text \
         FROM {term} t LEFT JOIN {term} dt ON dt.term_uuid = t.datatype_uuid \
         WHERE t.term_uuid = ANY($1)",
        term = tables.term()
    );
    let rows = client.query(sql.as_str(), &[&uuids]).await?;
    let mut resolved = FxHashMap::default();
    for row in rows {
        let uuid: Uuid = row.get(0);
        let type_code: String = row.get(2);
        let kind = TermKind::from_sql(&type_code)?;
        resolved.insert(
            uuid,
            TermValue {
                text: row.get(1),
                kind,
                lang: row.get(3),
                datatype: row.get(4),
            },
        );
    }
    Ok(resolved)
}

/// Makes sure every term in `unique` (keyed by UUID) exists in the
/// dictionary: one probe for the not-cached subset, one multi-row insert for
/// the missing subset. Returns the number of newly inserted rows.
pub async fn ensure_terms<C: GenericClient>(
    client: &C,
    tables: &SpaceTables,
    cache: &TermCache,
    unique: &FxHashMap<Uuid, TermValue>,
) -> Result<usize, StorageError> {
    let candidates: Vec<(&Uuid, &TermValue)> = unique
        .iter()
        .filter(|(_, term)| cache.get(term).is_none())
        .collect();
    if candidates.is_empty() {
        return Ok(0);
    }

    let probe_uuids: Vec<Uuid> = candidates.iter().map(|(uuid, _)| **uuid).collect();
    let probe_sql = format!(
        "SELECT term_uuid FROM {} WHERE term_uuid = ANY($1)",
        tables.term()
    );
    let existing: Vec<Uuid> = client
        .query(probe_sql.as_str(), &[&probe_uuids])
        .await?
        .into_iter()
        .map(|row| row.get(0))
        .collect();
    let existing: rustc_hash::FxHashSet<Uuid> = existing.into_iter().collect();

    let missing: Vec<(&Uuid, &TermValue)> = candidates
        .iter()
        .filter(|(uuid, _)| !existing.contains(uuid))
        .copied()
        .collect();

    let mut inserted = 0;
    for chunk in &missing.iter().chunks(TERM_INSERT_CHUNK) {
        let chunk: Vec<_> = chunk.collect();
        let type_codes: Vec<String> = chunk
            .iter()
            .map(|(_, term)| term.kind.code().to_string())
            .collect();
        let datatype_uuids: Vec<Option<Uuid>> = chunk
            .iter()
            .map(|(_, term)| term.datatype_uuid())
            .collect();
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * 5);
        let mut values = String::new();
        for (i, (uuid, term)) in chunk.iter().enumerate() {
            if i > 0 {
                values.push_str(", ");
            }
            let base = i * 5;
            values.push_str(&format!(
                "(${}, ${}, ${}, ${}, ${})",
                base + 1,
                base + 2,
                base + 3,
                base + 4,
                base + 5
            ));
            params.push(*uuid);
            params.push(&term.text);
            params.push(&type_codes[i]);
            params.push(&term.lang);
            params.push(&datatype_uuids[i]);
        }
        let sql = format!(
            "INSERT INTO {} (term_uuid, term_text, term_type, lang, datatype_uuid) VALUES {} ON CONFLICT (term_uuid) DO NOTHING",
            tables.term(),
            values
        );
        inserted += client.execute(sql.as_str(), &params).await? as usize;
    }

    for (uuid, term) in candidates {
        cache.insert(term.clone(), *uuid);
    }
    debug!(
        space = tables.space_id(),
        probed = probe_uuids.len(),
        inserted,
        "ensured terms"
    );
    Ok(inserted)
}


/// Adds a term and, for typed literals, its datatype term to the unique set.
pub(crate) fn collect_with_datatype(unique: &mut FxHashMap<Uuid, TermValue>, term: TermValue) {
    if let Some(datatype) = term.datatype.as_deref() {
        let datatype_term = TermValue::uri(datatype);
        unique.entry(datatype_term.uuid()).or_insert(datatype_term);
    }
    unique.entry(term.uuid()).or_insert(term);
}
