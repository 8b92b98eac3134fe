use oxrdf::{NamedNode, Quad, Subject, Term};
use spargres_common::error::{CorruptionError, StorageError};
use spargres_common::{SpaceTables, TermKind, TermValue};
use std::collections::VecDeque;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Portal, Row, Transaction};

/// Page size of the server-side portal.
const SCAN_PAGE_SIZE: i32 = 1000;

/// Constraint on one position of a quad pattern.
#[derive(Debug, Clone)]
pub enum PatternValue {
    /// Match exactly this term.
    Bound(TermValue),
    /// Leave the position unconstrained.
    Any,
    /// Match terms whose lexical form satisfies a POSIX regex; the trigram
    /// indexes accelerate this when present.
    Regex(String),
}

/// A pattern over the four quad positions.
#[derive(Debug, Clone)]
pub struct QuadScanSpec {
    pub subject: PatternValue,
    pub predicate: PatternValue,
    pub object: PatternValue,
    pub graph: PatternValue,
}

impl QuadScanSpec {
    /// A pattern that matches every quad.
    pub fn any() -> Self {
        Self {
            subject: PatternValue::Any,
            predicate: PatternValue::Any,
            object: PatternValue::Any,
            graph: PatternValue::Any,
        }
    }
}

/// A streaming scan over quads matching a pattern.
///
/// Rows are fetched through a server-side portal in pages so a large match
/// set is never materialized at once. Dropping the scan rolls the read
/// transaction back, which closes the portal before the connection returns
/// to the pool.
pub struct QuadPatternScan<'a> {
    transaction: Transaction<'a>,
    portal: Portal,
    buffer: VecDeque<Quad>,
    exhausted: bool,
}

impl<'a> QuadPatternScan<'a> {
    /// Binds the pattern and opens the portal.
    pub async fn start(
        client: &'a mut Client,
        tables: &SpaceTables,
        spec: &QuadScanSpec,
    ) -> Result<QuadPatternScan<'a>, StorageError> {
        let mut conditions: Vec<String> = Vec::new();
        let mut owned_params: Vec<String> = Vec::new();
        for (alias, value) in [
            ("s", &spec.subject),
            ("p", &spec.predicate),
            ("o", &spec.object),
            ("c", &spec.graph),
        ] {
            match value {
                PatternValue::Any => {}
                PatternValue::Bound(term) => {
                    owned_params.push(term.text.clone());
                    conditions.push(format!("{alias}.term_text = ${}", owned_params.len()));
                    owned_params.push(term.kind.code().to_string());
                    conditions.push(format!("{alias}.term_type = ${}", owned_params.len()));
                }
                PatternValue::Regex(pattern) => {
                    owned_params.push(pattern.clone());
                    conditions.push(format!("{alias}.term_text ~ ${}", owned_params.len()));
                }
            }
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT s.term_text, s.term_type, p.term_text, \
             o.term_text, o.term_type, o.lang, odt.term_text, \
             c.term_text, c.term_type \
             FROM {quad} q \
             JOIN {term} s ON s.term_uuid = q.subject_uuid \
             JOIN {term} p ON p.term_uuid = q.predicate_uuid \
             JOIN {term} o ON o.term_uuid = q.object_uuid \
             LEFT JOIN {term} odt ON odt.term_uuid = o.datatype_uuid \
             JOIN {term} c ON c.term_uuid = q.context_uuid{where_clause}",
            quad = tables.rdf_quad(),
            term = tables.term(),
        );

        let transaction = client.transaction().await?;
        let params: Vec<&(dyn ToSql + Sync)> = owned_params
            .iter()
            .map(|value| value as &(dyn ToSql + Sync))
            .collect();
        let portal = transaction.bind(sql.as_str(), &params).await?;
        Ok(QuadPatternScan {
            transaction,
            portal,
            buffer: VecDeque::new(),
            exhausted: false,
        })
    }

    /// Returns the next matching quad, or `None` once the scan is complete.
    pub async fn next(&mut self) -> Result<Option<Quad>, StorageError> {
        if self.buffer.is_empty() && !self.exhausted {
            let rows = self
                .transaction
                .query_portal(&self.portal, SCAN_PAGE_SIZE)
                .await?;
            if (rows.len() as i32) < SCAN_PAGE_SIZE {
                self.exhausted = true;
            }
            for row in rows {
                self.buffer.push_back(decode_quad(&row)?);
            }
        }
        Ok(self.buffer.pop_front())
    }

    /// Drains the remaining matches.
    pub async fn collect_remaining(mut self) -> Result<Vec<Quad>, StorageError> {
        let mut quads = Vec::new();
        while let Some(quad) = self.next().await? {
            quads.push(quad);
        }
        self.close().await?;
        Ok(quads)
    }

    /// Closes the portal by ending the read transaction.
    pub async fn close(self) -> Result<(), StorageError> {
        self.transaction.rollback().await?;
        Ok(())
    }
}

fn decode_quad(row: &Row) -> Result<Quad, CorruptionError> {
    let subject_text: String = row.get(0);
    let subject_type: String = row.get(1);
    let subject = match TermKind::from_sql(&subject_type)? {
        TermKind::Uri | TermKind::Graph => Subject::from(
            NamedNode::new(subject_text).map_err(CorruptionError::new)?,
        ),
        TermKind::BlankNode => Subject::from(
            oxrdf::BlankNode::new(subject_text).map_err(CorruptionError::new)?,
        ),
        TermKind::Literal => {
            return Err(CorruptionError::msg("Literal stored in subject position"))
        }
    };

    let predicate_text: String = row.get(2);
    let predicate = NamedNode::new(predicate_text).map_err(CorruptionError::new)?;

    let object_type: String = row.get(4);
    let object_value = TermValue {
        text: row.get(3),
        kind: TermKind::from_sql(&object_type)?,
        lang: row.get(5),
        datatype: row.get(6),
    };
    let object: Term = object_value.to_term()?;

    let graph_type: String = row.get(8);
    let graph_value = TermValue {
        text: row.get(7),
        kind: TermKind::from_sql(&graph_type)?,
        lang: None,
        datatype: None,
    };
    let graph_name = graph_value.to_graph_name()?;

    Ok(Quad::new(subject, predicate, object, graph_name))
}

