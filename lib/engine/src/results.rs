use crate::error::EngineError;
use oxrdf::vocab::xsd;
use serde_json::{json, Map, Value};
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};
use spargres_translator::{CompiledQuery, SelectColumn, ValueKind};
use tokio_postgres::Row;

/// The shaped outcome of one SPARQL query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub results: QueryResults,
    /// Set when the row or memory cap cut the result short; the rows that
    /// were produced remain valid.
    pub truncated: bool,
}

/// SPARQL results in their JSON-facing shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResults {
    /// SELECT: one `{variable: {type, value, ...}}` object per solution.
    Solutions(Vec<Value>),
    /// CONSTRUCT / DESCRIBE: `{subject, predicate, object}` triple objects.
    Triples(Vec<Value>),
    /// ASK.
    Boolean(bool),
}

/// A decoded RDF term cell of a result row.
#[derive(Debug, Clone)]
pub(crate) enum CellTerm {
    Uri(String),
    BlankNode(String),
    Literal {
        value: String,
        lang: Option<String>,
        datatype: Option<String>,
    },
}

impl CellTerm {
    pub(crate) fn to_json(&self) -> Value {
        match self {
            CellTerm::Uri(value) => json!({"type": "uri", "value": value}),
            CellTerm::BlankNode(value) => json!({"type": "bnode", "value": value}),
            CellTerm::Literal {
                value,
                lang,
                datatype,
            } => {
                let mut object = Map::new();
                object.insert("type".to_owned(), Value::String("literal".to_owned()));
                object.insert("value".to_owned(), Value::String(value.clone()));
                if let Some(lang) = lang {
                    object.insert("xml:lang".to_owned(), Value::String(lang.clone()));
                }
                if let Some(datatype) = datatype {
                    object.insert("datatype".to_owned(), Value::String(datatype.clone()));
                }
                Value::Object(object)
            }
        }
    }
}

/// Decodes one projected cell, preferring the `__type`/`__lang`/`__dt`
/// companion columns when the variable is term-backed and falling back to
/// shape heuristics for computed values (the lexical form is all SQL kept).
pub(crate) fn decode_cell(
    row: &Row,
    column: &SelectColumn,
) -> Result<Option<CellTerm>, EngineError> {
    let value: Option<String> = try_column(row, &column.alias)?;
    let Some(value) = value else {
        return Ok(None);
    };
    if column.term_backed {
        let type_code: Option<String> = try_column(row, &format!("{}__type", column.alias))?;
        if let Some(type_code) = type_code {
            return Ok(Some(match type_code.as_str() {
                "U" | "G" => CellTerm::Uri(value),
                "B" => CellTerm::BlankNode(value),
                _ => {
                    let lang: Option<String> =
                        try_column(row, &format!("{}__lang", column.alias))?;
                    let datatype: Option<String> =
                        try_column(row, &format!("{}__dt", column.alias))?;
                    CellTerm::Literal {
                        value,
                        lang,
                        datatype,
                    }
                }
            }));
        }
    }
    Ok(Some(shape_computed_value(value, column.kind)))
}

fn try_column(row: &Row, name: &str) -> Result<Option<String>, EngineError> {
    row.try_get::<_, Option<String>>(name)
        .map_err(|e| EngineError::Database(crate::error::DatabaseFailure {
            source: e,
            sql: None,
        }))
}

/// Shapes an expression-derived value: numerics and booleans become typed
/// literals, URI-shaped strings become URIs, everything else a plain
/// literal.
fn shape_computed_value(value: String, kind: ValueKind) -> CellTerm {
    match kind {
        ValueKind::Numeric => {
            let datatype = if value.parse::<i64>().is_ok() {
                xsd::INTEGER.as_str()
            } else {
                xsd::DECIMAL.as_str()
            };
            CellTerm::Literal {
                value,
                lang: None,
                datatype: Some(datatype.to_owned()),
            }
        }
        ValueKind::Boolean => CellTerm::Literal {
            value,
            lang: None,
            datatype: Some(xsd::BOOLEAN.as_str().to_owned()),
        },
        ValueKind::Text | ValueKind::Unknown => {
            if looks_like_uri(&value) {
                CellTerm::Uri(value)
            } else {
                CellTerm::Literal {
                    value,
                    lang: None,
                    datatype: None,
                }
            }
        }
    }
}

fn looks_like_uri(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://") || value.starts_with("urn:")
}

/// Shapes SELECT rows into SPARQL JSON binding objects, restoring the
/// original variable case recorded by the assembler.
pub(crate) fn solutions_from_rows(
    rows: &[Row],
    compiled: &CompiledQuery,
) -> Result<Vec<Value>, EngineError> {
    let mut solutions = Vec::with_capacity(rows.len());
    for row in rows {
        let mut binding = Map::new();
        for column in &compiled.columns {
            if let Some(term) = decode_cell(row, column)? {
                binding.insert(column.variable.clone(), term.to_json());
            }
        }
        solutions.push(Value::Object(binding));
    }
    Ok(solutions)
}

/// Instantiates a CONSTRUCT template once per row.
///
/// A triple whose required variable is unbound on a row, or whose
/// instantiation is not a valid RDF triple (literal subject, non-URI
/// predicate), is skipped for that row. Blank nodes in the template are
/// renamed per row. The exact triple-level slice is applied last, after the
/// over-fetched SQL window.
pub(crate) fn construct_triples(
    rows: &[Row],
    compiled: &CompiledQuery,
) -> Result<Vec<Value>, EngineError> {
    let mut triples = Vec::new();
    for (row_index, row) in rows.iter().enumerate() {
        let mut cells: rustc_hash::FxHashMap<&str, Option<CellTerm>> =
            rustc_hash::FxHashMap::default();
        for column in &compiled.columns {
            cells.insert(column.variable.as_str(), decode_cell(row, column)?);
        }
        for triple in &compiled.construct_template {
            if let Some(value) = instantiate_triple(triple, &cells, row_index) {
                triples.push(value);
            }
        }
    }
    if let Some(slice) = compiled.construct_slice {
        let start = slice.start.min(triples.len());
        let end = match slice.length {
            Some(length) => (start + length).min(triples.len()),
            None => triples.len(),
        };
        triples = triples[start..end].to_vec();
    }
    Ok(triples)
}

fn instantiate_triple(
    triple: &TriplePattern,
    cells: &rustc_hash::FxHashMap<&str, Option<CellTerm>>,
    row_index: usize,
) -> Option<Value> {
    let subject = resolve_term_pattern(&triple.subject, cells, row_index)?;
    if matches!(subject, CellTerm::Literal { .. }) {
        return None;
    }
    let predicate = match &triple.predicate {
        NamedNodePattern::NamedNode(node) => CellTerm::Uri(node.as_str().to_owned()),
        NamedNodePattern::Variable(var) => match cells.get(var.as_str())? {
            Some(term @ CellTerm::Uri(_)) => term.clone(),
            _ => return None,
        },
    };
    let object = resolve_term_pattern(&triple.object, cells, row_index)?;
    Some(json!({
        "subject": subject.to_json(),
        "predicate": predicate.to_json(),
        "object": object.to_json(),
    }))
}

fn resolve_term_pattern(
    pattern: &TermPattern,
    cells: &rustc_hash::FxHashMap<&str, Option<CellTerm>>,
    row_index: usize,
) -> Option<CellTerm> {
    match pattern {
        TermPattern::NamedNode(node) => Some(CellTerm::Uri(node.as_str().to_owned())),
        TermPattern::Literal(literal) => Some(CellTerm::Literal {
            value: literal.value().to_owned(),
            lang: literal.language().map(str::to_owned),
            datatype: (literal.language().is_none() && literal.datatype() != xsd::STRING)
                .then(|| literal.datatype().as_str().to_owned()),
        }),
        // Template blank nodes are scoped to the solution: each row gets a
        // fresh label.
        TermPattern::BlankNode(node) => Some(CellTerm::BlankNode(format!(
            "{}_r{row_index}",
            node.as_str()
        ))),
        TermPattern::Variable(var) => cells.get(var.as_str())?.clone(),
        _ => None,
    }
}

/// Shapes the fixed-column DESCRIBE projection into triple objects.
pub(crate) fn describe_triples(rows: &[Row]) -> Result<Vec<Value>, EngineError> {
    let mut triples = Vec::with_capacity(rows.len());
    for row in rows {
        let subject_text: Option<String> = try_column(row, "subject")?;
        let subject_type: Option<String> = try_column(row, "subject__type")?;
        let predicate: Option<String> = try_column(row, "predicate")?;
        let object_text: Option<String> = try_column(row, "object")?;
        let object_type: Option<String> = try_column(row, "object__type")?;
        let (Some(subject_text), Some(predicate), Some(object_text)) =
            (subject_text, predicate, object_text)
        else {
            continue;
        };
        let subject = match subject_type.as_deref() {
            Some("B") => CellTerm::BlankNode(subject_text),
            _ => CellTerm::Uri(subject_text),
        };
        let object = match object_type.as_deref() {
            Some("U") | Some("G") => CellTerm::Uri(object_text),
            Some("B") => CellTerm::BlankNode(object_text),
            _ => CellTerm::Literal {
                value: object_text,
                lang: try_column(row, "object__lang")?,
                datatype: try_column(row, "object__dt")?,
            },
        };
        triples.push(json!({
            "subject": subject.to_json(),
            "predicate": CellTerm::Uri(predicate).to_json(),
            "object": object.to_json(),
        }));
    }
    Ok(triples)
}
