use std::collections::{BTreeMap, BTreeSet};

/// Rough static type of a SQL scalar expression, used to pick comparison
/// semantics and to shape expression-derived results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// A term's lexical form or any other text.
    Text,
    Numeric,
    Boolean,
    Unknown,
}

/// Companion expressions available for a term-backed variable: everything
/// needed to rebuild the full RDF term besides its lexical form.
#[derive(Debug, Clone)]
pub struct TermColumns {
    /// `term_type` code expression.
    pub kind: String,
    /// `lang` expression.
    pub lang: String,
    /// `datatype_uuid` expression.
    pub datatype_uuid: String,
}

impl TermColumns {
    /// Companions of a term-table alias.
    pub fn from_alias(alias: &str) -> Self {
        Self {
            kind: format!("{alias}.term_type"),
            lang: format!("{alias}.lang"),
            datatype_uuid: format!("{alias}.datatype_uuid"),
        }
    }

    /// Companions projected through a derived relation under `base` column
    /// naming (`base__type`, `base__lang`, `base__dt`).
    pub fn from_derived(relation: &str, base: &str) -> Self {
        Self {
            kind: format!("{relation}.{base}__type"),
            lang: format!("{relation}.{base}__lang"),
            datatype_uuid: format!("{relation}.{base}__dt"),
        }
    }
}

/// The SQL expressions projecting one SPARQL variable.
#[derive(Debug, Clone)]
pub struct VarColumns {
    /// Expression yielding the lexical form.
    pub text: String,
    pub kind: ValueKind,
    /// Companions for term-backed variables; `None` for expression-derived
    /// bindings such as BIND results and aggregates.
    pub term: Option<TermColumns>,
}

impl VarColumns {
    /// A variable backed by a term-table alias.
    pub fn term_alias(alias: &str) -> Self {
        Self {
            text: format!("{alias}.term_text"),
            kind: ValueKind::Text,
            term: Some(TermColumns::from_alias(alias)),
        }
    }

    /// A variable carried through a derived relation.
    pub fn derived(relation: &str, base: &str, term_backed: bool) -> Self {
        Self {
            text: format!("{relation}.{base}"),
            kind: ValueKind::Text,
            term: term_backed.then(|| TermColumns::from_derived(relation, base)),
        }
    }

    /// A variable bound to a computed expression.
    pub fn expression(sql: String, kind: ValueKind) -> Self {
        Self {
            text: sql,
            kind,
            term: None,
        }
    }
}

/// The relational fragment a pattern translates to.
///
/// `from_clause` is a single table reference or a parenthesized subquery,
/// `joins` the ordered join tail, `where_conditions` are AND-ed together.
/// Variables are keyed by their original SPARQL spelling (case-sensitive).
#[derive(Debug, Default, Clone)]
pub struct SqlComponents {
    pub from_clause: String,
    pub joins: Vec<String>,
    pub where_conditions: Vec<String>,
    pub variables: BTreeMap<String, VarColumns>,
    pub group_by: Vec<String>,
    pub having: Vec<String>,
    /// Variables produced by the aggregate list of an enclosing Group; a
    /// filter referencing one of these belongs in HAVING, not WHERE.
    pub aggregate_outputs: BTreeSet<String>,
    /// Set when a basic graph pattern composed two or more quad aliases with
    /// CROSS JOIN; the assembler restores multiset semantics with DISTINCT.
    pub requires_distinct: bool,
}

impl SqlComponents {
    /// Renders `FROM ... <joins>`.
    pub fn render_from(&self) -> String {
        let mut from = self.from_clause.clone();
        for join in &self.joins {
            from.push(' ');
            from.push_str(join);
        }
        from
    }

    /// Renders the WHERE clause, or an empty string if unconstrained.
    pub fn render_where(&self) -> String {
        if self.where_conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_conditions.join(" AND "))
        }
    }

    /// Variable names visible to the outside, skipping internal bindings
    /// (blank-node placeholders).
    pub fn visible_variables(&self) -> impl Iterator<Item = &str> {
        self.variables
            .keys()
            .map(String::as_str)
            .filter(|name| !name.starts_with("_:") && !name.starts_with("__"))
    }

    /// Names bound by both components, in deterministic order.
    pub fn shared_variables(&self, other: &SqlComponents) -> Vec<String> {
        self.variables
            .keys()
            .filter(|name| other.variables.contains_key(*name))
            .cloned()
            .collect()
    }
}
