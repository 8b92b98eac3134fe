use crate::components::{SqlComponents, ValueKind};
use crate::context::{GraphContext, TranslationContext};
use crate::error::TranslationError;
use crate::expression;
use crate::patterns::translate_pattern;
use spargebra::algebra::{GraphPattern, OrderExpression};
use spargebra::term::{TermPattern, TriplePattern, Variable};
use spargebra::Query;
use spargres_common::SpaceTables;
use std::collections::BTreeMap;

/// The SPARQL query form a compilation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryForm {
    Select,
    Ask,
    Construct,
    Describe,
}

/// One value column of the final SELECT list.
///
/// `alias` is the emitted (lowercased, collision-suffixed) SQL alias;
/// `variable` is the original SPARQL spelling to restore on the way out.
/// Term-backed columns travel with `__type` / `__lang` / `__dt` companions.
#[derive(Debug, Clone)]
pub struct SelectColumn {
    pub alias: String,
    pub variable: String,
    pub term_backed: bool,
    pub kind: ValueKind,
}

/// The triple-level window requested from a paginated CONSTRUCT. The SQL
/// carries an over-fetched row LIMIT; the exact cut happens on the
/// instantiated triples.
#[derive(Debug, Clone, Copy)]
pub struct ConstructSlice {
    pub start: usize,
    pub length: Option<usize>,
}

/// A fully assembled SQL statement plus everything the executor needs to
/// shape its rows back into SPARQL results.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub form: QueryForm,
    pub sql: String,
    pub columns: Vec<SelectColumn>,
    /// Emitted alias -> original variable spelling.
    pub case_mapping: BTreeMap<String, String>,
    /// CONSTRUCT template, empty for the other forms.
    pub construct_template: Vec<TriplePattern>,
    pub construct_slice: Option<ConstructSlice>,
}

/// The bindings query of a `DELETE ... INSERT ... WHERE`: a SELECT over the
/// WHERE pattern projecting every visible variable, whose rows drive the
/// template instantiation.
#[derive(Debug, Clone)]
pub struct BindingsQuery {
    pub sql: String,
    pub columns: Vec<SelectColumn>,
}

/// Compiles the WHERE pattern of an update operation into a bindings query.
pub(crate) fn compile_select_for_bindings(
    tables: &SpaceTables,
    pattern: &GraphPattern,
) -> Result<BindingsQuery, TranslationError> {
    let compiled = compile_select(tables, pattern)?;
    Ok(BindingsQuery {
        sql: compiled.sql,
        columns: compiled.columns,
    })
}

/// Solution modifiers peeled off the root of an algebra tree.
#[derive(Debug, Default, Clone)]
pub(crate) struct Modifiers {
    pub distinct: bool,
    pub projection: Option<Vec<Variable>>,
    pub order: Vec<OrderExpression>,
    pub slice: Option<(usize, Option<usize>)>,
}

/// Walks the modifier chain at the root of a pattern. Each modifier kind is
/// consumed at most once; a second Project is a nested sub-select and stays
/// in place.
pub(crate) fn peel_modifiers(pattern: &GraphPattern) -> (&GraphPattern, Modifiers) {
    let mut modifiers = Modifiers::default();
    let mut current = pattern;
    loop {
        match current {
            GraphPattern::Slice {
                inner,
                start,
                length,
            } if modifiers.slice.is_none()
                && modifiers.projection.is_none()
                && !modifiers.distinct =>
            {
                modifiers.slice = Some((*start, *length));
                current = inner;
            }
            GraphPattern::Distinct { inner } | GraphPattern::Reduced { inner }
                if !modifiers.distinct && modifiers.projection.is_none() =>
            {
                modifiers.distinct = true;
                current = inner;
            }
            GraphPattern::Project { inner, variables } if modifiers.projection.is_none() => {
                modifiers.projection = Some(variables.clone());
                current = inner;
            }
            GraphPattern::OrderBy { inner, expression } if modifiers.order.is_empty() => {
                modifiers.order = expression.clone();
                current = inner;
            }
            _ => return (current, modifiers),
        }
    }
}

/// Compiles the ORDER BY items of the peeled modifiers.
pub(crate) fn compile_order_by(
    ctx: &TranslationContext<'_>,
    comps: &SqlComponents,
    modifiers: &Modifiers,
    graph: &GraphContext,
) -> Result<Vec<String>, TranslationError> {
    modifiers
        .order
        .iter()
        .map(|order| {
            let (expr, direction) = match order {
                OrderExpression::Asc(expr) => (expr, "ASC"),
                OrderExpression::Desc(expr) => (expr, "DESC"),
            };
            let compiled = expression::compile_expression(ctx, comps, expr, graph)?;
            Ok(format!("{} {direction}", compiled.sql))
        })
        .collect()
}

/// Compiles a parsed SPARQL query into a single SQL statement.
pub fn compile_query(
    tables: &SpaceTables,
    query: &Query,
) -> Result<CompiledQuery, TranslationError> {
    match query {
        Query::Select {
            dataset, pattern, ..
        } => {
            ensure_no_dataset(dataset.as_ref())?;
            compile_select(tables, pattern)
        }
        Query::Ask {
            dataset, pattern, ..
        } => {
            ensure_no_dataset(dataset.as_ref())?;
            compile_ask(tables, pattern)
        }
        Query::Construct {
            template,
            dataset,
            pattern,
            ..
        } => {
            ensure_no_dataset(dataset.as_ref())?;
            compile_construct(tables, template, pattern)
        }
        Query::Describe {
            dataset, pattern, ..
        } => {
            ensure_no_dataset(dataset.as_ref())?;
            compile_describe(tables, pattern)
        }
    }
}

fn ensure_no_dataset(
    dataset: Option<&spargebra::algebra::QueryDataset>,
) -> Result<(), TranslationError> {
    match dataset {
        Some(_) => Err(TranslationError::unsupported(
            "FROM / FROM NAMED dataset clauses",
        )),
        None => Ok(()),
    }
}

//
// SELECT
//

fn compile_select(
    tables: &SpaceTables,
    pattern: &GraphPattern,
) -> Result<CompiledQuery, TranslationError> {
    let ctx = TranslationContext::new(tables);
    let (inner, modifiers) = peel_modifiers(pattern);
    let comps = translate_pattern(&ctx, inner, &GraphContext::Default)?;
    let order_by = compile_order_by(&ctx, &comps, &modifiers, &GraphContext::Default)?;

    let projection: Vec<String> = match &modifiers.projection {
        Some(variables) => variables.iter().map(|v| v.as_str().to_owned()).collect(),
        None => comps.visible_variables().map(str::to_owned).collect(),
    };

    let (select_list, columns, case_mapping, extra_group_by) =
        build_projection(&ctx, &comps, &projection);

    let mut sql = String::from("SELECT ");
    if modifiers.distinct || comps.requires_distinct {
        sql.push_str("DISTINCT ");
    }
    sql.push_str(&select_list.join(", "));
    if !comps.from_clause.is_empty() {
        sql.push_str(" FROM ");
        sql.push_str(&comps.render_from());
    }
    sql.push_str(&comps.render_where());
    if !comps.group_by.is_empty() {
        let mut group_by = comps.group_by.clone();
        group_by.extend(extra_group_by);
        sql.push_str(" GROUP BY ");
        sql.push_str(&group_by.join(", "));
    }
    if !comps.having.is_empty() {
        sql.push_str(" HAVING ");
        sql.push_str(&comps.having.join(" AND "));
    }
    if !order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by.join(", "));
    }
    if let Some((start, length)) = modifiers.slice {
        if let Some(length) = length {
            sql.push_str(&format!(" LIMIT {length}"));
        }
        if start > 0 {
            sql.push_str(&format!(" OFFSET {start}"));
        }
    }

    Ok(CompiledQuery {
        form: QueryForm::Select,
        sql,
        columns,
        case_mapping,
        construct_template: Vec::new(),
        construct_slice: None,
    })
}

/// Builds the user-facing SELECT list for the given projection, allocating
/// case-insensitive aliases and recording the case map. Returns the select
/// items, column descriptors, the case map, and the companion expressions
/// that must join any GROUP BY clause.
fn build_projection(
    ctx: &TranslationContext<'_>,
    comps: &SqlComponents,
    projection: &[String],
) -> (
    Vec<String>,
    Vec<SelectColumn>,
    BTreeMap<String, String>,
    Vec<String>,
) {
    let mut select_list = Vec::new();
    let mut columns = Vec::new();
    let mut case_mapping = BTreeMap::new();
    let mut extra_group_by = Vec::new();
    let mut collision_counters: BTreeMap<String, usize> = BTreeMap::new();
    let grouped = !comps.group_by.is_empty();

    for name in projection {
        // Unquoted SQL identifiers fold to lowercase; SPARQL variables are
        // case-sensitive. Collisions get numeric suffixes and the case map
        // restores the original spelling in the results.
        let lowercase = name.to_lowercase();
        let alias = match collision_counters.get_mut(&lowercase) {
            Some(counter) => {
                *counter += 1;
                format!("{lowercase}_{counter}")
            }
            None => {
                collision_counters.insert(lowercase.clone(), 0);
                lowercase
            }
        };
        case_mapping.insert(alias.clone(), name.clone());

        match comps.variables.get(name) {
            Some(mapping) => {
                let value_expr = if mapping.kind == ValueKind::Text {
                    mapping.text.clone()
                } else {
                    format!("CAST({} AS TEXT)", mapping.text)
                };
                select_list.push(format!("{value_expr} AS \"{alias}\""));
                if let Some(term) = &mapping.term {
                    select_list.push(format!("{} AS \"{alias}__type\"", term.kind));
                    select_list.push(format!("{} AS \"{alias}__lang\"", term.lang));
                    select_list.push(format!(
                        "(SELECT dt.term_text FROM {} dt WHERE dt.term_uuid = {}) AS \"{alias}__dt\"",
                        ctx.term_table(),
                        term.datatype_uuid
                    ));
                    if grouped && !comps.aggregate_outputs.contains(name) {
                        extra_group_by.push(term.kind.clone());
                        extra_group_by.push(term.lang.clone());
                        extra_group_by.push(term.datatype_uuid.clone());
                    }
                    columns.push(SelectColumn {
                        alias,
                        variable: name.clone(),
                        term_backed: true,
                        kind: mapping.kind,
                    });
                } else {
                    columns.push(SelectColumn {
                        alias,
                        variable: name.clone(),
                        term_backed: false,
                        kind: mapping.kind,
                    });
                }
            }
            None => {
                // Projecting a variable the pattern never binds is legal;
                // it is simply never bound in any solution.
                select_list.push(format!("CAST(NULL AS TEXT) AS \"{alias}\""));
                columns.push(SelectColumn {
                    alias,
                    variable: name.clone(),
                    term_backed: false,
                    kind: ValueKind::Unknown,
                });
            }
        }
    }

    if select_list.is_empty() {
        select_list.push("1 AS \"__one\"".to_owned());
    }
    (select_list, columns, case_mapping, extra_group_by)
}

//
// ASK
//

fn compile_ask(
    tables: &SpaceTables,
    pattern: &GraphPattern,
) -> Result<CompiledQuery, TranslationError> {
    let ctx = TranslationContext::new(tables);
    let (inner, _modifiers) = peel_modifiers(pattern);
    let comps = translate_pattern(&ctx, inner, &GraphContext::Default)?;

    let mut sql = String::from("SELECT 1");
    if !comps.from_clause.is_empty() {
        sql.push_str(" FROM ");
        sql.push_str(&comps.render_from());
    }
    sql.push_str(&comps.render_where());
    if !comps.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&comps.group_by.join(", "));
    }
    if !comps.having.is_empty() {
        sql.push_str(" HAVING ");
        sql.push_str(&comps.having.join(" AND "));
    }
    // The boolean answer is "did any row come back".
    sql.push_str(" LIMIT 1");

    Ok(CompiledQuery {
        form: QueryForm::Ask,
        sql,
        columns: Vec::new(),
        case_mapping: BTreeMap::new(),
        construct_template: Vec::new(),
        construct_slice: None,
    })
}

//
// CONSTRUCT
//

fn compile_construct(
    tables: &SpaceTables,
    template: &[TriplePattern],
    pattern: &GraphPattern,
) -> Result<CompiledQuery, TranslationError> {
    let ctx = TranslationContext::new(tables);
    let (inner, modifiers) = peel_modifiers(pattern);
    let comps = translate_pattern(&ctx, inner, &GraphContext::Default)?;
    let order_by = compile_order_by(&ctx, &comps, &modifiers, &GraphContext::Default)?;

    let projection = template_variables(template);
    let (select_list, columns, case_mapping, extra_group_by) =
        build_projection(&ctx, &comps, &projection);

    let mut sql = String::from("SELECT ");
    if modifiers.distinct || comps.requires_distinct {
        sql.push_str("DISTINCT ");
    }
    sql.push_str(&select_list.join(", "));
    if !comps.from_clause.is_empty() {
        sql.push_str(" FROM ");
        sql.push_str(&comps.render_from());
    }
    sql.push_str(&comps.render_where());
    if !comps.group_by.is_empty() {
        let mut group_by = comps.group_by.clone();
        group_by.extend(extra_group_by);
        sql.push_str(" GROUP BY ");
        sql.push_str(&group_by.join(", "));
    }
    if !comps.having.is_empty() {
        sql.push_str(" HAVING ");
        sql.push_str(&comps.having.join(" AND "));
    }
    if !order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by.join(", "));
    }

    // Pagination: a row instantiates up to |template| triples, so a slice
    // over triples maps to an over-fetched row window (1.5x buffer); the
    // executor applies the exact triple-level cut.
    let construct_slice = modifiers.slice.map(|(start, length)| ConstructSlice {
        start,
        length,
    });
    if let Some((start, Some(length))) = modifiers.slice {
        let per_row = template.len().max(1);
        let rows = ((start + length) * 3).div_ceil(2 * per_row) + 1;
        sql.push_str(&format!(" LIMIT {rows}"));
    }

    Ok(CompiledQuery {
        form: QueryForm::Construct,
        sql,
        columns,
        case_mapping,
        construct_template: template.to_vec(),
        construct_slice,
    })
}

fn template_variables(template: &[TriplePattern]) -> Vec<String> {
    fn push_unique(variables: &mut Vec<String>, name: &str) {
        if !variables.iter().any(|existing| existing == name) {
            variables.push(name.to_owned());
        }
    }
    let mut variables = Vec::new();
    for triple in template {
        if let TermPattern::Variable(var) = &triple.subject {
            push_unique(&mut variables, var.as_str());
        }
        if let spargebra::term::NamedNodePattern::Variable(var) = &triple.predicate {
            push_unique(&mut variables, var.as_str());
        }
        if let TermPattern::Variable(var) = &triple.object {
            push_unique(&mut variables, var.as_str());
        }
    }
    variables
}

//
// DESCRIBE
//

fn compile_describe(
    tables: &SpaceTables,
    pattern: &GraphPattern,
) -> Result<CompiledQuery, TranslationError> {
    let ctx = TranslationContext::new(tables);
    let (inner, modifiers) = peel_modifiers(pattern);
    let comps = translate_pattern(&ctx, inner, &GraphContext::Default)?;

    let projection: Vec<String> = match &modifiers.projection {
        Some(variables) => variables.iter().map(|v| v.as_str().to_owned()).collect(),
        None => comps.visible_variables().map(str::to_owned).collect(),
    };
    if projection.is_empty() {
        return Err(TranslationError::unsupported(
            "DESCRIBE without any resource to describe",
        ));
    }

    // The WHERE clause reduces to the set of resources to describe; that
    // set drives a subject join over the quad table.
    let mut resource_selects = Vec::new();
    for name in &projection {
        if let Some(mapping) = comps.variables.get(name) {
            let mut select = format!("SELECT {} AS resource", mapping.text);
            if !comps.from_clause.is_empty() {
                select.push_str(" FROM ");
                select.push_str(&comps.render_from());
            }
            select.push_str(&comps.render_where());
            resource_selects.push(select);
        }
    }
    if resource_selects.is_empty() {
        return Err(TranslationError::unsupported(
            "DESCRIBE with no compilable resource set",
        ));
    }
    let resources = resource_selects.join(" UNION ");

    let mut sql = format!(
        "SELECT s.term_text AS \"subject\", s.term_type AS \"subject__type\", \
         p.term_text AS \"predicate\", \
         o.term_text AS \"object\", o.term_type AS \"object__type\", \
         o.lang AS \"object__lang\", odt.term_text AS \"object__dt\" \
         FROM {quad} q \
         JOIN {term} s ON s.term_uuid = q.subject_uuid \
         JOIN {term} p ON p.term_uuid = q.predicate_uuid \
         JOIN {term} o ON o.term_uuid = q.object_uuid \
         LEFT JOIN {term} odt ON odt.term_uuid = o.datatype_uuid \
         WHERE s.term_text IN ({resources}) \
         ORDER BY s.term_text, p.term_text, o.term_text",
        quad = ctx.quad_table(),
        term = ctx.term_table(),
    );
    if let Some((start, length)) = modifiers.slice {
        if let Some(length) = length {
            sql.push_str(&format!(" LIMIT {length}"));
        }
        if start > 0 {
            sql.push_str(&format!(" OFFSET {start}"));
        }
    }

    Ok(CompiledQuery {
        form: QueryForm::Describe,
        sql,
        columns: Vec::new(),
        case_mapping: BTreeMap::new(),
        construct_template: Vec::new(),
        construct_slice: None,
    })
}
