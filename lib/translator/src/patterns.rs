use crate::assembler;
use crate::components::{SqlComponents, ValueKind, VarColumns};
use crate::context::{GraphContext, TranslationContext};
use crate::error::TranslationError;
use crate::expression::{self, expression_variables};
use crate::sql::quote_literal;
use spargebra::algebra::GraphPattern;
use spargebra::term::{
    GroundTerm, NamedNodePattern, TermPattern, TriplePattern, Variable,
};
use spargres_common::{TermValue, GLOBAL_GRAPH_IRI};
use std::collections::BTreeMap;

/// Translates a graph pattern into a relational fragment.
///
/// `graph` carries the enclosing GRAPH clause, if any. Solution modifiers
/// (Project, Distinct, OrderBy, Slice) reaching this function are nested
/// sub-selects; the root modifiers are peeled off by the assembler first.
pub fn translate_pattern(
    ctx: &TranslationContext<'_>,
    pattern: &GraphPattern,
    graph: &GraphContext,
) -> Result<SqlComponents, TranslationError> {
    match pattern {
        GraphPattern::Bgp { patterns } => translate_bgp(ctx, patterns, graph),
        GraphPattern::Graph { name, inner } => {
            let graph = match name {
                NamedNodePattern::NamedNode(node) => GraphContext::named(node.as_str()),
                NamedNodePattern::Variable(var) => {
                    GraphContext::Variable(var.as_str().to_owned())
                }
            };
            translate_pattern(ctx, inner, &graph)
        }
        GraphPattern::Join { left, right } => {
            let left = translate_pattern(ctx, left, graph)?;
            let right = translate_pattern(ctx, right, graph)?;
            merge_join(ctx, left, right)
        }
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => translate_left_join(ctx, left, right, expression.as_ref(), graph),
        GraphPattern::Union { left, right } => translate_union(ctx, left, right, graph),
        GraphPattern::Minus { left, right } => translate_minus(ctx, left, right, graph),
        GraphPattern::Filter { expr, inner } => {
            let mut inner = translate_pattern(ctx, inner, graph)?;
            let condition = expression::compile_boolean(ctx, &inner, expr, graph)?;
            let references_aggregate = expression_variables(expr)
                .iter()
                .any(|name| inner.aggregate_outputs.contains(name));
            if references_aggregate {
                inner.having.push(condition);
            } else {
                inner.where_conditions.push(condition);
            }
            Ok(inner)
        }
        GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => {
            let mut inner = translate_pattern(ctx, inner, graph)?;
            if inner.variables.contains_key(variable.as_str()) {
                return Err(TranslationError::internal(format!(
                    "BIND targets the already-bound variable ?{}",
                    variable.as_str()
                )));
            }
            let compiled = expression::compile_expression(ctx, &inner, expression, graph)?;
            // A binding derived from an aggregate output is itself
            // aggregate-valued for filter routing.
            if expression_variables(expression)
                .iter()
                .any(|name| inner.aggregate_outputs.contains(name))
            {
                inner
                    .aggregate_outputs
                    .insert(variable.as_str().to_owned());
            }
            inner.variables.insert(
                variable.as_str().to_owned(),
                VarColumns::expression(compiled.sql, compiled.kind),
            );
            Ok(inner)
        }
        GraphPattern::Values {
            variables,
            bindings,
        } => translate_values(ctx, variables, bindings),
        GraphPattern::Group {
            inner,
            variables,
            aggregates,
        } => translate_group(ctx, inner, variables, aggregates, graph),
        GraphPattern::Project { .. }
        | GraphPattern::Distinct { .. }
        | GraphPattern::Reduced { .. }
        | GraphPattern::OrderBy { .. }
        | GraphPattern::Slice { .. } => translate_nested_select(ctx, pattern, graph),
        GraphPattern::Path { .. } => Err(TranslationError::unsupported("property path")),
        GraphPattern::Service { .. } => Err(TranslationError::unsupported("SERVICE")),
        _ => Err(TranslationError::unsupported(format!(
            "graph pattern {pattern:?}"
        ))),
    }
}

/// One column of a derived relation's projection.
#[derive(Debug, Clone)]
pub(crate) struct SubColumn {
    pub var: String,
    pub base: String,
    pub term_backed: bool,
}

/// The positional projection layout of a components set: visible variables
/// in deterministic order, named `c0`, `c1`, ...
pub(crate) fn layout_for(comps: &SqlComponents) -> Vec<SubColumn> {
    comps
        .visible_variables()
        .enumerate()
        .map(|(i, var)| SubColumn {
            var: var.to_owned(),
            base: format!("c{i}"),
            term_backed: comps
                .variables
                .get(var)
                .and_then(|columns| columns.term.as_ref())
                .is_some(),
        })
        .collect()
}

/// Renders a components set as a self-contained `SELECT`, projecting the
/// given layout. Variables absent from the components are padded with NULLs
/// so union branches line up.
pub(crate) fn render_subquery(
    comps: &SqlComponents,
    layout: &[SubColumn],
    distinct: bool,
    order_by: &[String],
    slice: Option<(usize, Option<usize>)>,
) -> String {
    let mut items: Vec<String> = Vec::new();
    let mut group_by = comps.group_by.clone();
    let grouped = !group_by.is_empty();
    for column in layout {
        match comps.variables.get(&column.var) {
            Some(mapping) => {
                items.push(format!(
                    "{} AS {}",
                    cast_text(&mapping.text, mapping.kind),
                    column.base
                ));
                if column.term_backed {
                    if let Some(term) = &mapping.term {
                        items.push(format!("{} AS {}__type", term.kind, column.base));
                        items.push(format!("{} AS {}__lang", term.lang, column.base));
                        items.push(format!("{} AS {}__dt", term.datatype_uuid, column.base));
                        if grouped && !comps.aggregate_outputs.contains(&column.var) {
                            group_by.push(term.kind.clone());
                            group_by.push(term.lang.clone());
                            group_by.push(term.datatype_uuid.clone());
                        }
                    } else {
                        items.push(format!("CAST(NULL AS CHAR(1)) AS {}__type", column.base));
                        items.push(format!("CAST(NULL AS TEXT) AS {}__lang", column.base));
                        items.push(format!("CAST(NULL AS UUID) AS {}__dt", column.base));
                    }
                }
            }
            None => {
                items.push(format!("CAST(NULL AS TEXT) AS {}", column.base));
                if column.term_backed {
                    items.push(format!("CAST(NULL AS CHAR(1)) AS {}__type", column.base));
                    items.push(format!("CAST(NULL AS TEXT) AS {}__lang", column.base));
                    items.push(format!("CAST(NULL AS UUID) AS {}__dt", column.base));
                }
            }
        }
    }
    if items.is_empty() {
        // A pattern binding no variables still produces rows.
        items.push("1 AS c_none".to_owned());
    }

    let mut sql = String::from("SELECT ");
    if distinct || comps.requires_distinct {
        sql.push_str("DISTINCT ");
    }
    sql.push_str(&items.join(", "));
    if !comps.from_clause.is_empty() {
        sql.push_str(" FROM ");
        sql.push_str(&comps.render_from());
    }
    sql.push_str(&comps.render_where());
    if grouped {
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
    if let Some((start, length)) = slice {
        if let Some(length) = length {
            sql.push_str(&format!(" LIMIT {length}"));
        }
        if start > 0 {
            sql.push_str(&format!(" OFFSET {start}"));
        }
    }
    sql
}

fn cast_text(expr: &str, kind: ValueKind) -> String {
    if kind == ValueKind::Text {
        expr.to_owned()
    } else {
        format!("CAST({expr} AS TEXT)")
    }
}

/// Exposes a rendered subquery as a derived relation with fresh mappings.
fn derived_components(
    alias: String,
    sql: String,
    layout: &[SubColumn],
) -> SqlComponents {
    let mut comps = SqlComponents {
        from_clause: format!("({sql}) {alias}"),
        ..SqlComponents::default()
    };
    for column in layout {
        comps.variables.insert(
            column.var.clone(),
            VarColumns::derived(&alias, &column.base, column.term_backed),
        );
    }
    comps
}

/// Wraps a grouped fragment into a derived relation so it can be composed
/// with joins; flat fragments pass through unchanged.
pub(crate) fn wrap_grouped(
    ctx: &TranslationContext<'_>,
    comps: SqlComponents,
) -> SqlComponents {
    if comps.group_by.is_empty() && comps.having.is_empty() {
        return comps;
    }
    let layout = layout_for(&comps);
    let sql = render_subquery(&comps, &layout, false, &[], None);
    let alias = ctx.next_derived_alias("sq");
    derived_components(alias, sql, &layout)
}

//
// BGP
//

fn translate_bgp(
    ctx: &TranslationContext<'_>,
    patterns: &[TriplePattern],
    graph: &GraphContext,
) -> Result<SqlComponents, TranslationError> {
    let mut comps = SqlComponents::default();
    // Variable name -> quad-table UUID columns binding it, in pattern order.
    let mut uuid_bindings: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut alias_count = 0;

    for triple in patterns {
        let index = ctx.next_quad_index();
        let quad_alias = format!("q{index}");
        let quad_ref = format!("{} {}", ctx.quad_table(), quad_alias);
        if alias_count == 0 {
            comps.from_clause = quad_ref;
        } else {
            comps.joins.push(format!("CROSS JOIN {quad_ref}"));
        }
        alias_count += 1;

        translate_position(
            ctx,
            &mut comps,
            &mut uuid_bindings,
            &quad_alias,
            "subject_uuid",
            &format!("s_{index}"),
            subject_position(&triple.subject)?,
        )?;
        let predicate_position = match &triple.predicate {
            NamedNodePattern::NamedNode(node) => {
                Position::Constant(TermValue::uri(node.as_str()))
            }
            NamedNodePattern::Variable(var) => Position::Variable(var.as_str().to_owned()),
        };
        translate_position(
            ctx,
            &mut comps,
            &mut uuid_bindings,
            &quad_alias,
            "predicate_uuid",
            &format!("p_{index}"),
            predicate_position,
        )?;
        translate_position(
            ctx,
            &mut comps,
            &mut uuid_bindings,
            &quad_alias,
            "object_uuid",
            &format!("o_{index}"),
            object_position(&triple.object)?,
        )?;

        match graph {
            GraphContext::Default => {}
            GraphContext::Named(uuid) => {
                comps
                    .where_conditions
                    .push(format!("{quad_alias}.context_uuid = '{uuid}'"));
            }
            GraphContext::Variable(name) => {
                let context_alias = format!("c_{index}");
                translate_position(
                    ctx,
                    &mut comps,
                    &mut uuid_bindings,
                    &quad_alias,
                    "context_uuid",
                    &context_alias,
                    Position::Variable(name.clone()),
                )?;
                // The reserved default graph is not a named graph and must
                // not be enumerated by GRAPH ?g.
                comps.where_conditions.push(format!(
                    "{quad_alias}.context_uuid <> '{}'",
                    TermValue::uri(GLOBAL_GRAPH_IRI).uuid()
                ));
            }
        }
    }

    // Triples sharing a variable join on the term UUID columns; the term
    // dictionary exists precisely so these joins never touch term_text.
    for columns in uuid_bindings.values() {
        for later in &columns[1..] {
            comps
                .where_conditions
                .push(format!("{} = {}", columns[0], later));
        }
    }

    comps.requires_distinct = alias_count >= 2;
    Ok(comps)
}

enum Position {
    Variable(String),
    Constant(TermValue),
}

fn subject_position(pattern: &TermPattern) -> Result<Position, TranslationError> {
    term_position(pattern)
}

fn object_position(pattern: &TermPattern) -> Result<Position, TranslationError> {
    term_position(pattern)
}

fn term_position(pattern: &TermPattern) -> Result<Position, TranslationError> {
    match pattern {
        TermPattern::Variable(var) => Ok(Position::Variable(var.as_str().to_owned())),
        // A blank node in a query pattern is an anonymous variable scoped to
        // the query; the "_:" prefix keeps it out of projections.
        TermPattern::BlankNode(node) => Ok(Position::Variable(format!("_:{}", node.as_str()))),
        TermPattern::NamedNode(node) => Ok(Position::Constant(TermValue::uri(node.as_str()))),
        TermPattern::Literal(literal) => Ok(Position::Constant(
            TermValue::from_term(literal.as_ref().into())?,
        )),
        _ => Err(TranslationError::unsupported(
            "RDF-star triple term in a triple pattern",
        )),
    }
}

fn translate_position(
    ctx: &TranslationContext<'_>,
    comps: &mut SqlComponents,
    uuid_bindings: &mut BTreeMap<String, Vec<String>>,
    quad_alias: &str,
    uuid_column: &str,
    term_alias: &str,
    position: Position,
) -> Result<(), TranslationError> {
    let uuid_expr = format!("{quad_alias}.{uuid_column}");
    match position {
        Position::Variable(name) => {
            let bindings = uuid_bindings.entry(name.clone()).or_default();
            bindings.push(uuid_expr.clone());
            if !comps.variables.contains_key(&name) {
                comps.joins.push(format!(
                    "JOIN {} {term_alias} ON {term_alias}.term_uuid = {uuid_expr}",
                    ctx.term_table()
                ));
                comps
                    .variables
                    .insert(name, VarColumns::term_alias(term_alias));
            }
        }
        Position::Constant(term) => {
            comps.joins.push(format!(
                "JOIN {} {term_alias} ON {term_alias}.term_uuid = {uuid_expr}",
                ctx.term_table()
            ));
            comps
                .where_conditions
                .extend(constant_term_conditions(term_alias, &term));
        }
    }
    Ok(())
}

/// Predicates pinning a term alias to one concrete term.
fn constant_term_conditions(alias: &str, term: &TermValue) -> Vec<String> {
    let mut conditions = vec![
        format!("{alias}.term_text = {}", quote_literal(&term.text)),
        format!("{alias}.term_type = '{}'", term.kind.code()),
    ];
    if term.kind == spargres_common::TermKind::Literal {
        match &term.lang {
            Some(lang) => conditions.push(format!("{alias}.lang = {}", quote_literal(lang))),
            None => conditions.push(format!("{alias}.lang IS NULL")),
        }
        match term.datatype_uuid() {
            Some(uuid) => conditions.push(format!("{alias}.datatype_uuid = '{uuid}'")),
            None => conditions.push(format!("{alias}.datatype_uuid IS NULL")),
        }
    }
    conditions
}

//
// Join
//

fn merge_join(
    ctx: &TranslationContext<'_>,
    left: SqlComponents,
    right: SqlComponents,
) -> Result<SqlComponents, TranslationError> {
    let mut left = wrap_grouped(ctx, left);
    let right = wrap_grouped(ctx, right);

    if right.from_clause.is_empty() {
        return merge_rowless(left, right);
    }
    if left.from_clause.is_empty() {
        return merge_rowless(right, left);
    }

    let shared = left.shared_variables(&right);
    left.joins.push(format!("CROSS JOIN {}", right.from_clause));
    left.joins.extend(right.joins);
    left.where_conditions.extend(right.where_conditions);
    for name in &shared {
        let left_expr = &left.variables[name].text;
        let right_expr = &right.variables[name].text;
        left.where_conditions
            .push(format!("{left_expr} = {right_expr}"));
    }
    for (name, mapping) in right.variables {
        left.variables.entry(name).or_insert(mapping);
    }
    left.aggregate_outputs.extend(right.aggregate_outputs);
    left.requires_distinct |= right.requires_distinct;
    Ok(left)
}

/// Joins with a side that produced no FROM clause (an empty BGP or a pure
/// BIND chain): only mappings and conditions transfer.
fn merge_rowless(
    mut base: SqlComponents,
    other: SqlComponents,
) -> Result<SqlComponents, TranslationError> {
    base.where_conditions.extend(other.where_conditions);
    for (name, mapping) in other.variables {
        base.variables.entry(name).or_insert(mapping);
    }
    base.aggregate_outputs.extend(other.aggregate_outputs);
    base.requires_distinct |= other.requires_distinct;
    Ok(base)
}

//
// OPTIONAL
//

fn translate_left_join(
    ctx: &TranslationContext<'_>,
    left: &GraphPattern,
    right: &GraphPattern,
    expression: Option<&spargebra::algebra::Expression>,
    graph: &GraphContext,
) -> Result<SqlComponents, TranslationError> {
    let left = translate_pattern(ctx, left, graph)?;
    let mut left = wrap_grouped(ctx, left);

    let sub_ctx = ctx.subscope();
    let mut right = translate_pattern(&sub_ctx, right, graph)?;
    // The OPTIONAL's filter acts as part of the join condition: it belongs
    // inside the subquery, not in the outer WHERE, otherwise it would
    // eliminate left rows that simply had no optional match.
    if let Some(expr) = expression {
        let condition = expression::compile_boolean(&sub_ctx, &right, expr, graph)?;
        if expression_variables(expr)
            .iter()
            .any(|name| right.aggregate_outputs.contains(name))
        {
            right.having.push(condition);
        } else {
            right.where_conditions.push(condition);
        }
    }

    let layout = layout_for(&right);
    let sql = render_subquery(&right, &layout, false, &[], None);
    let alias = ctx.next_derived_alias("opt");

    let mut on_conditions: Vec<String> = Vec::new();
    for column in &layout {
        if let Some(outer) = left.variables.get(&column.var) {
            on_conditions.push(format!("{} = {}.{}", outer.text, alias, column.base));
        }
    }
    let on_clause = if on_conditions.is_empty() {
        "TRUE".to_owned()
    } else {
        on_conditions.join(" AND ")
    };
    left.joins
        .push(format!("LEFT JOIN ({sql}) {alias} ON {on_clause}"));

    for column in &layout {
        left.variables.entry(column.var.clone()).or_insert_with(|| {
            VarColumns::derived(&alias, &column.base, column.term_backed)
        });
    }
    Ok(left)
}

//
// UNION
//

fn translate_union(
    ctx: &TranslationContext<'_>,
    left: &GraphPattern,
    right: &GraphPattern,
    graph: &GraphContext,
) -> Result<SqlComponents, TranslationError> {
    // Each branch compiles as its own subquery; the shared projection
    // layout lines the branch columns up for UNION ALL.
    let left_ctx = ctx.subscope();
    let left = translate_pattern(&left_ctx, left, graph)?;
    let right_ctx = ctx.subscope();
    let right = translate_pattern(&right_ctx, right, graph)?;

    let mut names: Vec<&str> = left.visible_variables().collect();
    for name in right.visible_variables() {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.sort_unstable();
    let layout: Vec<SubColumn> = names
        .iter()
        .enumerate()
        .map(|(i, name)| SubColumn {
            var: (*name).to_owned(),
            base: format!("c{i}"),
            term_backed: [&left, &right].iter().any(|side| {
                side.variables
                    .get(*name)
                    .and_then(|columns| columns.term.as_ref())
                    .is_some()
            }),
        })
        .collect();

    let left_sql = render_subquery(&left, &layout, false, &[], None);
    let right_sql = render_subquery(&right, &layout, false, &[], None);
    let alias = ctx.next_derived_alias("u");
    Ok(derived_components(
        alias,
        format!("{left_sql} UNION ALL {right_sql}"),
        &layout,
    ))
}

//
// MINUS
//

fn translate_minus(
    ctx: &TranslationContext<'_>,
    left: &GraphPattern,
    right: &GraphPattern,
    graph: &GraphContext,
) -> Result<SqlComponents, TranslationError> {
    let mut left = translate_pattern(ctx, left, graph)?;
    let sub_ctx = ctx.subscope();
    let right = translate_pattern(&sub_ctx, right, graph)?;
    let right = wrap_grouped(&sub_ctx, right);

    let shared = left.shared_variables(&right);
    if shared.is_empty() {
        // MINUS with disjoint domains removes nothing.
        return Ok(left);
    }

    // The anti-join correlates on the shared variables. The subscope
    // continues the outer alias numbering, so the outer expressions keep
    // resolving to the outer relations inside the NOT EXISTS.
    let mut conditions = right.where_conditions.clone();
    for name in &shared {
        conditions.push(format!(
            "{} = {}",
            right.variables[name].text, left.variables[name].text
        ));
    }
    let mut subquery = String::from("SELECT 1");
    if !right.from_clause.is_empty() {
        subquery.push_str(" FROM ");
        subquery.push_str(&right.render_from());
    }
    if !conditions.is_empty() {
        subquery.push_str(" WHERE ");
        subquery.push_str(&conditions.join(" AND "));
    }
    left.where_conditions
        .push(format!("NOT EXISTS ({subquery})"));
    Ok(left)
}

//
// VALUES
//

fn translate_values(
    ctx: &TranslationContext<'_>,
    variables: &[Variable],
    bindings: &[Vec<Option<GroundTerm>>],
) -> Result<SqlComponents, TranslationError> {
    if variables.is_empty() {
        return Ok(SqlComponents::default());
    }
    if bindings.is_empty() {
        // VALUES with no rows contributes an empty solution multiset.
        let mut comps = SqlComponents::default();
        comps.where_conditions.push("FALSE".to_owned());
        for variable in variables {
            comps.variables.insert(
                variable.as_str().to_owned(),
                VarColumns::expression("CAST(NULL AS TEXT)".to_owned(), ValueKind::Text),
            );
        }
        return Ok(comps);
    }
    let alias = ctx.next_derived_alias("v");
    let columns: Vec<String> = (0..variables.len()).map(|i| format!("c{i}")).collect();

    let mut rows: Vec<String> = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let mut cells: Vec<String> = Vec::with_capacity(variables.len());
        for cell in binding {
            cells.push(match cell {
                Some(GroundTerm::NamedNode(node)) => quote_literal(node.as_str()),
                Some(GroundTerm::Literal(literal)) => quote_literal(literal.value()),
                None => "NULL".to_owned(),
                #[allow(unreachable_patterns)]
                Some(_) => {
                    return Err(TranslationError::unsupported(
                        "RDF-star triple term in VALUES",
                    ))
                }
            });
        }
        rows.push(format!("({})", cells.join(", ")));
    }

    let mut comps = SqlComponents {
        from_clause: format!(
            "(VALUES {}) AS {alias}({})",
            rows.join(", "),
            columns.join(", ")
        ),
        ..SqlComponents::default()
    };
    for (variable, column) in variables.iter().zip(&columns) {
        comps.variables.insert(
            variable.as_str().to_owned(),
            VarColumns::expression(format!("{alias}.{column}"), ValueKind::Text),
        );
    }
    Ok(comps)
}

//
// GROUP / aggregation
//

fn translate_group(
    ctx: &TranslationContext<'_>,
    inner: &GraphPattern,
    variables: &[Variable],
    aggregates: &[(Variable, spargebra::algebra::AggregateExpression)],
    graph: &GraphContext,
) -> Result<SqlComponents, TranslationError> {
    let inner = translate_pattern(ctx, inner, graph)?;
    let mut comps = inner.clone();

    comps.group_by.clear();
    for variable in variables {
        let mapping = inner
            .variables
            .get(variable.as_str())
            .ok_or_else(|| TranslationError::UnboundVariable(variable.as_str().to_owned()))?;
        comps.group_by.push(mapping.text.clone());
    }

    // Aggregates compile against the pre-grouping mappings.
    let mut grouped_variables: BTreeMap<String, VarColumns> = BTreeMap::new();
    for variable in variables {
        grouped_variables.insert(
            variable.as_str().to_owned(),
            inner.variables[variable.as_str()].clone(),
        );
    }
    for (variable, aggregate) in aggregates {
        let compiled = expression::compile_aggregate(ctx, &inner, aggregate, graph)?;
        grouped_variables.insert(
            variable.as_str().to_owned(),
            VarColumns::expression(compiled.sql, compiled.kind),
        );
        comps
            .aggregate_outputs
            .insert(variable.as_str().to_owned());
    }
    // After grouping only the keys and aggregate results are in scope.
    comps.variables = grouped_variables;
    Ok(comps)
}

//
// Nested SELECT
//

fn translate_nested_select(
    ctx: &TranslationContext<'_>,
    pattern: &GraphPattern,
    graph: &GraphContext,
) -> Result<SqlComponents, TranslationError> {
    let sub_ctx = ctx.subscope();
    let (inner, modifiers) = assembler::peel_modifiers(pattern);
    let comps = translate_pattern(&sub_ctx, inner, graph)?;

    let order_by = assembler::compile_order_by(&sub_ctx, &comps, &modifiers, graph)?;

    // A projected variable the pattern never binds is legal SPARQL; it
    // comes out as an always-NULL column.
    let layout = match &modifiers.projection {
        Some(projection) => projection
            .iter()
            .enumerate()
            .map(|(i, variable)| SubColumn {
                var: variable.as_str().to_owned(),
                base: format!("c{i}"),
                term_backed: comps
                    .variables
                    .get(variable.as_str())
                    .and_then(|columns| columns.term.as_ref())
                    .is_some(),
            })
            .collect(),
        None => layout_for(&comps),
    };

    let sql = render_subquery(
        &comps,
        &layout,
        modifiers.distinct,
        &order_by,
        modifiers.slice,
    );
    let alias = ctx.next_derived_alias("sq");
    Ok(derived_components(alias, sql, &layout))
}
