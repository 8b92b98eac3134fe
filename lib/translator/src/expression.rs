use crate::components::{SqlComponents, ValueKind};
use crate::context::{GraphContext, TranslationContext};
use crate::error::TranslationError;
use crate::patterns::translate_pattern;
use crate::sql::{numeric_guard, quote_literal};
use oxrdf::vocab::{rdf, xsd};
use spargebra::algebra::{AggregateExpression, AggregateFunction, Expression, Function};
use std::collections::BTreeSet;

/// A compiled SQL scalar expression with its rough static type.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub sql: String,
    pub kind: ValueKind,
}

impl CompiledExpr {
    fn new(sql: String, kind: ValueKind) -> Self {
        Self { sql, kind }
    }

    fn boolean(sql: String) -> Self {
        Self::new(sql, ValueKind::Boolean)
    }

    fn numeric(sql: String) -> Self {
        Self::new(sql, ValueKind::Numeric)
    }

    fn text(sql: String) -> Self {
        Self::new(sql, ValueKind::Text)
    }
}

/// Compiles a SPARQL value expression against the variable mappings in
/// scope. Any function receiving an unsuitable operand evaluates to SQL
/// NULL, which in filter position drops the row, matching SPARQL's
/// error-as-unbound behavior; `BOUND` is the only construct that observes
/// unbound state directly.
pub(crate) fn compile_expression(
    ctx: &TranslationContext<'_>,
    comps: &SqlComponents,
    expression: &Expression,
    graph: &GraphContext,
) -> Result<CompiledExpr, TranslationError> {
    match expression {
        Expression::Variable(var) => {
            let mapping = comps
                .variables
                .get(var.as_str())
                .ok_or_else(|| TranslationError::UnboundVariable(var.as_str().to_owned()))?;
            Ok(CompiledExpr::new(mapping.text.clone(), mapping.kind))
        }
        Expression::NamedNode(node) => Ok(CompiledExpr::text(quote_literal(node.as_str()))),
        Expression::Literal(literal) => Ok(compile_literal(literal)),
        Expression::Or(lhs, rhs) => {
            let lhs = compile_boolean(ctx, comps, lhs, graph)?;
            let rhs = compile_boolean(ctx, comps, rhs, graph)?;
            Ok(CompiledExpr::boolean(format!("({lhs} OR {rhs})")))
        }
        Expression::And(lhs, rhs) => {
            let lhs = compile_boolean(ctx, comps, lhs, graph)?;
            let rhs = compile_boolean(ctx, comps, rhs, graph)?;
            Ok(CompiledExpr::boolean(format!("({lhs} AND {rhs})")))
        }
        Expression::Not(inner) => {
            let inner = compile_boolean(ctx, comps, inner, graph)?;
            Ok(CompiledExpr::boolean(format!("(NOT {inner})")))
        }
        Expression::Equal(lhs, rhs) => compile_comparison(ctx, comps, "=", lhs, rhs, graph),
        Expression::SameTerm(lhs, rhs) => compile_same_term(ctx, comps, lhs, rhs, graph),
        Expression::Greater(lhs, rhs) => compile_comparison(ctx, comps, ">", lhs, rhs, graph),
        Expression::GreaterOrEqual(lhs, rhs) => {
            compile_comparison(ctx, comps, ">=", lhs, rhs, graph)
        }
        Expression::Less(lhs, rhs) => compile_comparison(ctx, comps, "<", lhs, rhs, graph),
        Expression::LessOrEqual(lhs, rhs) => compile_comparison(ctx, comps, "<=", lhs, rhs, graph),
        Expression::In(needle, haystack) => {
            let needle = compile_expression(ctx, comps, needle, graph)?;
            if haystack.is_empty() {
                return Ok(CompiledExpr::boolean("FALSE".to_owned()));
            }
            let items = haystack
                .iter()
                .map(|item| compile_expression(ctx, comps, item, graph).map(|e| e.sql))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CompiledExpr::boolean(format!(
                "({} IN ({}))",
                needle.sql,
                items.join(", ")
            )))
        }
        Expression::Add(lhs, rhs) => compile_arithmetic(ctx, comps, "+", lhs, rhs, graph),
        Expression::Subtract(lhs, rhs) => compile_arithmetic(ctx, comps, "-", lhs, rhs, graph),
        Expression::Multiply(lhs, rhs) => compile_arithmetic(ctx, comps, "*", lhs, rhs, graph),
        Expression::Divide(lhs, rhs) => compile_arithmetic(ctx, comps, "/", lhs, rhs, graph),
        Expression::UnaryPlus(inner) => {
            let inner = compile_expression(ctx, comps, inner, graph)?;
            Ok(CompiledExpr::numeric(as_numeric(&inner)))
        }
        Expression::UnaryMinus(inner) => {
            let inner = compile_expression(ctx, comps, inner, graph)?;
            Ok(CompiledExpr::numeric(format!("(- {})", as_numeric(&inner))))
        }
        Expression::Exists(pattern) => compile_exists(ctx, comps, pattern, graph),
        Expression::Bound(var) => Ok(CompiledExpr::boolean(
            match comps.variables.get(var.as_str()) {
                Some(mapping) => format!("({} IS NOT NULL)", mapping.text),
                // A variable that is nowhere in scope is never bound.
                None => "FALSE".to_owned(),
            },
        )),
        Expression::If(condition, then_branch, else_branch) => {
            let condition = compile_boolean(ctx, comps, condition, graph)?;
            let then_branch = compile_expression(ctx, comps, then_branch, graph)?;
            let else_branch = compile_expression(ctx, comps, else_branch, graph)?;
            let kind = if then_branch.kind == else_branch.kind {
                then_branch.kind
            } else {
                ValueKind::Unknown
            };
            Ok(CompiledExpr::new(
                format!(
                    "CASE WHEN {condition} THEN {} ELSE {} END",
                    then_branch.sql, else_branch.sql
                ),
                kind,
            ))
        }
        Expression::Coalesce(args) => {
            let compiled = args
                .iter()
                .map(|arg| compile_expression(ctx, comps, arg, graph).map(|e| e.sql))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CompiledExpr::new(
                format!("COALESCE({})", compiled.join(", ")),
                ValueKind::Unknown,
            ))
        }
        Expression::FunctionCall(function, args) => {
            compile_function(ctx, comps, function, args, graph)
        }
    }
}

/// Compiles an expression and coerces it to its effective boolean value.
pub(crate) fn compile_boolean(
    ctx: &TranslationContext<'_>,
    comps: &SqlComponents,
    expression: &Expression,
    graph: &GraphContext,
) -> Result<String, TranslationError> {
    let compiled = compile_expression(ctx, comps, expression, graph)?;
    Ok(as_boolean(&compiled))
}

fn as_boolean(expr: &CompiledExpr) -> String {
    match expr.kind {
        ValueKind::Boolean => expr.sql.clone(),
        ValueKind::Numeric => format!("({} <> 0)", expr.sql),
        ValueKind::Text | ValueKind::Unknown => {
            let sql = &expr.sql;
            format!("({sql} IS NOT NULL AND {sql} <> '' AND {sql} <> 'false' AND {sql} <> '0')")
        }
    }
}

fn as_numeric(expr: &CompiledExpr) -> String {
    if expr.kind == ValueKind::Numeric {
        expr.sql.clone()
    } else {
        numeric_guard(&expr.sql)
    }
}

fn compile_literal(literal: &oxrdf::Literal) -> CompiledExpr {
    let datatype = literal.datatype();
    if datatype == xsd::BOOLEAN {
        return match literal.value() {
            "true" | "1" => CompiledExpr::boolean("TRUE".to_owned()),
            _ => CompiledExpr::boolean("FALSE".to_owned()),
        };
    }
    if is_numeric_datatype(datatype) && is_numeric_lexical(literal.value()) {
        return CompiledExpr::numeric(literal.value().to_owned());
    }
    CompiledExpr::text(quote_literal(literal.value()))
}

fn is_numeric_datatype(datatype: oxrdf::NamedNodeRef<'_>) -> bool {
    datatype == xsd::INTEGER
        || datatype == xsd::DECIMAL
        || datatype == xsd::DOUBLE
        || datatype == xsd::FLOAT
        || datatype == xsd::LONG
        || datatype == xsd::INT
        || datatype == xsd::SHORT
        || datatype == xsd::BYTE
        || datatype == xsd::UNSIGNED_LONG
        || datatype == xsd::UNSIGNED_INT
        || datatype == xsd::UNSIGNED_SHORT
        || datatype == xsd::UNSIGNED_BYTE
        || datatype == xsd::NON_NEGATIVE_INTEGER
        || datatype == xsd::NON_POSITIVE_INTEGER
        || datatype == xsd::POSITIVE_INTEGER
        || datatype == xsd::NEGATIVE_INTEGER
}

/// Whether a lexical form can be spliced into SQL as a bare numeric literal.
fn is_numeric_lexical(value: &str) -> bool {
    let rest = value.strip_prefix(['+', '-']).unwrap_or(value);
    if rest.is_empty() {
        return false;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot && !seen_exp => seen_dot = true,
            'e' | 'E' if seen_digit && !seen_exp => {
                seen_exp = true;
                if matches!(chars.peek(), Some('+' | '-')) {
                    chars.next();
                }
            }
            _ => return false,
        }
    }
    seen_digit
}

fn compile_comparison(
    ctx: &TranslationContext<'_>,
    comps: &SqlComponents,
    op: &str,
    lhs: &Expression,
    rhs: &Expression,
    graph: &GraphContext,
) -> Result<CompiledExpr, TranslationError> {
    let lhs = compile_expression(ctx, comps, lhs, graph)?;
    let rhs = compile_expression(ctx, comps, rhs, graph)?;
    // SPARQL compares numeric literals in the value space regardless of
    // their lexical form: as soon as one side is known numeric, both sides
    // go through the guarded numeric cast.
    let sql = if lhs.kind == ValueKind::Numeric || rhs.kind == ValueKind::Numeric {
        format!("({} {} {})", as_numeric(&lhs), op, as_numeric(&rhs))
    } else {
        format!("({} {} {})", lhs.sql, op, rhs.sql)
    };
    Ok(CompiledExpr::boolean(sql))
}

fn compile_same_term(
    ctx: &TranslationContext<'_>,
    comps: &SqlComponents,
    lhs: &Expression,
    rhs: &Expression,
    graph: &GraphContext,
) -> Result<CompiledExpr, TranslationError> {
    let lhs_compiled = compile_expression(ctx, comps, lhs, graph)?;
    let rhs_compiled = compile_expression(ctx, comps, rhs, graph)?;
    let mut conditions = vec![format!("{} = {}", lhs_compiled.sql, rhs_compiled.sql)];
    // When both sides are term-backed the comparison extends to the kind
    // code, distinguishing a URI from a literal with the same lexical form.
    if let (Some(lhs_term), Some(rhs_term)) = (
        term_columns_of(comps, lhs),
        term_columns_of(comps, rhs),
    ) {
        conditions.push(format!("{} = {}", lhs_term.0, rhs_term.0));
    }
    Ok(CompiledExpr::boolean(format!(
        "({})",
        conditions.join(" AND ")
    )))
}

/// The (kind, lang, datatype_uuid) companion expressions of a variable
/// reference, when available.
fn term_columns_of<'a>(
    comps: &'a SqlComponents,
    expression: &Expression,
) -> Option<(&'a str, &'a str, &'a str)> {
    if let Expression::Variable(var) = expression {
        let term = comps.variables.get(var.as_str())?.term.as_ref()?;
        Some((&term.kind, &term.lang, &term.datatype_uuid))
    } else {
        None
    }
}

fn compile_arithmetic(
    ctx: &TranslationContext<'_>,
    comps: &SqlComponents,
    op: &str,
    lhs: &Expression,
    rhs: &Expression,
    graph: &GraphContext,
) -> Result<CompiledExpr, TranslationError> {
    let lhs = compile_expression(ctx, comps, lhs, graph)?;
    let rhs = compile_expression(ctx, comps, rhs, graph)?;
    Ok(CompiledExpr::numeric(format!(
        "({} {} {})",
        as_numeric(&lhs),
        op,
        as_numeric(&rhs)
    )))
}

fn compile_exists(
    ctx: &TranslationContext<'_>,
    comps: &SqlComponents,
    pattern: &spargebra::algebra::GraphPattern,
    graph: &GraphContext,
) -> Result<CompiledExpr, TranslationError> {
    let sub_ctx = ctx.subscope();
    let sub = translate_pattern(&sub_ctx, pattern, graph)?;
    let sub = crate::patterns::wrap_grouped(&sub_ctx, sub);
    // Correlated on the variables shared with the enclosing scope; the
    // subscope's aliases never shadow the outer ones, so the outer
    // expressions stay valid inside the subquery.
    let mut conditions = sub.where_conditions.clone();
    for name in sub.shared_variables(comps) {
        conditions.push(format!(
            "{} = {}",
            sub.variables[&name].text, comps.variables[&name].text
        ));
    }
    let mut subquery = String::from("SELECT 1");
    if !sub.from_clause.is_empty() {
        subquery.push_str(" FROM ");
        subquery.push_str(&sub.render_from());
    }
    if !conditions.is_empty() {
        subquery.push_str(" WHERE ");
        subquery.push_str(&conditions.join(" AND "));
    }
    Ok(CompiledExpr::boolean(format!("EXISTS ({subquery})")))
}

fn compile_function(
    ctx: &TranslationContext<'_>,
    comps: &SqlComponents,
    function: &Function,
    args: &[Expression],
    graph: &GraphContext,
) -> Result<CompiledExpr, TranslationError> {
    let ast_arg = |index: usize| -> Result<&Expression, TranslationError> {
        args.get(index).ok_or_else(|| {
            TranslationError::internal(format!("{function} is missing argument {index}"))
        })
    };
    let compile_arg =
        |index: usize| -> Result<CompiledExpr, TranslationError> {
            compile_expression(ctx, comps, ast_arg(index)?, graph)
        };

    match function {
        Function::Str => {
            // The lexical form is exactly what the mapping projects.
            let arg = compile_arg(0)?;
            Ok(CompiledExpr::text(cast_to_text(&arg)))
        }
        Function::Lang => {
            let lang = term_columns_of(comps, ast_arg(0)?).map(|(_, lang, _)| lang.to_owned());
            Ok(CompiledExpr::text(match lang {
                Some(lang) => format!("COALESCE({lang}, '')"),
                None => "''".to_owned(),
            }))
        }
        Function::LangMatches => {
            let lang = compile_arg(0)?;
            let range = compile_arg(1)?;
            let sql = if range.sql == "'*'" {
                format!("({} <> '')", lang.sql)
            } else {
                format!(
                    "(lower({lang}) = lower({range}) OR lower({lang}) LIKE lower({range}) || '-%')",
                    lang = lang.sql,
                    range = range.sql
                )
            };
            Ok(CompiledExpr::boolean(sql))
        }
        Function::Datatype => {
            let Some((kind, lang, datatype_uuid)) = term_columns_of(comps, ast_arg(0)?) else {
                return Err(TranslationError::unsupported(
                    "DATATYPE over a computed value",
                ));
            };
            let sql = format!(
                "CASE WHEN {kind} = 'L' THEN COALESCE(\
                 (SELECT dt.term_text FROM {term} dt WHERE dt.term_uuid = {datatype_uuid}), \
                 CASE WHEN {lang} IS NOT NULL THEN {lang_string} ELSE {string} END) END",
                term = ctx.term_table(),
                lang_string = quote_literal(rdf::LANG_STRING.as_str()),
                string = quote_literal(xsd::STRING.as_str()),
            );
            Ok(CompiledExpr::text(sql))
        }
        Function::Iri => {
            let arg = compile_arg(0)?;
            Ok(CompiledExpr::text(cast_to_text(&arg)))
        }
        Function::IsIri => compile_kind_test(comps, ast_arg(0)?, 'U'),
        Function::IsBlank => compile_kind_test(comps, ast_arg(0)?, 'B'),
        Function::IsLiteral => compile_kind_test(comps, ast_arg(0)?, 'L'),
        Function::IsNumeric => {
            let arg = compile_arg(0)?;
            Ok(CompiledExpr::boolean(format!(
                "({} ~ '{}')",
                arg.sql,
                crate::sql::NUMERIC_LITERAL_REGEX
            )))
        }
        Function::Rand => Ok(CompiledExpr::numeric("random()".to_owned())),
        Function::Abs => numeric_function(compile_arg(0)?, "abs"),
        Function::Ceil => numeric_function(compile_arg(0)?, "ceil"),
        Function::Floor => numeric_function(compile_arg(0)?, "floor"),
        Function::Round => numeric_function(compile_arg(0)?, "round"),
        Function::Concat => {
            let parts = args
                .iter()
                .map(|arg| {
                    compile_expression(ctx, comps, arg, graph).map(|e| cast_to_text(&e))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CompiledExpr::text(format!("({})", parts.join(" || "))))
        }
        Function::SubStr => {
            let source = compile_arg(0)?;
            let start = compile_arg(1)?;
            let sql = if args.len() > 2 {
                let length = compile_arg(2)?;
                format!(
                    "SUBSTRING({} FROM CAST({} AS integer) FOR CAST({} AS integer))",
                    source.sql,
                    as_numeric(&start),
                    as_numeric(&length)
                )
            } else {
                format!(
                    "SUBSTRING({} FROM CAST({} AS integer))",
                    source.sql,
                    as_numeric(&start)
                )
            };
            Ok(CompiledExpr::text(sql))
        }
        Function::StrLen => {
            let arg = compile_arg(0)?;
            Ok(CompiledExpr::numeric(format!("LENGTH({})", arg.sql)))
        }
        Function::UCase => {
            let arg = compile_arg(0)?;
            Ok(CompiledExpr::text(format!("UPPER({})", arg.sql)))
        }
        Function::LCase => {
            let arg = compile_arg(0)?;
            Ok(CompiledExpr::text(format!("LOWER({})", arg.sql)))
        }
        Function::Contains => {
            let haystack = compile_arg(0)?;
            let needle = compile_arg(1)?;
            // A constant needle compiles to LIKE so the trigram index stays
            // usable; a computed needle falls back to POSITION.
            let sql = if let Expression::Literal(literal) = ast_arg(1)? {
                format!(
                    "({} LIKE {})",
                    haystack.sql,
                    quote_literal(&format!("%{}%", escape_like(literal.value())))
                )
            } else {
                format!("(POSITION({} IN {}) > 0)", needle.sql, haystack.sql)
            };
            Ok(CompiledExpr::boolean(sql))
        }
        Function::StrStarts => {
            let haystack = compile_arg(0)?;
            let needle = compile_arg(1)?;
            Ok(CompiledExpr::boolean(format!(
                "(LEFT({hay}, LENGTH({needle})) = {needle})",
                hay = haystack.sql,
                needle = needle.sql
            )))
        }
        Function::StrEnds => {
            let haystack = compile_arg(0)?;
            let needle = compile_arg(1)?;
            Ok(CompiledExpr::boolean(format!(
                "(RIGHT({hay}, LENGTH({needle})) = {needle})",
                hay = haystack.sql,
                needle = needle.sql
            )))
        }
        Function::StrBefore => {
            let haystack = compile_arg(0)?;
            let needle = compile_arg(1)?;
            Ok(CompiledExpr::text(format!(
                "CASE WHEN POSITION({needle} IN {hay}) > 0 \
                 THEN LEFT({hay}, POSITION({needle} IN {hay}) - 1) ELSE '' END",
                hay = haystack.sql,
                needle = needle.sql
            )))
        }
        Function::StrAfter => {
            let haystack = compile_arg(0)?;
            let needle = compile_arg(1)?;
            Ok(CompiledExpr::text(format!(
                "CASE WHEN POSITION({needle} IN {hay}) > 0 \
                 THEN SUBSTRING({hay} FROM POSITION({needle} IN {hay}) + LENGTH({needle})) \
                 ELSE '' END",
                hay = haystack.sql,
                needle = needle.sql
            )))
        }
        Function::Replace => {
            let source = compile_arg(0)?;
            let pattern = compile_arg(1)?;
            let replacement = compile_arg(2)?;
            let flags = regex_flags(args.get(3))?;
            Ok(CompiledExpr::text(format!(
                "REGEXP_REPLACE({}, {}, {}, {})",
                source.sql,
                pattern.sql,
                replacement.sql,
                quote_literal(&format!("g{flags}"))
            )))
        }
        Function::Regex => compile_regex(ctx, comps, args, graph),
        Function::EncodeForUri => {
            let arg = compile_arg(0)?;
            Ok(CompiledExpr::text(encode_for_uri_sql(&arg.sql)))
        }
        Function::Md5 => {
            let arg = compile_arg(0)?;
            Ok(CompiledExpr::text(format!("md5({})", arg.sql)))
        }
        Function::Sha1 => digest_function(compile_arg(0)?, "sha1"),
        Function::Sha256 => digest_function(compile_arg(0)?, "sha256"),
        Function::Sha384 => digest_function(compile_arg(0)?, "sha384"),
        Function::Sha512 => digest_function(compile_arg(0)?, "sha512"),
        Function::Uuid => Ok(CompiledExpr::text(
            "('urn:uuid:' || gen_random_uuid()::text)".to_owned(),
        )),
        Function::StrUuid => Ok(CompiledExpr::text("gen_random_uuid()::text".to_owned())),
        _ => Err(TranslationError::UnsupportedFunction(function.to_string())),
    }
}

fn cast_to_text(expr: &CompiledExpr) -> String {
    if expr.kind == ValueKind::Text {
        expr.sql.clone()
    } else {
        format!("CAST({} AS TEXT)", expr.sql)
    }
}

fn numeric_function(arg: CompiledExpr, name: &str) -> Result<CompiledExpr, TranslationError> {
    Ok(CompiledExpr::numeric(format!(
        "{name}({})",
        as_numeric(&arg)
    )))
}

fn digest_function(arg: CompiledExpr, algorithm: &str) -> Result<CompiledExpr, TranslationError> {
    // Requires the pgcrypto extension, installed with the space schema.
    Ok(CompiledExpr::text(format!(
        "encode(digest({}, '{algorithm}'), 'hex')",
        arg.sql
    )))
}

fn compile_kind_test(
    comps: &SqlComponents,
    arg: &Expression,
    code: char,
) -> Result<CompiledExpr, TranslationError> {
    match term_columns_of(comps, arg) {
        Some((kind, _, _)) => Ok(CompiledExpr::boolean(format!("({kind} = '{code}')"))),
        // Computed values carry no term kind; a URI-shaped heuristic covers
        // the IRI test and its complement covers literals.
        None => match (arg, code) {
            (Expression::NamedNode(_), 'U') => Ok(CompiledExpr::boolean("TRUE".to_owned())),
            (Expression::NamedNode(_), _) => Ok(CompiledExpr::boolean("FALSE".to_owned())),
            (Expression::Literal(_), 'L') => Ok(CompiledExpr::boolean("TRUE".to_owned())),
            (Expression::Literal(_), _) => Ok(CompiledExpr::boolean("FALSE".to_owned())),
            _ => Err(TranslationError::unsupported(
                "term-kind test over a computed value",
            )),
        },
    }
}

fn compile_regex(
    ctx: &TranslationContext<'_>,
    comps: &SqlComponents,
    args: &[Expression],
    graph: &GraphContext,
) -> Result<CompiledExpr, TranslationError> {
    let text = compile_expression(ctx, comps, &args[0], graph)?;
    let flags = regex_flags(args.get(2))?;
    let case_insensitive = flags.contains('i');
    let operator = if case_insensitive { "~*" } else { "~" };
    let embedded: String = flags.chars().filter(|c| *c != 'i').collect();

    // A constant pattern is emitted as a single literal so patterns with a
    // literal prefix remain visible to the trigram index.
    let pattern_sql = if let Expression::Literal(literal) = &args[1] {
        let mut pattern = literal.value().to_owned();
        if !embedded.is_empty() {
            pattern = format!("(?{embedded}){pattern}");
        }
        quote_literal(&pattern)
    } else {
        let pattern = compile_expression(ctx, comps, &args[1], graph)?;
        if embedded.is_empty() {
            pattern.sql
        } else {
            format!("({} || {})", quote_literal(&format!("(?{embedded})")), pattern.sql)
        }
    };
    Ok(CompiledExpr::boolean(format!(
        "({} {operator} {pattern_sql})",
        text.sql
    )))
}

/// Extracts the constant flags argument of REGEX / REPLACE, keeping only the
/// flag letters PostgreSQL's regex engine understands.
fn regex_flags(arg: Option<&Expression>) -> Result<String, TranslationError> {
    match arg {
        None => Ok(String::new()),
        Some(Expression::Literal(literal)) => Ok(literal
            .value()
            .chars()
            .filter(|c| matches!(c, 'i' | 's' | 'm' | 'x'))
            .collect()),
        Some(_) => Err(TranslationError::unsupported(
            "non-constant REGEX flags argument",
        )),
    }
}

/// Percent-encodes the RFC 3986 reserved set through nested REPLACE calls;
/// '%' must be rewritten first so already-encoded input is not re-escaped.
fn encode_for_uri_sql(expr: &str) -> String {
    const REPLACEMENTS: &[(&str, &str)] = &[
        ("%", "%25"),
        (" ", "%20"),
        ("\"", "%22"),
        ("#", "%23"),
        ("$", "%24"),
        ("&", "%26"),
        ("'", "%27"),
        ("(", "%28"),
        (")", "%29"),
        ("*", "%2A"),
        ("+", "%2B"),
        (",", "%2C"),
        ("/", "%2F"),
        (":", "%3A"),
        (";", "%3B"),
        ("<", "%3C"),
        ("=", "%3D"),
        (">", "%3E"),
        ("?", "%3F"),
        ("@", "%40"),
        ("[", "%5B"),
        ("]", "%5D"),
    ];
    let mut sql = expr.to_owned();
    for (from, to) in REPLACEMENTS {
        sql = format!(
            "REPLACE({sql}, {}, {})",
            quote_literal(from),
            quote_literal(to)
        );
    }
    sql
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Compiles an aggregate expression; only valid inside a Group context.
pub(crate) fn compile_aggregate(
    ctx: &TranslationContext<'_>,
    comps: &SqlComponents,
    aggregate: &AggregateExpression,
    graph: &GraphContext,
) -> Result<CompiledExpr, TranslationError> {
    match aggregate {
        AggregateExpression::CountSolutions { distinct } => {
            if !*distinct {
                return Ok(CompiledExpr::numeric("COUNT(*)".to_owned()));
            }
            let columns: Vec<String> = comps
                .visible_variables()
                .filter_map(|name| comps.variables.get(name).map(|m| m.text.clone()))
                .collect();
            let sql = match columns.len() {
                0 => "COUNT(*)".to_owned(),
                1 => format!("COUNT(DISTINCT {})", columns[0]),
                _ => format!("COUNT(DISTINCT ({}))", columns.join(", ")),
            };
            Ok(CompiledExpr::numeric(sql))
        }
        AggregateExpression::FunctionCall {
            name,
            expr,
            distinct,
        } => {
            let arg = compile_expression(ctx, comps, expr, graph)?;
            let distinct_prefix = if *distinct { "DISTINCT " } else { "" };
            match name {
                AggregateFunction::Count => Ok(CompiledExpr::numeric(format!(
                    "COUNT({distinct_prefix}{})",
                    arg.sql
                ))),
                AggregateFunction::Sum => Ok(CompiledExpr::numeric(format!(
                    "SUM({distinct_prefix}{})",
                    as_numeric(&arg)
                ))),
                AggregateFunction::Avg => Ok(CompiledExpr::numeric(format!(
                    "AVG({distinct_prefix}{})",
                    as_numeric(&arg)
                ))),
                AggregateFunction::Min => Ok(CompiledExpr::new(
                    format!("MIN({})", arg.sql),
                    arg.kind,
                )),
                AggregateFunction::Max => Ok(CompiledExpr::new(
                    format!("MAX({})", arg.sql),
                    arg.kind,
                )),
                // PostgreSQL has no SAMPLE; MIN is a valid deterministic one.
                AggregateFunction::Sample => Ok(CompiledExpr::new(
                    format!("MIN({})", arg.sql),
                    arg.kind,
                )),
                AggregateFunction::GroupConcat { separator } => {
                    let separator = separator.as_deref().unwrap_or(" ");
                    Ok(CompiledExpr::text(format!(
                        "STRING_AGG({distinct_prefix}{}, {})",
                        cast_to_text(&arg),
                        quote_literal(separator)
                    )))
                }
                AggregateFunction::Custom(name) => Err(TranslationError::UnsupportedFunction(
                    name.as_str().to_owned(),
                )),
            }
        }
    }
}

/// Collects the variables an expression references, used to route filters
/// between WHERE and HAVING. EXISTS subpatterns are deliberately skipped:
/// their variables live in their own scope.
pub(crate) fn expression_variables(expression: &Expression) -> BTreeSet<String> {
    fn walk(expression: &Expression, into: &mut BTreeSet<String>) {
        match expression {
            Expression::Variable(var) | Expression::Bound(var) => {
                into.insert(var.as_str().to_owned());
            }
            Expression::Or(a, b)
            | Expression::And(a, b)
            | Expression::Equal(a, b)
            | Expression::SameTerm(a, b)
            | Expression::Greater(a, b)
            | Expression::GreaterOrEqual(a, b)
            | Expression::Less(a, b)
            | Expression::LessOrEqual(a, b)
            | Expression::Add(a, b)
            | Expression::Subtract(a, b)
            | Expression::Multiply(a, b)
            | Expression::Divide(a, b) => {
                walk(a, into);
                walk(b, into);
            }
            Expression::In(a, items) => {
                walk(a, into);
                for item in items {
                    walk(item, into);
                }
            }
            Expression::UnaryPlus(a) | Expression::UnaryMinus(a) | Expression::Not(a) => {
                walk(a, into);
            }
            Expression::If(a, b, c) => {
                walk(a, into);
                walk(b, into);
                walk(c, into);
            }
            Expression::Coalesce(items) => {
                for item in items {
                    walk(item, into);
                }
            }
            Expression::FunctionCall(_, args) => {
                for arg in args {
                    walk(arg, into);
                }
            }
            Expression::Exists(_)
            | Expression::NamedNode(_)
            | Expression::Literal(_) => {}
        }
    }
    let mut variables = BTreeSet::new();
    walk(expression, &mut variables);
    variables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_lexical_forms() {
        for valid in ["1", "-2", "+3.5", ".5", "10.", "1e9", "2.5E-3"] {
            assert!(is_numeric_lexical(valid), "{valid}");
        }
        for invalid in ["", "-", "1e", "abc", "1.2.3", "1; DROP TABLE x"] {
            assert!(!is_numeric_lexical(invalid), "{invalid}");
        }
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("50%_done"), "50\\%\\_done");
    }
}
