/// POSIX character class matching the lexical forms PostgreSQL will accept
/// in a cast to `numeric`. Used to guard numeric casts so that a non-numeric
/// lexical form becomes SQL NULL instead of a cast error, mirroring SPARQL's
/// error-as-unbound behavior in filter position.
pub const NUMERIC_LITERAL_REGEX: &str =
    "^[+-]?([0-9]+(\\.[0-9]*)?|\\.[0-9]+)([eE][+-]?[0-9]+)?$";

/// Quotes a string as a SQL literal.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' {
            quoted.push('\'');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

/// Wraps a text expression in a guarded cast to `numeric`.
pub fn numeric_guard(text_expr: &str) -> String {
    format!(
        "CASE WHEN {text_expr} ~ '{NUMERIC_LITERAL_REGEX}' THEN CAST({text_expr} AS numeric) END"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(quote_literal("plain"), "'plain'");
    }
}
