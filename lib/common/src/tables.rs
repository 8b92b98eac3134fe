use crate::error::CorruptionError;

/// The per-space table names.
///
/// Every space owns four tables named `<prefix>__<space_id>__<base>`. Both
/// identifier pieces are validated so the composed names can be spliced into
/// SQL without quoting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceTables {
    prefix: String,
    space_id: String,
    term: String,
    rdf_quad: String,
    namespace: String,
    graph: String,
}

impl SpaceTables {
    pub fn new(prefix: &str, space_id: &str) -> Result<Self, CorruptionError> {
        validate_table_prefix(prefix)?;
        validate_space_id(space_id)?;
        Ok(Self {
            prefix: prefix.to_owned(),
            space_id: space_id.to_owned(),
            term: compose(prefix, space_id, "term"),
            rdf_quad: compose(prefix, space_id, "rdf_quad"),
            namespace: compose(prefix, space_id, "namespace"),
            graph: compose(prefix, space_id, "graph"),
        })
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Name of the term dictionary table.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Name of the quad table.
    pub fn rdf_quad(&self) -> &str {
        &self.rdf_quad
    }

    /// Name of the namespace-prefix table.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name of the named-graph registry table.
    pub fn graph(&self) -> &str {
        &self.graph
    }

    /// Prefix used for index names, kept distinct from table names so index
    /// identifiers stay below PostgreSQL's length limit longer.
    pub fn index_prefix(&self) -> String {
        format!("{}_{}", self.prefix, self.space_id)
    }
}

fn compose(prefix: &str, space_id: &str, base: &str) -> String {
    format!("{prefix}__{space_id}__{base}")
}

/// Validates a deployment-wide table prefix: alphanumeric and underscore
/// only, no leading digit.
pub fn validate_table_prefix(prefix: &str) -> Result<(), CorruptionError> {
    validate_identifier(prefix)
        .then_some(())
        .ok_or_else(|| CorruptionError::msg(format!("Invalid table prefix '{prefix}'")))
}

/// Validates a space identifier with the same rules as the table prefix.
pub fn validate_space_id(space_id: &str) -> Result<(), CorruptionError> {
    validate_identifier(space_id)
        .then_some(())
        .ok_or_else(|| CorruptionError::msg(format!("Invalid space id '{space_id}'")))
}

fn validate_identifier(identifier: &str) -> bool {
    let mut chars = identifier.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_table_names() {
        let tables = SpaceTables::new("vg", "space1").unwrap();
        assert_eq!(tables.term(), "vg__space1__term");
        assert_eq!(tables.rdf_quad(), "vg__space1__rdf_quad");
        assert_eq!(tables.namespace(), "vg__space1__namespace");
        assert_eq!(tables.graph(), "vg__space1__graph");
    }

    #[test]
    fn rejects_hostile_identifiers() {
        assert!(SpaceTables::new("vg", "1space").is_err());
        assert!(SpaceTables::new("vg", "space; DROP TABLE x").is_err());
        assert!(SpaceTables::new("", "space").is_err());
        assert!(SpaceTables::new("vg", "space-1").is_err());
    }
}
