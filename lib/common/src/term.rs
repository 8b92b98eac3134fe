use crate::error::CorruptionError;
use crate::GLOBAL_GRAPH_IRI;
use oxrdf::vocab::xsd;
use oxrdf::{BlankNode, GraphName, GraphNameRef, Literal, NamedNode, Term, TermRef};
use uuid::Uuid;

/// Namespace used for deriving term UUIDs.
///
/// The value is fixed forever: changing it would silently re-key every term
/// in every deployed space.
pub const TERM_UUID_NAMESPACE: Uuid = Uuid::from_u128(0x6ba7_b810_9dad_11d1_80b4_00c0_4fd4_30c8);

/// The storage-level classification of a term, persisted as a one-character
/// code in the `term_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermKind {
    Uri,
    Literal,
    BlankNode,
    Graph,
}

impl TermKind {
    /// The single-character code stored in the `term_type` column.
    #[inline]
    pub fn code(self) -> char {
        match self {
            TermKind::Uri => 'U',
            TermKind::Literal => 'L',
            TermKind::BlankNode => 'B',
            TermKind::Graph => 'G',
        }
    }

    /// Decodes a `term_type` column value as read from SQL.
    pub fn from_sql(code: &str) -> Result<Self, CorruptionError> {
        let mut chars = code.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_code(c),
            _ => Err(CorruptionError::msg(format!(
                "Invalid term_type value '{code}'"
            ))),
        }
    }

    /// Decodes a `term_type` column value.
    pub fn from_code(code: char) -> Result<Self, CorruptionError> {
        match code {
            'U' => Ok(TermKind::Uri),
            'L' => Ok(TermKind::Literal),
            'B' => Ok(TermKind::BlankNode),
            'G' => Ok(TermKind::Graph),
            _ => Err(CorruptionError::msg(format!(
                "Unknown term_type code '{code}'"
            ))),
        }
    }
}

/// Computes the deterministic UUID of a term.
///
/// The derivation is a pure function of the lexical form, the kind code, the
/// language tag and the datatype term's UUID. Every node computing the UUID
/// of the same term arrives at the same value, which is what makes bulk
/// ingest coordination-free.
pub fn term_uuid(
    text: &str,
    kind: TermKind,
    lang: Option<&str>,
    datatype_uuid: Option<Uuid>,
) -> Uuid {
    let datatype_part = match datatype_uuid {
        Some(uuid) => uuid.to_string(),
        None => "0".to_owned(),
    };
    let composite = format!(
        "{}|{}|{}|{}",
        text,
        kind.code(),
        lang.unwrap_or(""),
        datatype_part
    );
    Uuid::new_v5(&TERM_UUID_NAMESPACE, composite.as_bytes())
}

/// A term as the storage layer sees it: lexical form, kind, and the literal
/// annotations. This is the value interned into the term dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TermValue {
    pub text: String,
    pub kind: TermKind,
    pub lang: Option<String>,
    /// IRI of the datatype for typed literals. Simple and language-tagged
    /// literals leave this unset.
    pub datatype: Option<String>,
}

impl TermValue {
    /// A URI term.
    pub fn uri(iri: impl Into<String>) -> Self {
        Self {
            text: iri.into(),
            kind: TermKind::Uri,
            lang: None,
            datatype: None,
        }
    }

    /// A simple literal without language or datatype.
    pub fn simple_literal(value: impl Into<String>) -> Self {
        Self {
            text: value.into(),
            kind: TermKind::Literal,
            lang: None,
            datatype: None,
        }
    }

    /// The UUID of the datatype term, if the literal is typed.
    pub fn datatype_uuid(&self) -> Option<Uuid> {
        self.datatype
            .as_deref()
            .map(|iri| term_uuid(iri, TermKind::Uri, None, None))
    }

    /// The deterministic UUID of this term.
    pub fn uuid(&self) -> Uuid {
        term_uuid(
            &self.text,
            self.kind,
            self.lang.as_deref(),
            self.datatype_uuid(),
        )
    }

    /// Converts an RDF term into its stored form.
    pub fn from_term(term: TermRef<'_>) -> Result<Self, CorruptionError> {
        match term {
            TermRef::NamedNode(node) => Ok(Self::uri(node.as_str())),
            TermRef::BlankNode(node) => Ok(Self {
                text: node.as_str().to_owned(),
                kind: TermKind::BlankNode,
                lang: None,
                datatype: None,
            }),
            TermRef::Literal(literal) => {
                if let Some(lang) = literal.language() {
                    Ok(Self {
                        text: literal.value().to_owned(),
                        kind: TermKind::Literal,
                        lang: Some(lang.to_owned()),
                        datatype: None,
                    })
                } else {
                    let datatype = literal.datatype();
                    Ok(Self {
                        text: literal.value().to_owned(),
                        kind: TermKind::Literal,
                        lang: None,
                        datatype: (datatype != xsd::STRING)
                            .then(|| datatype.as_str().to_owned()),
                    })
                }
            }
            _ => Err(CorruptionError::msg(
                "Triple terms are not representable in the term dictionary",
            )),
        }
    }

    /// Converts a graph name into its stored form. The default graph maps to
    /// the reserved global graph IRI.
    pub fn from_graph_name(graph_name: GraphNameRef<'_>) -> Self {
        match graph_name {
            GraphNameRef::NamedNode(node) => Self::uri(node.as_str()),
            GraphNameRef::BlankNode(node) => Self {
                text: node.as_str().to_owned(),
                kind: TermKind::BlankNode,
                lang: None,
                datatype: None,
            },
            GraphNameRef::DefaultGraph => Self::uri(GLOBAL_GRAPH_IRI),
        }
    }

    /// Reassembles the RDF term from its stored form.
    pub fn to_term(&self) -> Result<Term, CorruptionError> {
        match self.kind {
            TermKind::Uri | TermKind::Graph => NamedNode::new(&self.text)
                .map(Term::from)
                .map_err(CorruptionError::new),
            TermKind::BlankNode => BlankNode::new(&self.text)
                .map(Term::from)
                .map_err(CorruptionError::new),
            TermKind::Literal => {
                if let Some(lang) = &self.lang {
                    Literal::new_language_tagged_literal(&self.text, lang)
                        .map(Term::from)
                        .map_err(CorruptionError::new)
                } else if let Some(datatype) = &self.datatype {
                    let datatype = NamedNode::new(datatype).map_err(CorruptionError::new)?;
                    Ok(Literal::new_typed_literal(&self.text, datatype).into())
                } else {
                    Ok(Literal::new_simple_literal(&self.text).into())
                }
            }
        }
    }

    /// Reassembles the stored form as a graph name. The reserved global
    /// graph IRI maps back to the default graph.
    pub fn to_graph_name(&self) -> Result<GraphName, CorruptionError> {
        if self.text == GLOBAL_GRAPH_IRI {
            return Ok(GraphName::DefaultGraph);
        }
        match self.kind {
            TermKind::Uri | TermKind::Graph => NamedNode::new(&self.text)
                .map(GraphName::from)
                .map_err(CorruptionError::new),
            TermKind::BlankNode => BlankNode::new(&self.text)
                .map(GraphName::from)
                .map_err(CorruptionError::new),
            TermKind::Literal => Err(CorruptionError::msg(
                "A literal cannot be used as a graph name",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::LiteralRef;

    #[test]
    fn uuid_is_deterministic() {
        let a = term_uuid("http://example.com/a", TermKind::Uri, None, None);
        let b = term_uuid("http://example.com/a", TermKind::Uri, None, None);
        assert_eq!(a, b);
    }

    #[test]
    fn uuid_depends_on_every_component() {
        let base = term_uuid("v", TermKind::Literal, None, None);
        assert_ne!(base, term_uuid("v", TermKind::Uri, None, None));
        assert_ne!(base, term_uuid("v", TermKind::Literal, Some("en"), None));
        let dt = term_uuid(xsd::INTEGER.as_str(), TermKind::Uri, None, None);
        assert_ne!(base, term_uuid("v", TermKind::Literal, None, Some(dt)));
    }

    #[test]
    fn simple_and_string_typed_literals_collapse() {
        let simple = TermValue::from_term(LiteralRef::new_simple_literal("x").into()).unwrap();
        let typed =
            TermValue::from_term(LiteralRef::new_typed_literal("x", xsd::STRING).into()).unwrap();
        assert_eq!(simple.uuid(), typed.uuid());
    }

    #[test]
    fn default_graph_maps_to_global_iri() {
        let graph = TermValue::from_graph_name(GraphNameRef::DefaultGraph);
        assert_eq!(graph.text, GLOBAL_GRAPH_IRI);
        assert_eq!(graph.to_graph_name().unwrap(), GraphName::DefaultGraph);
    }

    #[test]
    fn literal_round_trip() {
        let value = TermValue {
            text: "bonjour".to_owned(),
            kind: TermKind::Literal,
            lang: Some("fr".to_owned()),
            datatype: None,
        };
        let term = value.to_term().unwrap();
        assert_eq!(TermValue::from_term(term.as_ref()).unwrap(), value);
    }
}
