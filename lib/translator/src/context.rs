use spargres_common::{SpaceTables, TermValue};
use std::cell::Cell;
use std::rc::Rc;
use uuid::Uuid;

/// Alias generation and table lookup for one translation.
///
/// All scopes of a translation share one monotonic generator, so every
/// quad/term alias and every derived-relation alias is unique across the
/// whole statement. Subqueries therefore cannot leak aliases into the
/// enclosing scope, cannot borrow any, and, crucially, cannot shadow an
/// outer alias: a correlated subquery (MINUS, EXISTS) that references an
/// outer alias by name always resolves to the outer relation.
pub struct TranslationContext<'a> {
    tables: &'a SpaceTables,
    quad_counter: Rc<Cell<usize>>,
    derived_counter: Rc<Cell<usize>>,
}

impl<'a> TranslationContext<'a> {
    pub fn new(tables: &'a SpaceTables) -> Self {
        Self {
            tables,
            quad_counter: Rc::new(Cell::new(0)),
            derived_counter: Rc::new(Cell::new(0)),
        }
    }

    /// A scope for compiling a self-contained subquery. It continues the
    /// parent's alias numbering instead of restarting it.
    pub fn subscope(&self) -> TranslationContext<'a> {
        TranslationContext {
            tables: self.tables,
            quad_counter: Rc::clone(&self.quad_counter),
            derived_counter: Rc::clone(&self.derived_counter),
        }
    }

    pub fn quad_table(&self) -> &str {
        self.tables.rdf_quad()
    }

    pub fn term_table(&self) -> &str {
        self.tables.term()
    }

    pub fn tables(&self) -> &'a SpaceTables {
        self.tables
    }

    /// Allocates the next quad-table alias (`q0`, `q1`, ...). The term
    /// aliases of that triple reuse the index (`s_0`, `p_0`, `o_0`, `c_0`).
    pub fn next_quad_index(&self) -> usize {
        let index = self.quad_counter.get();
        self.quad_counter.set(index + 1);
        index
    }

    /// Allocates an alias for a derived relation (`opt0`, `u1`, `sq2`, ...).
    pub fn next_derived_alias(&self, prefix: &str) -> String {
        let index = self.derived_counter.get();
        self.derived_counter.set(index + 1);
        format!("{prefix}{index}")
    }
}

/// The graph constraint in force while translating a pattern.
#[derive(Debug, Clone)]
pub enum GraphContext {
    /// No enclosing GRAPH clause: the default graph is the union over all
    /// contexts, so the context position stays unconstrained.
    Default,
    /// `GRAPH <uri> { ... }`: every enclosed quad is pinned to one context.
    Named(Uuid),
    /// `GRAPH ?var { ... }`: the context is bound to a variable shared by
    /// every enclosed quad.
    Variable(String),
}

impl GraphContext {
    pub fn named(iri: &str) -> Self {
        Self::Named(TermValue::uri(iri).uuid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscopes_continue_the_parent_numbering() {
        let tables = SpaceTables::new("vg", "s1").unwrap();
        let ctx = TranslationContext::new(&tables);
        assert_eq!(ctx.next_quad_index(), 0);

        let sub = ctx.subscope();
        // The subquery's aliases can never shadow the enclosing scope's.
        assert_eq!(sub.next_quad_index(), 1);
        assert_eq!(ctx.next_quad_index(), 2);

        assert_eq!(ctx.next_derived_alias("u"), "u0");
        assert_eq!(sub.next_derived_alias("opt"), "opt1");
    }
}
