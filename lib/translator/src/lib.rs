//! SPARQL-to-SQL translation.
//!
//! This crate compiles a parsed SPARQL algebra tree into a single SQL
//! statement over the quad/term schema. Translation is pure: it never talks
//! to the database, it only needs the table names of the target space. The
//! recursive pattern walk produces [`SqlComponents`] fragments; the
//! [`assembler`] turns the root fragment into the final statement for the
//! query form at hand, and [`update`] lowers SPARQL UPDATE operations into
//! ordered batch steps.

pub mod assembler;
mod components;
mod context;
mod error;
mod expression;
mod patterns;
mod sql;
pub mod update;

pub use assembler::{
    compile_query, BindingsQuery, CompiledQuery, ConstructSlice, QueryForm, SelectColumn,
};
pub use components::{SqlComponents, TermColumns, ValueKind, VarColumns};
pub use context::{GraphContext, TranslationContext};
pub use error::TranslationError;
pub use expression::CompiledExpr;
pub use sql::{quote_literal, NUMERIC_LITERAL_REGEX};
pub use update::{compile_update, ClearTarget, UpdatePlan, UpdateStep};
