/// An error raised while compiling a SPARQL algebra tree into SQL.
///
/// The compiler never emits SQL it cannot stand behind: an algebra construct
/// outside the supported fragment, or an internal inconsistency such as an
/// unmapped variable, surfaces as an error naming the offender.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TranslationError {
    /// The algebra contains a construct the compiler does not support.
    #[error("Unsupported SPARQL construct: {0}")]
    Unsupported(String),
    /// A SPARQL function outside the supported set.
    #[error("Unsupported SPARQL function: {0}")]
    UnsupportedFunction(String),
    /// An expression references a variable with no SQL mapping in scope.
    #[error("Variable ?{0} is not bound in this scope")]
    UnboundVariable(String),
    /// An internal invariant was violated; indicates a compiler bug.
    #[error("SPARQL translation invariant violated: {0}")]
    Internal(String),
    /// The space identifier or table prefix is not usable.
    #[error(transparent)]
    InvalidIdentifier(#[from] spargres_common::error::CorruptionError),
}

impl TranslationError {
    pub fn unsupported(construct: impl Into<String>) -> Self {
        Self::Unsupported(construct.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
