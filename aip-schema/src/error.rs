/// Schema-level misdeclarations.
///
/// These are construction-time failures: a parser built over a bad schema
/// should abort process startup, never surface to a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// An allowed/ordering/update path names no declared field.
    UnknownPath(String),

    /// The `"*"` pattern was combined with other patterns.
    WildcardNotAlone,

    /// Two fields at the same level share a name.
    DuplicateField(String),

    /// A `prefix.*` pattern points at a non-traversable field.
    NotTraversable(String),
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::UnknownPath(path) => write!(f, "unknown field path: {path}"),
            SchemaError::WildcardNotAlone => {
                write!(f, "the \"*\" pattern must be the only pattern")
            }
            SchemaError::DuplicateField(path) => write!(f, "duplicate field: {path}"),
            SchemaError::NotTraversable(path) => {
                write!(f, "path {path} does not support \".*\" expansion")
            }
        }
    }
}

impl std::error::Error for SchemaError {}
