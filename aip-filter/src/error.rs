/// Errors produced while lexing, parsing or type-checking a filter.
///
/// Every variant surfaces to the caller as `InvalidArgument`; none of
/// them abort the process.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// A character that cannot start any token.
    UnexpectedChar { pos: usize, found: char },

    /// A string literal with no closing quote.
    UnterminatedString { pos: usize },

    /// A token that does not fit the grammar at this position.
    UnexpectedToken { pos: usize, found: String },

    /// The filter ended where more input was required.
    UnexpectedEnd { expected: &'static str },

    /// A `(` with no matching `)`.
    UnbalancedParen { pos: usize },

    /// Leftover input after a complete expression.
    TrailingInput { pos: usize, found: String },

    /// An identifier path that names no declared field.
    UnknownIdent(String),

    /// A recognized function called with the wrong number of arguments.
    ArityMismatch {
        func: String,
        expected: usize,
        found: usize,
    },

    /// A call to a function the language does not define.
    UnknownFunction(String),

    /// Operand type does not match the field's declared type.
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// `timestamp("…")` argument is not RFC 3339.
    InvalidTimestamp(String),

    /// `*` may only appear at the boundaries of a string literal.
    WildcardInMiddle(String),

    /// A string literal that names no value of the field's enum.
    UnknownEnumValue { path: String, value: String },

    /// The field cannot be used in this position (proto-backed columns,
    /// comparisons through repeated fields, bytes literals).
    NotFilterable(String),

    /// An expression used where a boolean predicate was required.
    ExpectedPredicate(String),

    /// A comparison whose left-hand side is not a field path.
    ExpectedField(String),

    /// A comparison whose right-hand side is not a literal.
    ExpectedLiteral(String),
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::UnexpectedChar { pos, found } => {
                write!(f, "unexpected character {found:?} at offset {pos}")
            }
            FilterError::UnterminatedString { pos } => {
                write!(f, "unterminated string literal starting at offset {pos}")
            }
            FilterError::UnexpectedToken { pos, found } => {
                write!(f, "unexpected {found} at offset {pos}")
            }
            FilterError::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of filter, expected {expected}")
            }
            FilterError::UnbalancedParen { pos } => {
                write!(f, "unbalanced parenthesis at offset {pos}")
            }
            FilterError::TrailingInput { pos, found } => {
                write!(f, "trailing {found} at offset {pos}")
            }
            FilterError::UnknownIdent(path) => write!(f, "unknown field: {path}"),
            FilterError::ArityMismatch {
                func,
                expected,
                found,
            } => write!(f, "{func}() takes {expected} argument(s), got {found}"),
            FilterError::UnknownFunction(name) => write!(f, "unknown function: {name}"),
            FilterError::TypeMismatch {
                path,
                expected,
                found,
            } => write!(f, "field {path} is {expected}, got {found}"),
            FilterError::InvalidTimestamp(value) => {
                write!(f, "invalid timestamp literal: {value}")
            }
            FilterError::WildcardInMiddle(value) => {
                write!(f, "wildcard must be at the start or end of the value: {value}")
            }
            FilterError::UnknownEnumValue { path, value } => {
                write!(f, "field {path} has no enum value {value:?}")
            }
            FilterError::NotFilterable(path) => write!(f, "field {path} cannot be filtered on"),
            FilterError::ExpectedPredicate(what) => {
                write!(f, "expected a boolean predicate, got {what}")
            }
            FilterError::ExpectedField(what) => {
                write!(f, "comparison requires a field on the left, got {what}")
            }
            FilterError::ExpectedLiteral(what) => {
                write!(f, "comparison requires a literal on the right, got {what}")
            }
        }
    }
}

impl std::error::Error for FilterError {}
