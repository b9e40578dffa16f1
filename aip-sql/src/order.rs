/// Sort direction; ascending is the default and is omitted from the
/// emitted SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One resolved ordering column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderColumn {
    pub column: String,
    pub direction: Direction,
}

impl OrderColumn {
    pub fn new(column: impl Into<String>, direction: Direction) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

/// A resolved `ORDER BY` clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderByClause {
    columns: Vec<OrderColumn>,
}

impl OrderByClause {
    pub fn new(columns: Vec<OrderColumn>) -> Self {
        Self { columns }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[OrderColumn] {
        &self.columns
    }

    /// `ORDER BY a, b DESC`, or an empty string when no columns
    /// resolved.
    pub fn sql(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }
        let rendered: Vec<String> = self
            .columns
            .iter()
            .map(|c| match c.direction {
                Direction::Asc => c.column.clone(),
                Direction::Desc => format!("{} DESC", c.column),
            })
            .collect();
        format!("ORDER BY {}", rendered.join(", "))
    }
}

/// Syntax errors in an `order_by` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderByError {
    /// An entry with no path, e.g. a doubled comma.
    EmptyEntry,

    /// A direction keyword other than `asc`/`desc`.
    InvalidDirection(String),

    /// A path containing characters outside the identifier charset.
    InvalidPath(String),
}

impl std::fmt::Display for OrderByError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderByError::EmptyEntry => write!(f, "empty order_by entry"),
            OrderByError::InvalidDirection(dir) => {
                write!(f, "invalid sort direction: {dir} (expected asc or desc)")
            }
            OrderByError::InvalidPath(path) => write!(f, "invalid order_by path: {path}"),
        }
    }
}

impl std::error::Error for OrderByError {}

/// Parse a comma-separated `order_by` string into `(path, direction)`
/// pairs. Direction defaults to ascending.
pub fn parse_order_by(input: &str) -> Result<Vec<(String, Direction)>, OrderByError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for raw in input.split(',') {
        let mut parts = raw.split_whitespace();
        let path = parts.next().ok_or(OrderByError::EmptyEntry)?;
        if !is_valid_path(path) {
            return Err(OrderByError::InvalidPath(path.to_string()));
        }
        let direction = match parts.next() {
            None => Direction::Asc,
            Some("asc") => Direction::Asc,
            Some("desc") => Direction::Desc,
            Some(other) => return Err(OrderByError::InvalidDirection(other.to_string())),
        };
        if let Some(extra) = parts.next() {
            return Err(OrderByError::InvalidDirection(extra.to_string()));
        }
        entries.push((path.to_string(), direction));
    }
    Ok(entries)
}

fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_paths_and_directions() {
        let entries = parse_order_by("create_time desc, id").unwrap();
        assert_eq!(
            entries,
            vec![
                ("create_time".to_string(), Direction::Desc),
                ("id".to_string(), Direction::Asc),
            ]
        );
    }

    #[test]
    fn empty_string_is_no_entries() {
        assert!(parse_order_by("").unwrap().is_empty());
        assert!(parse_order_by("   ").unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_direction() {
        assert_eq!(
            parse_order_by("id descending").unwrap_err(),
            OrderByError::InvalidDirection("descending".into())
        );
    }

    #[test]
    fn rejects_doubled_commas() {
        assert_eq!(parse_order_by("id,,name").unwrap_err(), OrderByError::EmptyEntry);
    }

    #[test]
    fn rejects_non_identifier_paths() {
        assert_eq!(
            parse_order_by("id; DROP TABLE users").unwrap_err(),
            OrderByError::InvalidPath("id;".into())
        );
    }

    #[test]
    fn sql_omits_asc_and_joins_with_commas() {
        let clause = OrderByClause::new(vec![
            OrderColumn::new("organization_id", Direction::Desc),
            OrderColumn::new("user_id", Direction::Asc),
        ]);
        assert_eq!(clause.sql(), "ORDER BY organization_id DESC, user_id");
        assert_eq!(OrderByClause::default().sql(), "");
    }
}
