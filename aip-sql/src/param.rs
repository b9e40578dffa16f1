use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

/// A positional SQL parameter.
///
/// Integers are always 64-bit signed, floats 64-bit; timestamps bind as
/// native timestamptz values.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

/// An opaque SQL fragment plus its parameters, placeholders `$1..$N`
/// numbered in parameter order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    pub clause: String,
    pub params: Vec<SqlParam>,
}

impl SqlFragment {
    pub fn new(clause: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            clause: clause.into(),
            params,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }
}

/// Bind a parameter vector onto a sqlx Postgres query in order.
pub fn bind_params<'q>(
    query: Query<'q, Postgres, PgArguments>,
    params: &[SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    params.iter().fold(query, |query, param| match param {
        SqlParam::Bool(v) => query.bind(*v),
        SqlParam::Int(v) => query.bind(*v),
        SqlParam::Float(v) => query.bind(*v),
        SqlParam::Text(v) => query.bind(v.clone()),
        SqlParam::Bytes(v) => query.bind(v.clone()),
        SqlParam::Timestamp(v) => query.bind(*v),
    })
}
