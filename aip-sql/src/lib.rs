//! PostgreSQL lowering for typed filter expressions.
//!
//! Takes the typed tree produced by `aip-filter` and emits a `WHERE`
//! fragment with `$1..$N` placeholders plus the positional parameter
//! vector, choosing JSONB operators, casts, array membership, `EXISTS`
//! sub-selects and `LIKE` patterns as the field shapes require. Also
//! emits `ORDER BY` and `OFFSET … LIMIT …` clauses for the ordering and
//! pagination parsers.
//!
//! Lowering is deterministic: the same typed tree always produces the
//! same fragment and the same parameter vector.

mod order;
mod page;
mod param;
mod statement;
mod transpile;

pub use order::{parse_order_by, Direction, OrderByClause, OrderByError, OrderColumn};
pub use page::PageClause;
pub use param::{bind_params, SqlFragment, SqlParam};
pub use statement::SelectStatement;
pub use transpile::transpile_where;
