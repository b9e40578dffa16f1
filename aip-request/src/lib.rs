//! Request parsers for resource-oriented RPCs.
//!
//! Five composable parsers share one resource tree: filtering, ordering,
//! pagination, update-mask, and the list/search compositions. Parser
//! construction is a one-time compile step over the declared schema;
//! misdeclarations fail construction (or panic through the `must_new`
//! variants, meant for process startup). Per-call `parse` methods return
//! typed errors only.
//!
//! # Example
//!
//! ```ignore
//! static PARSER: OnceLock<ListRequestParser> = OnceLock::new();
//!
//! let parser = ListRequestParser::must_new(&schema, &ListOptions {
//!     filtering: FilteringOptions::new(["id", "nested.*"]),
//!     ordering: OrderingOptions::new(["create_time"]).default_order("create_time desc"),
//!     pagination: PaginationOptions::default(),
//! });
//!
//! let parsed = parser.parse(&request)?;
//! let (where_clause, params) = parsed.sql_where();
//! ```

mod error;
mod filtering;
mod list;
mod message;
mod options;
mod ordering;
mod pagination;
mod update;

pub use error::{ParserBuildError, RequestError};
pub use filtering::{FilteringRequestParser, ParsedFilter};
pub use list::{
    ListRequestParser, ParsedListRequest, ParsedSearchRequest, SearchRequestParser,
};
pub use message::{ListRequestMessage, SearchRequestMessage, UpdateRequestMessage};
pub use options::{
    FilteringOptions, ListOptions, OrderingOptions, PaginationOptions, SearchOptions,
    UpdateOptions,
};
pub use ordering::{OrderingRequestParser, ParsedOrder};
pub use pagination::{request_fingerprint, PageToken, PaginationRequestParser, ParsedPage};
pub use update::{ParsedUpdate, UpdateRequestParser};
