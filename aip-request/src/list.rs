use std::sync::Arc;

use aip_schema::{AllowedPathSet, ResourceSchema, ResourceTree, TreeConfig};
use aip_sql::{SelectStatement, SqlFragment, SqlParam};

use crate::error::{ParserBuildError, RequestError};
use crate::filtering::{FilteringRequestParser, ParsedFilter};
use crate::message::{ListRequestMessage, SearchRequestMessage};
use crate::options::{ListOptions, SearchOptions};
use crate::ordering::{OrderingRequestParser, ParsedOrder};
use crate::pagination::{request_fingerprint, PaginationRequestParser, ParsedPage};

/// Composed parser for list requests: filtering, ordering and
/// pagination over one shared resource tree.
pub struct ListRequestParser {
    filtering: FilteringRequestParser,
    ordering: OrderingRequestParser,
    pagination: PaginationRequestParser,
}

impl ListRequestParser {
    pub fn new(schema: &ResourceSchema, options: &ListOptions) -> Result<Self, ParserBuildError> {
        let tree = ResourceTree::build(
            schema,
            TreeConfig {
                allowed_paths: AllowedPathSet::new(&options.filtering.paths)?,
                ..TreeConfig::default()
            },
        )?;
        let tree = Arc::new(tree);
        tracing::debug!(resource = %schema.name(), "compiled list request parser");
        Ok(Self {
            filtering: FilteringRequestParser::with_tree(tree.clone()),
            ordering: OrderingRequestParser::with_tree(tree, &options.ordering)?,
            pagination: PaginationRequestParser::new(&options.pagination),
        })
    }

    /// Panicking constructor for static initialization.
    pub fn must_new(schema: &ResourceSchema, options: &ListOptions) -> Self {
        Self::new(schema, options)
            .unwrap_or_else(|err| panic!("building list parser for {}: {err}", schema.name()))
    }

    /// Parse the filter, order and page window of one request.
    pub fn parse<R: ListRequestMessage>(
        &self,
        request: &R,
    ) -> Result<ParsedListRequest, RequestError> {
        let filter = self.filtering.parse(request.filter())?;
        let order = self.ordering.parse(request.order_by())?;
        let fingerprint = request_fingerprint(request.filter(), order.canonical());
        let page = self
            .pagination
            .parse(request.page_size(), request.page_token(), fingerprint)?;
        Ok(ParsedListRequest {
            filter,
            order,
            page,
        })
    }
}

/// Everything a list handler needs to build and execute its query.
#[derive(Debug, Clone)]
pub struct ParsedListRequest {
    filter: ParsedFilter,
    order: ParsedOrder,
    page: ParsedPage,
}

impl ParsedListRequest {
    /// The `WHERE …` clause and its parameters; both empty for an
    /// unfiltered request.
    pub fn sql_where(&self) -> (&str, &[SqlParam]) {
        self.filter.sql_where()
    }

    /// The `ORDER BY …` clause; empty when unordered.
    pub fn sql_order_by(&self) -> String {
        self.order.sql_order_by()
    }

    /// The `OFFSET … LIMIT …` clause (limit includes the probe row).
    pub fn sql_pagination(&self) -> String {
        self.page.sql_pagination()
    }

    pub fn page_size(&self) -> u32 {
        self.page.page_size()
    }

    pub fn offset(&self) -> u64 {
        self.page.offset()
    }

    /// Next-page token from the number of rows the probe fetch
    /// returned; empty on the last page.
    pub fn next_page_token(&self, items_fetched: usize) -> String {
        self.page.next_page_token(items_fetched)
    }

    /// Assemble the full statement from a base select.
    ///
    /// ```ignore
    /// let query = parsed.to_select("SELECT * FROM users");
    /// let rows = bind_params(sqlx::query(&query.clause), &query.params)
    ///     .fetch_all(&pool)
    ///     .await?;
    /// ```
    pub fn to_select(&self, base: &str) -> SqlFragment {
        let (where_clause, params) = self.filter.sql_where();
        SelectStatement::new(base)
            .where_clause(where_clause, params.to_vec())
            .order_by(self.order.sql_order_by())
            .pagination(self.page.sql_pagination())
            .build()
    }
}

/// Composed parser for search requests: filtering and pagination, no
/// caller-controlled ordering.
pub struct SearchRequestParser {
    filtering: FilteringRequestParser,
    pagination: PaginationRequestParser,
}

impl SearchRequestParser {
    pub fn new(
        schema: &ResourceSchema,
        options: &SearchOptions,
    ) -> Result<Self, ParserBuildError> {
        Ok(Self {
            filtering: FilteringRequestParser::new(schema, &options.filtering)?,
            pagination: PaginationRequestParser::new(&options.pagination),
        })
    }

    /// Panicking constructor for static initialization.
    pub fn must_new(schema: &ResourceSchema, options: &SearchOptions) -> Self {
        Self::new(schema, options)
            .unwrap_or_else(|err| panic!("building search parser for {}: {err}", schema.name()))
    }

    pub fn parse<R: SearchRequestMessage>(
        &self,
        request: &R,
    ) -> Result<ParsedSearchRequest, RequestError> {
        let filter = self.filtering.parse(request.filter())?;
        let fingerprint = request_fingerprint(request.filter(), "");
        let page = self
            .pagination
            .parse(request.page_size(), request.page_token(), fingerprint)?;
        Ok(ParsedSearchRequest { filter, page })
    }
}

/// Everything a search handler needs to build and execute its query.
#[derive(Debug, Clone)]
pub struct ParsedSearchRequest {
    filter: ParsedFilter,
    page: ParsedPage,
}

impl ParsedSearchRequest {
    pub fn sql_where(&self) -> (&str, &[SqlParam]) {
        self.filter.sql_where()
    }

    pub fn sql_pagination(&self) -> String {
        self.page.sql_pagination()
    }

    pub fn page_size(&self) -> u32 {
        self.page.page_size()
    }

    pub fn next_page_token(&self, items_fetched: usize) -> String {
        self.page.next_page_token(items_fetched)
    }
}
