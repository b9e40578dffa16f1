use std::collections::HashMap;

/// Allowed filter paths, as carried in the request message options.
/// Supports exact paths, trailing `.*`, and the lone `"*"`.
#[derive(Debug, Clone, Default)]
pub struct FilteringOptions {
    pub paths: Vec<String>,
}

impl FilteringOptions {
    pub fn new<S: Into<String>>(paths: impl IntoIterator<Item = S>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Allow filtering on every declared field.
    pub fn any() -> Self {
        Self::new(["*"])
    }
}

/// Allowed ordering paths and the order injected when `order_by` is
/// empty.
#[derive(Debug, Clone, Default)]
pub struct OrderingOptions {
    pub paths: Vec<String>,
    pub default_order: Option<String>,
}

impl OrderingOptions {
    pub fn new<S: Into<String>>(paths: impl IntoIterator<Item = S>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            default_order: None,
        }
    }

    pub fn default_order(mut self, order_by: impl Into<String>) -> Self {
        self.default_order = Some(order_by.into());
        self
    }
}

/// Page-size bounds.
#[derive(Debug, Clone, Copy)]
pub struct PaginationOptions {
    /// Substituted when the request carries `page_size == 0`.
    pub default_page_size: u32,

    /// Requests above this fail with `InvalidArgument`.
    pub max_page_size: u32,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 1000,
        }
    }
}

/// Authorized update-mask patterns and column mappings.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Patterns a mask path must match: `path` or `path.*`.
    pub paths: Vec<String>,

    /// Explicit `path → column` overrides; unmapped paths write their
    /// root column.
    pub path_mappings: HashMap<String, String>,

    /// Always include the `update_time` column in the column list.
    pub implicit_update_time: bool,
}

impl UpdateOptions {
    pub fn new<S: Into<String>>(paths: impl IntoIterator<Item = S>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn map_path(mut self, path: impl Into<String>, column: impl Into<String>) -> Self {
        self.path_mappings.insert(path.into(), column.into());
        self
    }

    pub fn with_implicit_update_time(mut self) -> Self {
        self.implicit_update_time = true;
        self
    }
}

/// Options for the composed list parser.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub filtering: FilteringOptions,
    pub ordering: OrderingOptions,
    pub pagination: PaginationOptions,
}

/// Options for the composed search parser.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub filtering: FilteringOptions,
    pub pagination: PaginationOptions,
}
