use aip_filter::FilterError;
use aip_schema::SchemaError;
use aip_sql::OrderByError;

/// Construction-time parser failures: the schema or the request options
/// are misdeclared. These abort startup, never a call.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserBuildError {
    Schema(SchemaError),

    /// The declared default order does not parse.
    InvalidDefaultOrder(OrderByError),

    /// An ordering path names no declared field.
    UnknownOrderPath(String),

    /// An update path mapping names no declared field.
    UnknownMaskPath(String),
}

impl std::fmt::Display for ParserBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParserBuildError::Schema(err) => write!(f, "schema error: {err}"),
            ParserBuildError::InvalidDefaultOrder(err) => {
                write!(f, "invalid default order: {err}")
            }
            ParserBuildError::UnknownOrderPath(path) => {
                write!(f, "ordering path names no declared field: {path}")
            }
            ParserBuildError::UnknownMaskPath(path) => {
                write!(f, "update path names no declared field: {path}")
            }
        }
    }
}

impl std::error::Error for ParserBuildError {}

impl From<SchemaError> for ParserBuildError {
    fn from(err: SchemaError) -> Self {
        ParserBuildError::Schema(err)
    }
}

/// Per-call request parse failures; all surface as `InvalidArgument`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    Filter(FilterError),
    OrderBy(OrderByError),

    /// An `order_by` path outside the declared ordering paths.
    OrderPathNotAllowed(String),

    /// A negative `page_size`.
    InvalidPageSize(i32),

    /// `page_size` above the configured maximum.
    PageSizeTooLarge { page_size: u32, max: u32 },

    /// A page token that does not decode.
    InvalidPageToken,

    /// A page token minted for a different filter/order.
    PageTokenMismatch,

    /// An update-mask path outside the authorized patterns.
    MaskPathNotAllowed(String),

    /// An update mask targeting an output-only field.
    OutputOnlyMaskPath(String),

    /// An update mask with no paths.
    EmptyUpdateMask,
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::Filter(err) => write!(f, "invalid filter: {err}"),
            RequestError::OrderBy(err) => write!(f, "invalid order_by: {err}"),
            RequestError::OrderPathNotAllowed(path) => {
                write!(f, "ordering by {path} is not allowed")
            }
            RequestError::InvalidPageSize(size) => write!(f, "invalid page_size: {size}"),
            RequestError::PageSizeTooLarge { page_size, max } => {
                write!(f, "page_size {page_size} exceeds the maximum of {max}")
            }
            RequestError::InvalidPageToken => write!(f, "invalid page token"),
            RequestError::PageTokenMismatch => {
                write!(f, "page token does not match the request")
            }
            RequestError::MaskPathNotAllowed(path) => {
                write!(f, "update of {path} is not allowed")
            }
            RequestError::OutputOnlyMaskPath(path) => {
                write!(f, "field {path} is output only")
            }
            RequestError::EmptyUpdateMask => write!(f, "update_mask must name at least one path"),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<FilterError> for RequestError {
    fn from(err: FilterError) -> Self {
        RequestError::Filter(err)
    }
}

impl From<OrderByError> for RequestError {
    fn from(err: OrderByError) -> Self {
        RequestError::OrderBy(err)
    }
}
