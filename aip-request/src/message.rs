/// Accessors a list request message must expose.
///
/// Implemented in one-liners by the generated request types:
///
/// ```ignore
/// impl ListRequestMessage for ListUsersRequest {
///     fn filter(&self) -> &str { &self.filter }
///     fn order_by(&self) -> &str { &self.order_by }
///     fn page_size(&self) -> i32 { self.page_size }
///     fn page_token(&self) -> &str { &self.page_token }
/// }
/// ```
pub trait ListRequestMessage {
    fn filter(&self) -> &str;
    fn order_by(&self) -> &str;
    fn page_size(&self) -> i32;
    fn page_token(&self) -> &str;
}

/// Accessors a search request message must expose. Search requests
/// filter and paginate but have no caller-controlled ordering.
pub trait SearchRequestMessage {
    fn filter(&self) -> &str;
    fn page_size(&self) -> i32;
    fn page_token(&self) -> &str;
}

/// Accessors an update request message must expose: the field-mask
/// paths naming what to write.
pub trait UpdateRequestMessage {
    fn update_mask_paths(&self) -> &[String];
}
