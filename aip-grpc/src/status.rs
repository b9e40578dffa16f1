use tonic::Status;

use aip_request::{ParserBuildError, RequestError};

/// Conversion of pipeline errors into gRPC statuses at the handler
/// boundary.
///
/// ```ignore
/// let parsed = parser.parse(&request).map_err(IntoStatus::into_status)?;
/// ```
pub trait IntoStatus {
    fn into_status(self) -> Status;
}

/// Every request parse failure is the caller's fault.
impl IntoStatus for RequestError {
    fn into_status(self) -> Status {
        Status::invalid_argument(self.to_string())
    }
}

/// Parser construction failures reaching a handler mean broken startup
/// wiring.
impl IntoStatus for ParserBuildError {
    fn into_status(self) -> Status {
        Status::internal(self.to_string())
    }
}
