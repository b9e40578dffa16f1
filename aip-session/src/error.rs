use tonic::Status;

/// Session signing and transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A signed bundle with no embedded session.
    MissingSession,

    /// The signature does not verify against the shared secret.
    InvalidSignature,

    /// An authorization flip on a session that is already authorized.
    AlreadyAuthorized,

    /// A second identity injected into a call that already carries one.
    DuplicateSession,

    /// The metadata header does not decode into a signed session.
    Decode(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::MissingSession => write!(f, "signed bundle carries no session"),
            SessionError::InvalidSignature => write!(f, "session signature does not verify"),
            SessionError::AlreadyAuthorized => {
                write!(f, "session is already authorized")
            }
            SessionError::DuplicateSession => {
                write!(f, "call already carries a signed session")
            }
            SessionError::Decode(msg) => write!(f, "malformed signed session: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SessionError> for Status {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingSession
            | SessionError::InvalidSignature
            | SessionError::Decode(_) => Status::unauthenticated(err.to_string()),
            // State-machine violations are server faults, not caller
            // faults.
            SessionError::AlreadyAuthorized | SessionError::DuplicateSession => {
                Status::internal(err.to_string())
            }
        }
    }
}
