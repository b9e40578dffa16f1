//! Signed session records and their transport.
//!
//! A session is created by exactly one authenticator per call, signed
//! with HMAC-SHA256 over its canonical prost encoding, and carried
//! between services in the `x-signed-session-bin` metadata header. The
//! only mutation a session ever sees is the permission layer flipping
//! `authorized` from false to true, which re-signs it.
//!
//! The signer is stateless and safe to share across calls; the secret
//! is never mutated after startup.
//!
//! # Example
//!
//! ```ignore
//! let signer = SessionSigner::new(secret);
//! let signed = signer.sign(Session::for_service_account(
//!     "sa-1",
//!     ServiceAccountKind::ApiKey,
//!     ["reader".to_string()],
//! ));
//! assert!(signer.verify(&signed));
//! ```

mod error;
mod session;
mod signer;
mod transport;

pub use error::SessionError;
pub use session::{
    ClientVersion, Identity, ServiceAccountIdentity, ServiceAccountKind, Session,
    SessionMetadata, SignedSession, UserIdentity,
};
pub use signer::SessionSigner;
pub use transport::{
    decode_metadata, encode_metadata, inject_session, session_from_extensions, strip_metadata,
    CurrentSession, SIGNED_SESSION_HEADER,
};
