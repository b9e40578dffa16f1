use http::Extensions;
use prost::Message;
use tonic::metadata::{MetadataMap, MetadataValue};

use crate::error::SessionError;
use crate::session::SignedSession;

/// Binary metadata header carrying the signed session between hops.
/// One header per call, at most one value.
pub const SIGNED_SESSION_HEADER: &str = "x-signed-session-bin";

/// Serialize the signed session into outgoing metadata.
pub fn encode_metadata(signed: &SignedSession, metadata: &mut MetadataMap) {
    let bytes = signed.encode_to_vec();
    metadata.insert_bin(SIGNED_SESSION_HEADER, MetadataValue::from_bytes(&bytes));
}

/// Deserialize the signed session from incoming metadata.
///
/// An absent header is `Ok(None)`; unauthenticated calls are allowed
/// through the transport layer. A present-but-malformed header is an
/// error.
pub fn decode_metadata(metadata: &MetadataMap) -> Result<Option<SignedSession>, SessionError> {
    let Some(value) = metadata.get_bin(SIGNED_SESSION_HEADER) else {
        return Ok(None);
    };
    let bytes = value
        .to_bytes()
        .map_err(|err| SessionError::Decode(err.to_string()))?;
    SignedSession::decode(bytes.as_ref())
        .map(Some)
        .map_err(|err| SessionError::Decode(err.to_string()))
}

/// Drop the session header from incoming metadata after consumption so
/// it is not propagated verbatim.
pub fn strip_metadata(metadata: &mut MetadataMap) {
    metadata.remove_bin(SIGNED_SESSION_HEADER);
}

/// The call-local session slot, stored in request extensions.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub SignedSession);

/// Read the session slot.
pub fn session_from_extensions(extensions: &Extensions) -> Option<&SignedSession> {
    extensions.get::<CurrentSession>().map(|current| &current.0)
}

/// Fill the session slot. At most one identity per call: a second
/// injection fails.
pub fn inject_session(
    extensions: &mut Extensions,
    signed: SignedSession,
) -> Result<(), SessionError> {
    if extensions.get::<CurrentSession>().is_some() {
        return Err(SessionError::DuplicateSession);
    }
    extensions.insert(CurrentSession(signed));
    Ok(())
}
