use hmac::{Hmac, Mac};
use prost::Message;
use sha2::Sha256;

use crate::error::SessionError;
use crate::session::{Session, SignedSession};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies sessions with HMAC-SHA256 over their canonical
/// prost encoding.
///
/// Stateless; one instance is shared by every interceptor. Verification
/// re-encodes the embedded session, recomputes the tag and compares in
/// constant time. Any failure is terminal for the call.
#[derive(Debug)]
pub struct SessionSigner {
    secret: Vec<u8>,
}

impl SessionSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.secret).expect("hmac key")
    }

    pub fn sign(&self, session: Session) -> SignedSession {
        let mut mac = self.mac();
        mac.update(&session.encode_to_vec());
        SignedSession {
            session: Some(session),
            signature: mac.finalize().into_bytes().to_vec(),
        }
    }

    pub fn verify(&self, signed: &SignedSession) -> bool {
        let Some(session) = &signed.session else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(&session.encode_to_vec());
        mac.verify_slice(&signed.signature).is_ok()
    }

    /// Flip `authorized` from false to true and re-sign.
    ///
    /// The session id and identity are preserved; flipping an already
    /// authorized session is a state-machine violation.
    pub fn authorize(&self, signed: &SignedSession) -> Result<SignedSession, SessionError> {
        if !self.verify(signed) {
            return Err(SessionError::InvalidSignature);
        }
        let mut session = signed
            .session
            .clone()
            .ok_or(SessionError::MissingSession)?;
        if session.authorized {
            return Err(SessionError::AlreadyAuthorized);
        }
        session.authorized = true;
        tracing::trace!(session_id = %session.id, "authorized session re-signed");
        Ok(self.sign(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ServiceAccountKind;

    fn signer() -> SessionSigner {
        SessionSigner::new(b"test-secret".to_vec())
    }

    fn session() -> Session {
        Session::for_service_account("sa-1", ServiceAccountKind::ApiKey, ["reader".to_string()])
    }

    #[test]
    fn sign_then_verify() {
        let signed = signer().sign(session());
        assert!(signer().verify(&signed));
    }

    #[test]
    fn any_byte_alteration_fails_verification() {
        let signed = signer().sign(session());

        let mut tampered_signature = signed.clone();
        tampered_signature.signature[0] ^= 0x01;
        assert!(!signer().verify(&tampered_signature));

        let mut tampered_session = signed.clone();
        tampered_session.session.as_mut().unwrap().authorized = true;
        assert!(!signer().verify(&tampered_session));

        let mut tampered_roles = signed;
        tampered_roles
            .session
            .as_mut()
            .unwrap()
            .role_ids
            .push("admin".to_string());
        assert!(!signer().verify(&tampered_roles));
    }

    #[test]
    fn different_secret_fails_verification() {
        let signed = signer().sign(session());
        assert!(!SessionSigner::new(b"other-secret".to_vec()).verify(&signed));
    }

    #[test]
    fn missing_session_never_verifies() {
        let signed = SignedSession {
            session: None,
            signature: vec![0; 32],
        };
        assert!(!signer().verify(&signed));
    }

    #[test]
    fn authorize_flips_once_and_preserves_identity() {
        let signer = signer();
        let signed = signer.sign(session());
        let original_id = signed.session.as_ref().unwrap().id.clone();

        let authorized = signer.authorize(&signed).unwrap();
        let inner = authorized.session.as_ref().unwrap();
        assert!(inner.authorized);
        assert_eq!(inner.id, original_id);
        assert!(signer.verify(&authorized));

        // Second flip is a state-machine violation.
        assert_eq!(
            signer.authorize(&authorized).unwrap_err(),
            SessionError::AlreadyAuthorized
        );
    }

    #[test]
    fn authorize_rejects_forged_input() {
        let signer = signer();
        let mut forged = signer.sign(session());
        forged.session.as_mut().unwrap().role_ids.push("admin".to_string());
        assert_eq!(
            signer.authorize(&forged).unwrap_err(),
            SessionError::InvalidSignature
        );
    }
}
