use tonic::{Request, Status};

use aip_session::{
    decode_metadata, encode_metadata, session_from_extensions, strip_metadata, SignedSession,
};

use crate::chain::{CallContext, CallInterceptor};

/// Incoming half of the session transport: demarshal the signed
/// session header into the call's session slot.
///
/// An absent header passes through; unauthenticated calls reach the
/// permission layer, which decides their fate. The header is stripped
/// after consumption.
pub struct SessionIngress;

impl CallInterceptor for SessionIngress {
    fn intercept(&self, ctx: &mut CallContext) -> Result<(), Status> {
        let decoded = decode_metadata(&ctx.metadata).map_err(Status::from)?;
        if let Some(signed) = decoded {
            ctx.inject_session(signed)?;
            strip_metadata(&mut ctx.metadata);
        }
        Ok(())
    }
}

/// Outgoing half of the session transport: re-serialize the (possibly
/// re-signed) session into the call's metadata so the handler, and
/// every downstream hop it calls, sees the same identity.
pub struct SessionEgress;

impl CallInterceptor for SessionEgress {
    fn intercept(&self, ctx: &mut CallContext) -> Result<(), Status> {
        if let Some(signed) = &ctx.session {
            encode_metadata(signed, &mut ctx.metadata);
        }
        Ok(())
    }
}

/// The signed session of the current server call, from request
/// extensions populated by [`crate::AuthLayer`].
pub fn current_session<T>(request: &Request<T>) -> Option<&SignedSession> {
    session_from_extensions(request.extensions())
}

/// Append the signed session to an outgoing client request.
pub fn attach_session<T>(request: &mut Request<T>, signed: &SignedSession) {
    encode_metadata(signed, request.metadata_mut());
}

/// Client-side interceptor propagating one call's session to a
/// downstream channel.
///
/// ```ignore
/// let signed = current_session(&request).cloned().unwrap();
/// let mut client = UserServiceClient::with_interceptor(
///     channel,
///     SessionPropagator::new(signed),
/// );
/// ```
#[derive(Clone)]
pub struct SessionPropagator {
    signed: SignedSession,
}

impl SessionPropagator {
    pub fn new(signed: SignedSession) -> Self {
        Self { signed }
    }
}

impl tonic::service::Interceptor for SessionPropagator {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        encode_metadata(&self.signed, request.metadata_mut());
        Ok(request)
    }
}
