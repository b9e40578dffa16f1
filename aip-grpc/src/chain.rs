use std::sync::Arc;

use tonic::metadata::MetadataMap;
use tonic::Status;

use aip_session::SignedSession;

/// Call-local state threaded through the interceptor chain.
///
/// Owned by the call; the chain runs stages in declared order, each one
/// either terminating the call or augmenting this context before the
/// next stage sees it.
pub struct CallContext {
    /// Full gRPC method name, `/package.Service/Method`.
    pub full_method: String,

    /// Incoming metadata; authenticators strip their headers after
    /// consuming them.
    pub metadata: MetadataMap,

    /// The signed session slot. At most one identity per call.
    pub session: Option<SignedSession>,
}

impl CallContext {
    pub fn new(full_method: impl Into<String>, metadata: MetadataMap) -> Self {
        Self {
            full_method: full_method.into(),
            metadata,
            session: None,
        }
    }

    /// Fill the session slot, failing if an identity is already
    /// attached.
    pub fn inject_session(&mut self, signed: SignedSession) -> Result<(), Status> {
        if self.session.is_some() {
            return Err(Status::internal("call already carries a signed session"));
        }
        self.session = Some(signed);
        Ok(())
    }
}

/// One stage of the per-call chain.
///
/// Stages are CPU-bound and synchronous; all I/O happened before the
/// chain runs. A stage returning an error terminates the call with
/// that status.
pub trait CallInterceptor: Send + Sync + 'static {
    fn intercept(&self, ctx: &mut CallContext) -> Result<(), Status>;
}

/// The ordered interceptor chain, built once at startup and shared by
/// every call.
#[derive(Clone, Default)]
pub struct AuthChain {
    stages: Vec<Arc<dyn CallInterceptor>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: impl CallInterceptor) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn with_arc(mut self, stage: Arc<dyn CallInterceptor>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Run every stage in declared order.
    pub fn run(&self, ctx: &mut CallContext) -> Result<(), Status> {
        for stage in &self.stages {
            stage.intercept(ctx)?;
        }
        Ok(())
    }
}
