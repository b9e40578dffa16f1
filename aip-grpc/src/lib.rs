//! gRPC interceptors for the authentication and session plane.
//!
//! A call flows through an [`AuthChain`] of stages, each either
//! terminating the call with a [`tonic::Status`] or augmenting the
//! call-local [`CallContext`]:
//!
//! 1. [`SessionIngress`]: demarshal the signed session header.
//! 2. Authenticators: attest identity when their header is present
//!    ([`ApiKeyAuthenticator`], [`InternalServiceAuthenticator`],
//!    [`BearerAuthenticator`]). Authenticators never authorize.
//! 3. [`PermissionInterceptor`]: per-method authorization with
//!    role-inherited permission sets and wildcard expansion.
//!
//! [`AuthLayer`] mounts the chain as tower middleware over the tonic
//! router (the full method name is the URI path); handlers read the
//! session with [`current_session`] and propagate it downstream with
//! [`attach_session`] or [`SessionPropagator`].
//!
//! # Example
//!
//! ```ignore
//! let signer = Arc::new(SessionSigner::new(secret));
//! let chain = AuthChain::new()
//!     .with(SessionIngress)
//!     .with(ApiKeyAuthenticator::new(directory, signer.clone()))
//!     .with(PermissionInterceptor::new(&config, &registry, signer)?);
//!
//! Server::builder()
//!     .layer(AuthLayer::new(chain))
//!     .add_service(svc)
//!     .serve(addr)
//!     .await?;
//! ```

mod authenticate;
mod chain;
mod config;
mod layer;
mod permission;
mod status;
mod transport;

pub use authenticate::{
    ApiKeyAccount, ApiKeyAuthenticator, ApiKeyDirectory, BearerAuthenticator,
    InternalServiceAuthenticator, TokenVerifier, VerifiedUser, API_KEY_HEADER,
    INTERNAL_SERVICE_HEADER,
};
pub use chain::{AuthChain, CallContext, CallInterceptor};
pub use config::{AuthConfig, ConfigError, RoleConfig, ServiceAccountConfig};
pub use layer::{AuthBody, AuthLayer, AuthService};
pub use permission::{
    MethodRegistry, MethodRequirements, PermissionError, PermissionInterceptor,
};
pub use status::IntoStatus;
pub use transport::{attach_session, current_session, SessionEgress, SessionIngress, SessionPropagator};
