use std::collections::HashMap;
use std::sync::Arc;

use tonic::metadata::MetadataMap;
use tonic::Status;

use aip_session::{
    ClientVersion, ServiceAccountKind, Session, SessionMetadata, SessionSigner,
};

use crate::chain::{CallContext, CallInterceptor};
use crate::config::AuthConfig;

/// Default metadata key carrying an API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Default metadata key carrying the internal service token.
pub const INTERNAL_SERVICE_HEADER: &str = "x-internal-service";

const USER_AGENT_HEADER: &str = "user-agent";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const CLIENT_VERSION_HEADER: &str = "x-client-version";

/// Session metadata harvested from call metadata: peer ip, user agent,
/// client semver.
fn harvest_metadata(metadata: &MetadataMap) -> SessionMetadata {
    let text = |key: &str| {
        metadata
            .get(key)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let client_version = metadata
        .get(CLIENT_VERSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(ClientVersion::parse);
    SessionMetadata {
        ip: text(FORWARDED_FOR_HEADER),
        user_agent: text(USER_AGENT_HEADER),
        client_version,
        custom: Default::default(),
    }
}

/// The account an API key resolves to.
#[derive(Debug, Clone)]
pub struct ApiKeyAccount {
    pub service_account_id: String,
    pub role_ids: Vec<String>,
}

/// Key lookup backing the API-key authenticator.
pub trait ApiKeyDirectory: Send + Sync + 'static {
    /// `None` means the key is unknown; the call fails
    /// `Unauthenticated`.
    fn resolve(&self, api_key: &str) -> Option<ApiKeyAccount>;
}

impl ApiKeyDirectory for HashMap<String, ApiKeyAccount> {
    fn resolve(&self, api_key: &str) -> Option<ApiKeyAccount> {
        self.get(api_key).cloned()
    }
}

/// Build a key directory from the service accounts of an [`AuthConfig`].
impl ApiKeyDirectory for AuthConfig {
    fn resolve(&self, api_key: &str) -> Option<ApiKeyAccount> {
        self.service_accounts
            .iter()
            .find(|account| account.api_key.as_deref() == Some(api_key))
            .map(|account| ApiKeyAccount {
                service_account_id: account.id.clone(),
                role_ids: account.role_ids.clone(),
            })
    }
}

/// Attests service-account identity from an API-key header.
///
/// Contract shared by every authenticator: an absent header passes the
/// call through untouched; a malformed or unknown header fails
/// `Unauthenticated`; otherwise mint a session, sign it, fill the
/// call's session slot and strip the header. Authenticators never
/// authorize.
pub struct ApiKeyAuthenticator<D> {
    header: String,
    directory: D,
    signer: Arc<SessionSigner>,
}

impl<D: ApiKeyDirectory> ApiKeyAuthenticator<D> {
    pub fn new(directory: D, signer: Arc<SessionSigner>) -> Self {
        Self {
            header: API_KEY_HEADER.to_string(),
            directory,
            signer,
        }
    }

    /// Override the metadata key consulted for the API key.
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }
}

impl<D: ApiKeyDirectory> CallInterceptor for ApiKeyAuthenticator<D> {
    fn intercept(&self, ctx: &mut CallContext) -> Result<(), Status> {
        let Some(value) = ctx.metadata.get(self.header.as_str()) else {
            return Ok(());
        };
        let api_key = value
            .to_str()
            .map_err(|_| Status::unauthenticated("malformed api key"))?;
        let account = self
            .directory
            .resolve(api_key)
            .ok_or_else(|| Status::unauthenticated("unknown api key"))?;
        tracing::debug!(
            service_account_id = %account.service_account_id,
            "authenticated via api key"
        );
        let session = Session::for_service_account(
            account.service_account_id,
            ServiceAccountKind::ApiKey,
            account.role_ids,
        )
        .with_metadata(harvest_metadata(&ctx.metadata));
        ctx.inject_session(self.signer.sign(session))?;
        ctx.metadata.remove(self.header.as_str());
        Ok(())
    }
}

/// Attests internal service-to-service identity from a shared token.
pub struct InternalServiceAuthenticator {
    header: String,
    token: String,
    service_account_id: String,
    role_ids: Vec<String>,
    signer: Arc<SessionSigner>,
}

impl InternalServiceAuthenticator {
    pub fn new(
        token: impl Into<String>,
        service_account_id: impl Into<String>,
        role_ids: impl IntoIterator<Item = String>,
        signer: Arc<SessionSigner>,
    ) -> Self {
        Self {
            header: INTERNAL_SERVICE_HEADER.to_string(),
            token: token.into(),
            service_account_id: service_account_id.into(),
            role_ids: role_ids.into_iter().collect(),
            signer,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }
}

impl CallInterceptor for InternalServiceAuthenticator {
    fn intercept(&self, ctx: &mut CallContext) -> Result<(), Status> {
        let Some(value) = ctx.metadata.get(self.header.as_str()) else {
            return Ok(());
        };
        let token = value
            .to_str()
            .map_err(|_| Status::unauthenticated("malformed internal service token"))?;
        if token != self.token {
            return Err(Status::unauthenticated("unknown internal service token"));
        }
        tracing::debug!(
            service_account_id = %self.service_account_id,
            "authenticated internal service"
        );
        let session = Session::for_service_account(
            self.service_account_id.clone(),
            ServiceAccountKind::Internal,
            self.role_ids.clone(),
        )
        .with_metadata(harvest_metadata(&ctx.metadata));
        ctx.inject_session(self.signer.sign(session))?;
        ctx.metadata.remove(self.header.as_str());
        Ok(())
    }
}

/// The user a bearer token resolves to.
#[derive(Debug, Clone)]
pub struct VerifiedUser {
    pub org_id: String,
    pub user_id: String,
    pub role_ids: Vec<String>,
}

/// Token validation backing the bearer authenticator. Implementations
/// typically check a JWT or look the token up in a store.
pub trait TokenVerifier: Send + Sync + 'static {
    fn verify(
        &self,
        token: &str,
    ) -> Result<VerifiedUser, Box<dyn std::error::Error + Send + Sync>>;
}

/// Attests user identity from an `authorization: Bearer …` header.
pub struct BearerAuthenticator<V> {
    verifier: V,
    signer: Arc<SessionSigner>,
}

const AUTHORIZATION_HEADER: &str = "authorization";

impl<V: TokenVerifier> BearerAuthenticator<V> {
    pub fn new(verifier: V, signer: Arc<SessionSigner>) -> Self {
        Self { verifier, signer }
    }
}

impl<V: TokenVerifier> CallInterceptor for BearerAuthenticator<V> {
    fn intercept(&self, ctx: &mut CallContext) -> Result<(), Status> {
        let Some(value) = ctx.metadata.get(AUTHORIZATION_HEADER) else {
            return Ok(());
        };
        let header = value
            .to_str()
            .map_err(|_| Status::unauthenticated("malformed authorization metadata"))?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| Status::unauthenticated("authorization must use the Bearer scheme"))?;
        let user = self
            .verifier
            .verify(token)
            .map_err(|err| Status::unauthenticated(format!("token validation failed: {err}")))?;
        tracing::debug!(org_id = %user.org_id, user_id = %user.user_id, "authenticated bearer token");
        let session = Session::for_user(user.org_id, user.user_id, user.role_ids)
            .with_metadata(harvest_metadata(&ctx.metadata));
        ctx.inject_session(self.signer.sign(session))?;
        ctx.metadata.remove(AUTHORIZATION_HEADER);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aip_session::Identity;

    fn signer() -> Arc<SessionSigner> {
        Arc::new(SessionSigner::new(b"secret".to_vec()))
    }

    fn directory() -> HashMap<String, ApiKeyAccount> {
        HashMap::from([(
            "key-1".to_string(),
            ApiKeyAccount {
                service_account_id: "sa-1".to_string(),
                role_ids: vec!["reader".to_string()],
            },
        )])
    }

    fn ctx_with(header: &'static str, value: &str) -> CallContext {
        let mut metadata = MetadataMap::new();
        metadata.insert(header, value.parse().unwrap());
        CallContext::new("/test.Svc/M", metadata)
    }

    #[test]
    fn absent_header_passes_through() {
        let auth = ApiKeyAuthenticator::new(directory(), signer());
        let mut ctx = CallContext::new("/test.Svc/M", MetadataMap::new());
        auth.intercept(&mut ctx).unwrap();
        assert!(ctx.session.is_none());
    }

    #[test]
    fn known_key_mints_a_signed_session() {
        let signer = signer();
        let auth = ApiKeyAuthenticator::new(directory(), signer.clone());
        let mut ctx = ctx_with(API_KEY_HEADER, "key-1");
        ctx.metadata
            .insert("user-agent", "cli/2".parse().unwrap());
        ctx.metadata
            .insert("x-client-version", "1.2.3".parse().unwrap());
        auth.intercept(&mut ctx).unwrap();

        let signed = ctx.session.as_ref().unwrap();
        assert!(signer.verify(signed));
        let session = signed.session.as_ref().unwrap();
        assert_eq!(session.service_account_id(), Some("sa-1"));
        assert_eq!(session.role_ids, ["reader"]);
        assert!(!session.authorized);
        let meta = session.metadata.as_ref().unwrap();
        assert_eq!(meta.user_agent, "cli/2");
        assert_eq!(meta.client_version.as_ref().unwrap().to_string(), "1.2.3");
        // Header consumed.
        assert!(ctx.metadata.get(API_KEY_HEADER).is_none());
    }

    #[test]
    fn unknown_key_is_unauthenticated() {
        let auth = ApiKeyAuthenticator::new(directory(), signer());
        let mut ctx = ctx_with(API_KEY_HEADER, "nope");
        let status = auth.intercept(&mut ctx).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn second_identity_is_an_internal_error() {
        let auth = ApiKeyAuthenticator::new(directory(), signer());
        let mut ctx = ctx_with(API_KEY_HEADER, "key-1");
        ctx.session = Some(signer().sign(Session::for_service_account(
            "other",
            ServiceAccountKind::Internal,
            [],
        )));
        let status = auth.intercept(&mut ctx).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Internal);
    }

    #[test]
    fn config_backed_directory_resolves_keys() {
        let config = AuthConfig::from_yaml_str(
            "service_accounts:\n  - id: sa-7\n    api_key: k7\n",
        )
        .unwrap();
        let account = config.resolve("k7").unwrap();
        assert_eq!(account.service_account_id, "sa-7");
        assert!(config.resolve("k8").is_none());
    }

    #[test]
    fn internal_token_mints_internal_identity() {
        let signer = signer();
        let auth = InternalServiceAuthenticator::new(
            "shh",
            "internal-gateway",
            ["internal".to_string()],
            signer.clone(),
        );
        let mut ctx = ctx_with(INTERNAL_SERVICE_HEADER, "shh");
        auth.intercept(&mut ctx).unwrap();
        let session = ctx.session.as_ref().unwrap().session.as_ref().unwrap();
        match &session.identity {
            Some(Identity::ServiceAccount(sa)) => {
                assert_eq!(sa.kind(), ServiceAccountKind::Internal);
                assert_eq!(sa.service_account_id, "internal-gateway");
            }
            other => panic!("unexpected identity: {other:?}"),
        }
        assert!(ctx.metadata.get(INTERNAL_SERVICE_HEADER).is_none());
    }

    #[test]
    fn wrong_internal_token_is_unauthenticated() {
        let auth = InternalServiceAuthenticator::new("shh", "gw", [], signer());
        let mut ctx = ctx_with(INTERNAL_SERVICE_HEADER, "loud");
        assert_eq!(
            auth.intercept(&mut ctx).unwrap_err().code(),
            tonic::Code::Unauthenticated
        );
    }

    struct StaticVerifier;

    impl TokenVerifier for StaticVerifier {
        fn verify(
            &self,
            token: &str,
        ) -> Result<VerifiedUser, Box<dyn std::error::Error + Send + Sync>> {
            if token == "tok" {
                Ok(VerifiedUser {
                    org_id: "org-1".to_string(),
                    user_id: "user-1".to_string(),
                    role_ids: vec!["member".to_string()],
                })
            } else {
                Err("expired".into())
            }
        }
    }

    #[test]
    fn bearer_token_mints_user_identity() {
        let auth = BearerAuthenticator::new(StaticVerifier, signer());
        let mut ctx = ctx_with(AUTHORIZATION_HEADER, "Bearer tok");
        auth.intercept(&mut ctx).unwrap();
        let session = ctx.session.as_ref().unwrap().session.as_ref().unwrap();
        assert_eq!(session.user(), Some(("org-1", "user-1")));
        assert!(ctx.metadata.get(AUTHORIZATION_HEADER).is_none());
    }

    #[test]
    fn bearer_scheme_is_required() {
        let auth = BearerAuthenticator::new(StaticVerifier, signer());
        let mut ctx = ctx_with(AUTHORIZATION_HEADER, "Basic dXNlcg==");
        assert_eq!(
            auth.intercept(&mut ctx).unwrap_err().code(),
            tonic::Code::Unauthenticated
        );
    }

    #[test]
    fn failed_verification_is_unauthenticated() {
        let auth = BearerAuthenticator::new(StaticVerifier, signer());
        let mut ctx = ctx_with(AUTHORIZATION_HEADER, "Bearer bad");
        assert_eq!(
            auth.intercept(&mut ctx).unwrap_err().code(),
            tonic::Code::Unauthenticated
        );
    }
}
