use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;
use tonic::metadata::MetadataMap;
use tower::{Layer, Service};

use aip_grpc::{
    ApiKeyAccount, ApiKeyAuthenticator, AuthChain, AuthConfig, AuthLayer, CallContext,
    MethodRegistry, PermissionInterceptor, SessionEgress, SessionIngress, API_KEY_HEADER,
};
use aip_session::{CurrentSession, SessionSigner, SignedSession};

fn signer() -> Arc<SessionSigner> {
    Arc::new(SessionSigner::new(b"shared-secret".to_vec()))
}

fn registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    registry
        .add_service("users.UserService", ["GetUser", "ListUsers", "UpdateUser"])
        .add_service("health.Health", ["Check"]);
    registry
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

fn config() -> AuthConfig {
    AuthConfig::from_yaml_str(
        r#"
roles:
  - id: reader
    permissions: ["/users.UserService/GetUser", "/users.UserService/ListUsers"]
public_methods:
  - /health.Health/Check
"#,
    )
    .unwrap()
}

fn full_chain(signer: Arc<SessionSigner>) -> AuthChain {
    AuthChain::new()
        .with(SessionIngress)
        .with(ApiKeyAuthenticator::new(directory(), signer.clone()))
        .with(PermissionInterceptor::must_new(
            &config(),
            &registry(),
            signer,
        ))
        .with(SessionEgress)
}

#[test]
fn anonymous_call_to_private_method_is_unauthenticated() {
    let chain = full_chain(signer());
    let mut ctx = CallContext::new("/users.UserService/GetUser", MetadataMap::new());
    let status = chain.run(&mut ctx).unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unauthenticated);
}

#[test]
fn anonymous_call_to_public_method_passes() {
    let chain = full_chain(signer());
    let mut ctx = CallContext::new("/health.Health/Check", MetadataMap::new());
    chain.run(&mut ctx).unwrap();
    assert!(ctx.session.is_none());
}

#[test]
fn api_key_flow_authorizes_and_emits_the_resigned_session() {
    let signer = signer();
    let chain = full_chain(signer.clone());

    let mut metadata = MetadataMap::new();
    metadata.insert(API_KEY_HEADER, "key-1".parse().unwrap());
    let mut ctx = CallContext::new("/users.UserService/GetUser", metadata);
    chain.run(&mut ctx).unwrap();

    // The slot holds the re-signed, authorized session.
    let signed = ctx.session.as_ref().unwrap();
    assert!(signer.verify(signed));
    let session = signed.session.as_ref().unwrap();
    assert!(session.authorized);
    assert_eq!(session.service_account_id(), Some("sa-1"));
    assert_eq!(session.role_ids, ["reader"]);

    // The api key header was consumed; the egress header carries the
    // session for the next hop.
    assert!(ctx.metadata.get(API_KEY_HEADER).is_none());
    assert_eq!(
        aip_session::decode_metadata(&ctx.metadata).unwrap().as_ref(),
        Some(signed)
    );
}

#[test]
fn second_hop_trusts_the_authorized_bit_without_rechecking() {
    let signer = signer();
    let first_hop = full_chain(signer.clone());

    let mut metadata = MetadataMap::new();
    metadata.insert(API_KEY_HEADER, "key-1".parse().unwrap());
    let mut first = CallContext::new("/users.UserService/GetUser", metadata);
    first_hop.run(&mut first).unwrap();

    // The second hop grants `reader` nothing for this method, but the
    // verified authorized bit short-circuits the check.
    let second_config = AuthConfig::from_yaml_str("roles:\n  - id: reader\n").unwrap();
    let second_hop = AuthChain::new()
        .with(SessionIngress)
        .with(PermissionInterceptor::must_new(
            &second_config,
            &registry(),
            signer.clone(),
        ))
        .with(SessionEgress);

    let mut second = CallContext::new("/users.UserService/UpdateUser", first.metadata);
    second_hop.run(&mut second).unwrap();
    assert!(second.session.unwrap().session.unwrap().authorized);
}

#[test]
fn tampered_session_header_is_rejected_downstream() {
    let signer = signer();
    let first_hop = full_chain(signer.clone());

    let mut metadata = MetadataMap::new();
    metadata.insert(API_KEY_HEADER, "key-1".parse().unwrap());
    let mut first = CallContext::new("/users.UserService/GetUser", metadata);
    first_hop.run(&mut first).unwrap();

    // Grant the tampered session an extra role before the next hop.
    let mut forged = first.session.clone().unwrap();
    forged.session.as_mut().unwrap().role_ids.push("admin".to_string());
    let mut metadata = MetadataMap::new();
    aip_session::encode_metadata(&forged, &mut metadata);

    let second_hop = AuthChain::new()
        .with(SessionIngress)
        .with(PermissionInterceptor::must_new(
            &config(),
            &registry(),
            signer,
        ));
    let mut second = CallContext::new("/users.UserService/GetUser", metadata);
    let status = second_hop.run(&mut second).unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unauthenticated);
}

#[test]
fn denied_method_is_permission_denied() {
    let chain = full_chain(signer());
    let mut metadata = MetadataMap::new();
    metadata.insert(API_KEY_HEADER, "key-1".parse().unwrap());
    let mut ctx = CallContext::new("/users.UserService/UpdateUser", metadata);
    let status = chain.run(&mut ctx).unwrap_err();
    assert_eq!(status.code(), tonic::Code::PermissionDenied);
}

/// Inner service capturing the session extension the layer injected.
#[derive(Clone)]
struct Capture {
    seen: Arc<Mutex<Option<SignedSession>>>,
}

impl Service<http::Request<()>> for Capture {
    type Response = http::Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = std::future::Ready<Result<Self::Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<()>) -> Self::Future {
        let signed = request
            .extensions()
            .get::<CurrentSession>()
            .map(|current| current.0.clone());
        *self.seen.lock().unwrap() = signed;
        std::future::ready(Ok(http::Response::new(Full::new(Bytes::from_static(b"ok")))))
    }
}

async fn ready_and_call<S>(
    service: &mut S,
    request: http::Request<()>,
) -> Result<S::Response, S::Error>
where
    S: Service<http::Request<()>>,
{
    std::future::poll_fn(|cx| service.poll_ready(cx)).await?;
    service.call(request).await
}

#[tokio::test]
async fn layer_injects_the_session_extension() {
    let signer = signer();
    let seen = Arc::new(Mutex::new(None));
    let mut service = AuthLayer::new(full_chain(signer.clone())).layer(Capture { seen: seen.clone() });

    let request = http::Request::builder()
        .uri("/users.UserService/GetUser")
        .header(API_KEY_HEADER, "key-1")
        .body(())
        .unwrap();
    let response = ready_and_call(&mut service, request).await.unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    assert!(response.headers().get("grpc-status").is_none());

    let signed = seen.lock().unwrap().clone().unwrap();
    assert!(signer.verify(&signed));
    assert!(signed.session.unwrap().authorized);
}

#[tokio::test]
async fn layer_rejects_with_trailers_only_status() {
    let seen = Arc::new(Mutex::new(None));
    let mut service = AuthLayer::new(full_chain(signer())).layer(Capture { seen: seen.clone() });

    let request = http::Request::builder()
        .uri("/users.UserService/GetUser")
        .body(())
        .unwrap();
    let response = ready_and_call(&mut service, request).await.unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(
        response.headers().get("grpc-status").unwrap().to_str().unwrap(),
        (tonic::Code::Unauthenticated as i32).to_string()
    );
    // The inner service never ran.
    assert!(seen.lock().unwrap().is_none());
}
