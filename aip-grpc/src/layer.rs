use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{HeaderValue, Request, Response};
use pin_project_lite::pin_project;
use tonic::metadata::MetadataMap;
use tonic::Status;
use tower::{Layer, Service};
use tracing::Instrument;

use aip_session::CurrentSession;

use crate::chain::{AuthChain, CallContext};

/// Tower layer mounting an [`AuthChain`] in front of a gRPC router.
///
/// The full method name is the request's URI path; gRPC metadata maps
/// onto the HTTP headers. A rejected call answers with a trailers-only
/// response carrying `grpc-status`/`grpc-message`; an accepted call
/// proceeds with rewritten headers, the session in its extensions, and
/// the handler future instrumented with a span carrying the session's
/// identity fields.
#[derive(Clone)]
pub struct AuthLayer {
    chain: Arc<AuthChain>,
}

impl AuthLayer {
    pub fn new(chain: AuthChain) -> Self {
        Self {
            chain: Arc::new(chain),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> AuthService<S> {
        AuthService {
            inner,
            chain: self.chain.clone(),
        }
    }
}

/// The service produced by [`AuthLayer`].
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    chain: Arc<AuthChain>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AuthService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    ReqBody: Send + 'static,
    ResBody: http_body::Body<Data = Bytes> + Send + 'static,
{
    type Response = Response<AuthBody<ResBody>>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // The readiness we polled belongs to this clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let (mut parts, body) = request.into_parts();
        let headers = std::mem::take(&mut parts.headers);
        let mut ctx = CallContext::new(
            parts.uri.path().to_string(),
            MetadataMap::from_headers(headers),
        );

        match self.chain.run(&mut ctx) {
            Err(status) => {
                tracing::debug!(
                    method = %ctx.full_method,
                    code = ?status.code(),
                    "call rejected by interceptor chain"
                );
                let response = rejection(&status);
                Box::pin(std::future::ready(Ok(response)))
            }
            Ok(()) => {
                let span = call_span(&ctx);
                parts.headers = ctx.metadata.into_headers();
                if let Some(signed) = ctx.session {
                    parts.extensions.insert(CurrentSession(signed));
                }
                let request = Request::from_parts(parts, body);
                Box::pin(
                    async move {
                        let response = inner.call(request).await?;
                        Ok(response.map(|inner| AuthBody::Inner { inner }))
                    }
                    .instrument(span),
                )
            }
        }
    }
}

/// Per-call span with the session fields projected into the logging
/// context.
fn call_span(ctx: &CallContext) -> tracing::Span {
    let span = tracing::info_span!(
        "grpc_call",
        method = %ctx.full_method,
        session_id = tracing::field::Empty,
        org_id = tracing::field::Empty,
        user_id = tracing::field::Empty,
        service_account_id = tracing::field::Empty,
        peer_ip = tracing::field::Empty,
        user_agent = tracing::field::Empty,
        client_version = tracing::field::Empty,
    );
    let Some(session) = ctx.session.as_ref().and_then(|signed| signed.session.as_ref()) else {
        return span;
    };
    span.record("session_id", session.id.as_str());
    if let Some((org_id, user_id)) = session.user() {
        span.record("org_id", org_id);
        span.record("user_id", user_id);
    }
    if let Some(account_id) = session.service_account_id() {
        span.record("service_account_id", account_id);
    }
    if let Some(metadata) = &session.metadata {
        if !metadata.ip.is_empty() {
            span.record("peer_ip", metadata.ip.as_str());
        }
        if !metadata.user_agent.is_empty() {
            span.record("user_agent", metadata.user_agent.as_str());
        }
        if let Some(version) = &metadata.client_version {
            span.record("client_version", tracing::field::display(version));
        }
    }
    span
}

/// Trailers-only gRPC rejection: HTTP 200 with the status in headers
/// and an empty body.
fn rejection<B>(status: &Status) -> Response<AuthBody<B>> {
    let mut response = Response::new(AuthBody::Empty);
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/grpc"),
    );
    headers.insert("grpc-status", HeaderValue::from(status.code() as i32));
    if let Ok(message) = HeaderValue::from_str(status.message()) {
        headers.insert("grpc-message", message);
    }
    response
}

pin_project! {
    /// Response body of [`AuthService`]: the inner service's body, or
    /// the empty body of a rejection.
    #[project = AuthBodyProj]
    pub enum AuthBody<B> {
        Inner { #[pin] inner: B },
        Empty,
    }
}

impl<B> http_body::Body for AuthBody<B>
where
    B: http_body::Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            AuthBodyProj::Inner { inner } => inner.poll_frame(cx),
            AuthBodyProj::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            AuthBody::Inner { inner } => inner.is_end_stream(),
            AuthBody::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            AuthBody::Inner { inner } => inner.size_hint(),
            AuthBody::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}
