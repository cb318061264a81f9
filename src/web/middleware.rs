//! # Protection Middleware
//!
//! Tower [`Layer`]/[`Service`] pair wiring the engine into an axum router.
//!
//! Per request: the host session is resolved from its cookie, mutating form
//! bodies are buffered so the token field can be read, and the engine issues
//! its verdict. Denied requests are logged and short-circuited (or stripped
//! of their parameters) according to the configured action. Forwarded
//! responses are collected, rewritten when they turn out to be HTML, and the
//! refreshed token is mirrored into the client cookie.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{routing::post, Router};
//! use formguard::{Engine, ProtectConfig, ProtectLayer};
//!
//! let engine = Arc::new(Engine::new(ProtectConfig::from_env()).expect("valid config"));
//! let app: Router = Router::new()
//!     .route("/submit", post(|| async { "ok" }))
//!     .layer(ProtectLayer::new(engine));
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use tower::{Layer, Service};

use crate::config::ProtectConfig;
use crate::engine::{is_mutating, Engine, RequestKind, Verdict};
use crate::web::action::Outcome;
use crate::web::cookie::token_cookie;
use crate::web::rewrite::ResponseRewriter;

/// Layer applying CSRF protection to every route beneath it.
#[derive(Clone, Debug)]
pub struct ProtectLayer {
    engine: Arc<Engine>,
}

impl ProtectLayer {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

impl<S> Layer<S> for ProtectLayer {
    type Service = ProtectService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ProtectService {
            inner,
            engine: self.engine.clone(),
        }
    }
}

/// Service produced by [`ProtectLayer`].
#[derive(Clone, Debug)]
pub struct ProtectService<S> {
    inner: S,
    engine: Arc<Engine>,
}

impl<S> Service<Request<Body>> for ProtectService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let engine = self.engine.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();

            let session_id = CookieJar::from_headers(&parts.headers)
                .get(&engine.config().session_cookie)
                .map(|c| c.value().to_string());

            // Form bodies of mutating requests are buffered so the token
            // field can be extracted; everything else streams through.
            let (buffered, body) = if is_mutating(&parts.method) && is_form(&parts) {
                match axum::body::to_bytes(body, usize::MAX).await {
                    Ok(bytes) => (Some(bytes.clone()), Body::from(bytes)),
                    Err(err) => {
                        tracing::error!(target: "formguard", error = %err, "failed to buffer request body");
                        return Ok(
                            (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
                                .into_response(),
                        );
                    }
                }
            } else {
                (None, body)
            };

            let verdict = engine.verify(
                &parts,
                buffered.as_deref().unwrap_or(&[]),
                session_id.as_deref(),
            );

            let (body, refresh) = match verdict {
                Verdict::Accepted(_) | Verdict::Exempt => (body, true),
                Verdict::Denied(kind) => match engine.deny(&parts, kind) {
                    Outcome::Terminal(response) => return Ok(response),
                    Outcome::StripParameters => (strip_parameters(&mut parts, kind, body), false),
                },
            };

            let response = inner.call(Request::from_parts(parts, body)).await?;

            let (mut rparts, rbody) = response.into_parts();
            let bytes = match axum::body::to_bytes(rbody, usize::MAX).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::error!(target: "formguard", error = %err, "failed to buffer response body");
                    return Ok(
                        (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
                            .into_response(),
                    );
                }
            };
            let bytes = rewrite_body(engine.config(), bytes, &mut rparts.headers);

            if refresh {
                if let Some(sid) = session_id.as_deref() {
                    let token = engine.refresh(sid);
                    let cookie = token_cookie(engine.config(), &token);
                    match HeaderValue::from_str(&cookie.to_string()) {
                        Ok(value) => {
                            rparts.headers.append(header::SET_COOKIE, value);
                        }
                        Err(err) => {
                            tracing::error!(target: "formguard", error = %err, "token cookie not header-safe");
                        }
                    }
                }
            }

            Ok(Response::from_parts(rparts, Body::from(bytes)))
        })
    }
}

fn is_form(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Implements the clear-parameters action: mutating requests lose their
/// body, GETs lose their query string, and the request continues.
fn strip_parameters(parts: &mut Parts, kind: RequestKind, body: Body) -> Body {
    match kind {
        RequestKind::Post => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Body::empty()
        }
        RequestKind::Get => {
            if let Ok(path_only) = Uri::try_from(parts.uri.path()) {
                parts.uri = path_only;
            }
            body
        }
    }
}

/// Runs the response rewriter over a UTF-8 body. Non-text payloads and
/// pre-latch (non-HTML) buffers pass through byte-for-byte.
fn rewrite_body(
    config: &ProtectConfig,
    bytes: Bytes,
    headers: &mut axum::http::HeaderMap,
) -> Bytes {
    let rewritten = match std::str::from_utf8(&bytes) {
        Ok(text) => {
            let mut rewriter = ResponseRewriter::new(config);
            match rewriter.process(text) {
                Cow::Owned(out) => Some(out),
                Cow::Borrowed(_) => None,
            }
        }
        Err(_) => None,
    };

    match rewritten {
        Some(out) => {
            // Length changed; let the server recompute it.
            headers.remove(header::CONTENT_LENGTH);
            Bytes::from(out)
        }
        None => bytes,
    }
}
