//! # Protection Engine
//!
//! The engine owns everything request validation needs: the configuration,
//! the session store handle, the compiled URL allow-list, the derived custom
//! header key and the audit logger. It is an explicitly constructed value
//! passed by handle into request-scoped code, never global state; only
//! [`Engine::install`] is a once-per-process operation.
//!
//! Validation is a single attempt per request with no retries: mutating
//! requests must present a token that consumes from the session queue, GETs
//! are either exempt by URL pattern or verified against the query parameter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::request::Parts;
use axum::http::{header, Method};

use crate::config::ProtectConfig;
use crate::error::ProtectError;
use crate::session::{MemoryStore, SessionStore};
use crate::token;
use crate::web::action::{self, Outcome};
use crate::web::extract;
use crate::web::matcher::UrlAllowList;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Which verification path a request took, for action selection and audit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Mutating request (POST and the other state-changing verbs).
    Post,
    /// Non-mutating request verified through the query parameter.
    Get,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Get => "GET",
        }
    }
}

/// Result of validating one request.
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict {
    /// A candidate token consumed from the session queue.
    Accepted(RequestKind),
    /// GET matched an exempt URL pattern; no token required.
    Exempt,
    /// No valid token; the configured failure action applies.
    Denied(RequestKind),
}

/// Context handed to the audit sink for every failed validation.
#[derive(Debug)]
pub struct AttackContext<'a> {
    pub host: &'a str,
    pub uri: String,
    pub request_kind: RequestKind,
    pub cookie_token: Option<&'a str>,
}

/// Audit sink invoked exactly once per failed validation, before the failure
/// action runs. Fire-and-forget: nothing it does affects the request.
pub trait AttackLogger: Send + Sync + 'static {
    fn attack_detected(&self, ctx: &AttackContext<'_>);
}

/// Default [`AttackLogger`] emitting a `tracing` warning.
#[derive(Debug, Default, Clone)]
pub struct TracingLogger;

impl AttackLogger for TracingLogger {
    fn attack_detected(&self, ctx: &AttackContext<'_>) {
        tracing::warn!(
            target: "formguard::audit",
            host = ctx.host,
            uri = %ctx.uri,
            request_type = ctx.request_kind.as_str(),
            cookie = ctx.cookie_token.unwrap_or("<none>"),
            "request failed CSRF validation"
        );
    }
}

/// The request-validation engine.
#[derive(Clone)]
pub struct Engine {
    config: Arc<ProtectConfig>,
    store: Arc<dyn SessionStore>,
    logger: Arc<dyn AttackLogger>,
    allow_list: UrlAllowList,
    header_key: String,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("header_key", &self.header_key)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Builds an engine with the in-memory session store and tracing audit
    /// sink. Fails on invalid configuration.
    pub fn new(config: ProtectConfig) -> Result<Self, ProtectError> {
        Self::with_parts(config, Arc::new(MemoryStore::new()), Arc::new(TracingLogger))
    }

    /// Builds an engine over the host's own session store and audit sink.
    pub fn with_parts(
        config: ProtectConfig,
        store: Arc<dyn SessionStore>,
        logger: Arc<dyn AttackLogger>,
    ) -> Result<Self, ProtectError> {
        config.validate()?;
        let allow_list = UrlAllowList::compile(&config.exempt_urls)?;
        let header_key = extract::derive_header_key(&config.token_name);
        Ok(Self {
            config: Arc::new(config),
            store,
            logger,
            allow_list,
            header_key,
        })
    }

    /// Installs the process-wide engine. A second call in the same process
    /// fails with [`ProtectError::AlreadyInstalled`]: running two engines by
    /// accident would mean two token policies fighting over one cookie.
    pub fn install(config: ProtectConfig) -> Result<Arc<Self>, ProtectError> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(ProtectError::AlreadyInstalled);
        }
        match Self::new(config) {
            Ok(engine) => Ok(Arc::new(engine)),
            Err(err) => {
                INSTALLED.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    pub fn config(&self) -> &ProtectConfig {
        &self.config
    }

    /// Validates one request. `body` is the buffered form body for mutating
    /// requests (empty otherwise); `session_id` identifies the host session,
    /// if one exists.
    pub fn verify(&self, parts: &Parts, body: &[u8], session_id: Option<&str>) -> Verdict {
        if is_mutating(&parts.method) {
            if let Some((candidate, source)) =
                extract::candidate_token(parts, body, &self.config, &self.header_key)
            {
                if self.consume(session_id, &candidate) {
                    tracing::debug!(
                        target: "formguard",
                        source = ?source,
                        "mutating request validated"
                    );
                    return Verdict::Accepted(RequestKind::Post);
                }
            }
            return Verdict::Denied(RequestKind::Post);
        }

        let (absolute_url, path) = request_url(parts);
        if self.allow_list.is_exempt(&absolute_url, &path) {
            return Verdict::Exempt;
        }
        if let Some(candidate) = extract::query_token(parts, &self.config.token_name) {
            if self.consume(session_id, &candidate) {
                return Verdict::Accepted(RequestKind::Get);
            }
        }
        Verdict::Denied(RequestKind::Get)
    }

    /// Issues a fresh token: generated, appended to the session queue, and
    /// returned for cookie synchronization. Called after every successful
    /// validation and every exempt GET.
    pub fn refresh(&self, session_id: &str) -> String {
        let token = token::generate(self.config.token_length);
        let mut queue = self.store.load(session_id).unwrap_or_default();
        queue.push(token.clone());
        self.store.store(session_id, queue);
        token
    }

    /// Handles a denied request: logs the attack once, then maps the
    /// configured action for this request kind to its outcome.
    pub fn deny(&self, parts: &Parts, kind: RequestKind) -> Outcome {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let cookie = extract::cookie_token(&parts.headers, &self.config.token_name);
        self.logger.attack_detected(&AttackContext {
            host,
            uri: parts.uri.to_string(),
            request_kind: kind,
            cookie_token: cookie.as_deref(),
        });

        let action = match kind {
            RequestKind::Post => self.config.post_action,
            RequestKind::Get => self.config.get_action,
        };
        action::dispatch(action, &self.config)
    }

    /// Consumes `candidate` from the session queue. Missing session or queue
    /// means validation fails; the queue is written back only when a token
    /// was actually removed.
    fn consume(&self, session_id: Option<&str>, candidate: &str) -> bool {
        let Some(sid) = session_id else {
            return false;
        };
        match self.store.load(sid) {
            Some(mut queue) => {
                if queue.consume(candidate) {
                    self.store.store(sid, queue);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }
}

/// POST by convention, plus the other state-changing verbs.
pub(crate) fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Reconstructs the absolute URL (scheme + host + path) and the bare path.
fn request_url(parts: &Parts) -> (String, String) {
    let scheme = parts.uri.scheme_str().unwrap_or("http");
    let host = parts
        .uri
        .host()
        .map(str::to_string)
        .or_else(|| {
            parts
                .headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();
    let path = parts.uri.path().to_string();
    (format!("{scheme}://{host}{path}"), path)
}
