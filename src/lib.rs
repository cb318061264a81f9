//! # formguard
//!
//! Synchronizer-token CSRF protection for axum services.
//!
//! Every response carries a fresh one-time token in a client-visible cookie,
//! and HTML pages are rewritten on the way out so a small client script can
//! attach that token to forms and requests. Incoming mutating requests must
//! present a token that is still queued for their session; a hit consumes
//! the matching token together with everything older, so replays fail. What
//! happens on a failed check is configurable per request kind (reject,
//! strip the parameters, redirect, custom message).
//!
//! Configuration comes from `FORMGUARD_*` environment variables (see
//! [`config::settings`]) or from the [`ProtectConfig`] builder directly.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{routing::post, Router};
//! use formguard::{Engine, ProtectConfig, ProtectLayer};
//!
//! # fn main() -> Result<(), formguard::ProtectError> {
//! let config = ProtectConfig::from_env()
//!     .with_exempt_urls(vec!["/api/*".into()])
//!     .with_script_url("/static/formguard.js");
//! let engine = Engine::install(config)?;
//!
//! let app: Router = Router::new()
//!     .route("/orders", post(|| async { "created" }))
//!     .layer(ProtectLayer::new(engine));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod token;
pub mod web;

pub use config::{CookieAttributes, ProtectConfig};
pub use engine::{AttackContext, AttackLogger, Engine, RequestKind, TracingLogger, Verdict};
pub use error::ProtectError;
pub use session::{MemoryStore, SessionStore, TokenQueue};
pub use web::{FailureAction, Outcome, ProtectLayer, ProtectService};
