//! HTTP-facing pieces: failure actions, token extraction, the exemption
//! matcher, the response rewriter, the token cookie, and the tower layer
//! tying them together.

pub mod action;
pub mod cookie;
pub mod extract;
pub mod matcher;
pub mod middleware;
pub mod rewrite;

pub use action::{FailureAction, Outcome};
pub use matcher::UrlAllowList;
pub use middleware::{ProtectLayer, ProtectService};
pub use rewrite::ResponseRewriter;
