//! # Token Cookie Synchronization
//!
//! The newest valid token is mirrored into a client-visible cookie so the
//! injected script (and the referer/user-agent exemption paths) can read it.
//! Attributes come from [`CookieAttributes`](crate::config::CookieAttributes);
//! `HttpOnly` is never set, the client script has to see the value.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::config::ProtectConfig;

/// Builds the token cookie for a freshly issued token.
pub fn token_cookie(config: &ProtectConfig, token: &str) -> Cookie<'static> {
    let attrs = &config.cookie;
    let mut builder = Cookie::build((config.token_name.clone(), token.to_string()))
        .path(attrs.path.clone())
        .same_site(SameSite::Lax)
        .secure(attrs.secure)
        .max_age(Duration::seconds(i64::from(attrs.max_age_secs)));

    if let Some(domain) = &attrs.domain {
        builder = builder.domain(domain.clone());
    }

    builder.build()
}
