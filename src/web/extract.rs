//! # Candidate Token Extraction
//!
//! An incoming request can carry its token in several places. The strategies
//! below are tried in order and the first hit wins; [`TokenSource`] records
//! which one produced the candidate. Exemption-based strategies (referer,
//! user-agent) only *select* the cookie value as the candidate — it still has
//! to pass the same queue consumption as any other source.

use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;

use crate::config::ProtectConfig;

/// Where a candidate token was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenSource {
    /// Request-body form field named after the token.
    FormField,
    /// Header literally named after the token field.
    NamedHeader,
    /// Derived custom header (`X-…` form of the token name).
    CustomHeader,
    /// Referer matched an allow pattern; cookie token used.
    RefererExempt,
    /// User-agent exemption matched this URI; cookie token used.
    AgentExempt,
    /// Query parameter named after the token (GET verification).
    QueryParam,
}

/// Derives the custom header key for a token field name: uppercased, with
/// non-alphanumerics replaced by `-`, behind an `X-` prefix.
///
/// # Example
/// ```
/// use formguard::web::extract::derive_header_key;
///
/// assert_eq!(derive_header_key("fg_auth_token"), "X-FG-AUTH-TOKEN");
/// ```
pub fn derive_header_key(token_name: &str) -> String {
    let upper: String = token_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '-'
            }
        })
        .collect();
    format!("X-{upper}")
}

/// Reads the current token cookie, if any.
pub fn cookie_token(headers: &HeaderMap, token_name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(token_name)
        .map(|c| c.value().to_string())
}

/// Reads the token from the query string (the GET verification source).
pub fn query_token(parts: &Parts, token_name: &str) -> Option<String> {
    let query = parts.uri.query()?;
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .ok()?
        .into_iter()
        .find(|(k, _)| k == token_name)
        .map(|(_, v)| v)
}

/// Extracts the candidate token for a mutating request.
///
/// Strategy order, first match wins: form body field, header named after the
/// token, derived custom header, referer allow-match → cookie token,
/// user-agent exemption → cookie token. Returns `None` when no strategy
/// produced a value.
pub fn candidate_token(
    parts: &Parts,
    body: &[u8],
    config: &ProtectConfig,
    header_key: &str,
) -> Option<(String, TokenSource)> {
    if let Some(token) = form_token(body, &config.token_name) {
        return Some((token, TokenSource::FormField));
    }

    if let Some(token) = header_value(&parts.headers, &config.token_name) {
        return Some((token, TokenSource::NamedHeader));
    }

    if let Some(token) = header_value(&parts.headers, header_key) {
        return Some((token, TokenSource::CustomHeader));
    }

    if referer_allowed(&parts.headers, &config.referer_allow) {
        if let Some(token) = cookie_token(&parts.headers, &config.token_name) {
            return Some((token, TokenSource::RefererExempt));
        }
    }

    if agent_exempt(parts, &config.agent_exemptions) {
        if let Some(token) = cookie_token(&parts.headers, &config.token_name) {
            return Some((token, TokenSource::AgentExempt));
        }
    }

    None
}

fn form_token(body: &[u8], token_name: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .ok()?
        .into_iter()
        .find(|(k, _)| k == token_name)
        .map(|(_, v)| v)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Substring match of the referer against any configured allow pattern.
fn referer_allowed(headers: &HeaderMap, allow: &[String]) -> bool {
    if allow.is_empty() {
        return false;
    }
    let Some(referer) = headers.get(header::REFERER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    allow.iter().any(|pattern| referer.contains(pattern.as_str()))
}

/// A mapped user-agent may use the cookie token, but only on its one URI.
fn agent_exempt(parts: &Parts, map: &std::collections::HashMap<String, String>) -> bool {
    if map.is_empty() {
        return false;
    }
    let Some(agent) = parts
        .headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    map.get(agent).is_some_and(|uri| uri == parts.uri.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn parts_for(req: Request<Body>) -> Parts {
        req.into_parts().0
    }

    fn base_config() -> ProtectConfig {
        ProtectConfig::default()
    }

    #[test]
    fn derive_header_key_replaces_non_alphanumerics() {
        assert_eq!(derive_header_key("csrf token.v2"), "X-CSRF-TOKEN-V2");
    }

    #[test]
    fn form_field_wins_over_headers() {
        let cfg = base_config();
        let parts = parts_for(
            Request::post("/submit")
                .header("fg_auth_token", "from-header")
                .body(Body::empty())
                .unwrap(),
        );
        let body = b"a=1&fg_auth_token=from-body&b=2";

        let (token, source) =
            candidate_token(&parts, body, &cfg, "X-FG-AUTH-TOKEN").unwrap();
        assert_eq!(token, "from-body");
        assert_eq!(source, TokenSource::FormField);
    }

    #[test]
    fn named_header_wins_over_custom_header() {
        let cfg = base_config();
        let parts = parts_for(
            Request::post("/submit")
                .header("fg_auth_token", "named")
                .header("X-FG-AUTH-TOKEN", "custom")
                .body(Body::empty())
                .unwrap(),
        );

        let (token, source) = candidate_token(&parts, b"", &cfg, "X-FG-AUTH-TOKEN").unwrap();
        assert_eq!(token, "named");
        assert_eq!(source, TokenSource::NamedHeader);
    }

    #[test]
    fn custom_header_is_used_when_nothing_else_matches() {
        let cfg = base_config();
        let parts = parts_for(
            Request::post("/submit")
                .header("X-FG-AUTH-TOKEN", "custom")
                .body(Body::empty())
                .unwrap(),
        );

        let (token, source) = candidate_token(&parts, b"", &cfg, "X-FG-AUTH-TOKEN").unwrap();
        assert_eq!(token, "custom");
        assert_eq!(source, TokenSource::CustomHeader);
    }

    #[test]
    fn allowed_referer_falls_back_to_cookie_token() {
        let cfg = base_config().with_referer_allow(vec!["trusted.example".into()]);
        let parts = parts_for(
            Request::post("/submit")
                .header("referer", "https://trusted.example/page")
                .header("cookie", "fg_auth_token=cookie-token")
                .body(Body::empty())
                .unwrap(),
        );

        let (token, source) = candidate_token(&parts, b"", &cfg, "X-FG-AUTH-TOKEN").unwrap();
        assert_eq!(token, "cookie-token");
        assert_eq!(source, TokenSource::RefererExempt);
    }

    #[test]
    fn unlisted_referer_produces_no_candidate() {
        let cfg = base_config().with_referer_allow(vec!["trusted.example".into()]);
        let parts = parts_for(
            Request::post("/submit")
                .header("referer", "https://evil.example/page")
                .header("cookie", "fg_auth_token=cookie-token")
                .body(Body::empty())
                .unwrap(),
        );

        assert!(candidate_token(&parts, b"", &cfg, "X-FG-AUTH-TOKEN").is_none());
    }

    #[test]
    fn agent_exemption_requires_the_mapped_uri() {
        let cfg = base_config().with_agent_exemption("probe/1.0", "/status");

        let on_mapped = parts_for(
            Request::post("/status")
                .header("user-agent", "probe/1.0")
                .header("cookie", "fg_auth_token=cookie-token")
                .body(Body::empty())
                .unwrap(),
        );
        let (token, source) =
            candidate_token(&on_mapped, b"", &cfg, "X-FG-AUTH-TOKEN").unwrap();
        assert_eq!(token, "cookie-token");
        assert_eq!(source, TokenSource::AgentExempt);

        let elsewhere = parts_for(
            Request::post("/other")
                .header("user-agent", "probe/1.0")
                .header("cookie", "fg_auth_token=cookie-token")
                .body(Body::empty())
                .unwrap(),
        );
        assert!(candidate_token(&elsewhere, b"", &cfg, "X-FG-AUTH-TOKEN").is_none());
    }

    #[test]
    fn no_strategy_yields_no_candidate() {
        let cfg = base_config();
        let parts = parts_for(Request::post("/submit").body(Body::empty()).unwrap());
        assert!(candidate_token(&parts, b"", &cfg, "X-FG-AUTH-TOKEN").is_none());
    }

    #[test]
    fn query_token_reads_the_configured_parameter() {
        let parts = parts_for(
            Request::get("/page?x=1&fg_auth_token=abc%20d")
                .body(Body::empty())
                .unwrap(),
        );
        assert_eq!(query_token(&parts, "fg_auth_token").as_deref(), Some("abc d"));

        let parts = parts_for(Request::get("/page?x=1").body(Body::empty()).unwrap());
        assert!(query_token(&parts, "fg_auth_token").is_none());
    }
}
