//! # Protection Settings Loader
//!
//! Central configuration for the CSRF engine: token field name and length,
//! per-method failure actions, GET exemption patterns, referer and user-agent
//! exemptions, user-facing messages, the client script URL and token cookie
//! attributes.
//!
//! Values are read from environment variables, with `.env` files loaded for
//! non-production `APP_ENV` values. All keys are optional at load time;
//! [`ProtectConfig::validate`] enforces the combinations that must be present
//! before an engine will start (see [`crate::error::ProtectError`]).
//!
//! # Environment Variables
//! | Variable | Description | Default |
//! |-----------|-------------|----------|
//! | `FORMGUARD_TOKEN_NAME` | Form/query field and cookie carrying the token | `"fg_auth_token"` |
//! | `FORMGUARD_TOKEN_LENGTH` | Token length in characters (`0` clamps to 32) | `32` |
//! | `FORMGUARD_POST_ACTION` | Failure action for mutating requests | `forbidden` |
//! | `FORMGUARD_GET_ACTION` | Failure action for GET requests | `forbidden` |
//! | `FORMGUARD_EXEMPT_URLS` | Comma-separated globs exempting GETs | *none* |
//! | `FORMGUARD_REFERER_ALLOW` | Comma-separated referer substrings | *none* |
//! | `FORMGUARD_AGENT_EXEMPTIONS` | `user-agent=uri` pairs, comma-separated | *none* |
//! | `FORMGUARD_NOSCRIPT_WARNING` | Text shown to no-JavaScript clients | built-in text |
//! | `FORMGUARD_SCRIPT_URL` | Client verification script to inject | *none* |
//! | `FORMGUARD_REDIRECT_URL` | Error page for the `redirect` action | *none* |
//! | `FORMGUARD_ERROR_MESSAGE` | Body for the `message`/`redirect` actions | *none* |
//! | `FORMGUARD_SESSION_COOKIE` | Cookie identifying the host session | `"sid"` |
//! | `FORMGUARD_COOKIE_PATH` | Token cookie `Path` | `"/"` |
//! | `FORMGUARD_COOKIE_DOMAIN` | Token cookie `Domain` | *none* |
//! | `FORMGUARD_COOKIE_SECURE` | Token cookie `Secure` flag | `true` |
//! | `FORMGUARD_COOKIE_MAX_AGE` | Token cookie lifetime in seconds | `1800` |
//!
//! # Example
//! ```rust,no_run
//! use formguard::config::settings::ProtectConfig;
//!
//! let cfg = ProtectConfig::from_env();
//! assert_eq!(cfg.token_name, "fg_auth_token");
//! ```

use std::collections::HashMap;
use std::env;

use crate::config::env::{read_flag_from, read_list_from, read_map_from, read_u32_from};
use crate::error::ProtectError;
use crate::token::DEFAULT_TOKEN_LENGTH;
use crate::web::action::FailureAction;

/// Default warning shown to clients with JavaScript disabled.
pub const DEFAULT_NOSCRIPT_WARNING: &str =
    "This site verifies requests with JavaScript. Some actions will be refused while it is disabled.";

/// Attributes applied to the client-visible token cookie.
///
/// The cookie must stay readable by the injected client script, so there is
/// deliberately no `HttpOnly` option here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieAttributes {
    /// Cookie `Path` attribute.
    pub path: String,
    /// Cookie `Domain` attribute, if any.
    pub domain: Option<String>,
    /// Whether to set the `Secure` flag.
    pub secure: bool,
    /// Lifetime relative to issuance, in seconds.
    pub max_age_secs: u32,
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            secure: true,
            max_age_secs: 1800,
        }
    }
}

/// Read-only configuration consumed by the engine.
#[derive(Clone, Debug)]
pub struct ProtectConfig {
    /// Name of the form field, query parameter and cookie carrying the token.
    pub token_name: String,
    /// Token length in characters. Zero clamps to the default at generation.
    pub token_length: u32,
    /// Action taken when a mutating request fails validation.
    pub post_action: FailureAction,
    /// Action taken when a GET request fails validation.
    pub get_action: FailureAction,
    /// Glob patterns for URLs exempt from GET verification.
    pub exempt_urls: Vec<String>,
    /// Referer substrings allowed to fall back to the cookie token.
    pub referer_allow: Vec<String>,
    /// `user-agent -> request path` pairs allowed to fall back to the cookie
    /// token when calling exactly that path.
    pub agent_exemptions: HashMap<String, String>,
    /// Warning text injected for clients with JavaScript disabled.
    pub noscript_warning: String,
    /// URL of the client-side verification script, if one should be injected.
    pub script_url: Option<String>,
    /// Error page used by [`FailureAction::Redirect`].
    pub redirect_url: Option<String>,
    /// Message emitted by [`FailureAction::CustomMessage`] and as the
    /// terminal body of redirects.
    pub error_message: Option<String>,
    /// Name of the host session cookie used to key the token queue.
    pub session_cookie: String,
    /// Token cookie attributes.
    pub cookie: CookieAttributes,
}

impl Default for ProtectConfig {
    fn default() -> Self {
        Self {
            token_name: "fg_auth_token".to_string(),
            token_length: DEFAULT_TOKEN_LENGTH,
            post_action: FailureAction::Forbidden,
            get_action: FailureAction::Forbidden,
            exempt_urls: Vec::new(),
            referer_allow: Vec::new(),
            agent_exemptions: HashMap::new(),
            noscript_warning: DEFAULT_NOSCRIPT_WARNING.to_string(),
            script_url: None,
            redirect_url: None,
            error_message: None,
            session_cookie: "sid".to_string(),
            cookie: CookieAttributes::default(),
        }
    }
}

impl ProtectConfig {
    /// Creates a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from environment variables.
    ///
    /// Loads `.env` (or `.env.{APP_ENV}` / `DOTENV_FILE`) first unless
    /// `APP_ENV` is `production`.
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        if app_env != "production" {
            if let Ok(path) = env::var("DOTENV_FILE") {
                let _ = dotenvy::from_filename(path);
            } else {
                let candidate = format!(".env.{}", app_env);
                dotenvy::from_filename(&candidate)
                    .or_else(|_| dotenvy::dotenv())
                    .ok();
            }
        }
        Self::from_env_with(|k| env::var(k).ok())
    }

    /// Loads configuration using a custom key provider (for testing/mocking).
    pub fn from_env_with<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            token_name: non_empty("FORMGUARD_TOKEN_NAME").unwrap_or(defaults.token_name),
            token_length: read_u32_from(&get, "FORMGUARD_TOKEN_LENGTH", DEFAULT_TOKEN_LENGTH),
            post_action: non_empty("FORMGUARD_POST_ACTION")
                .map(|v| FailureAction::parse(&v))
                .unwrap_or(defaults.post_action),
            get_action: non_empty("FORMGUARD_GET_ACTION")
                .map(|v| FailureAction::parse(&v))
                .unwrap_or(defaults.get_action),
            exempt_urls: read_list_from(&get, "FORMGUARD_EXEMPT_URLS"),
            referer_allow: read_list_from(&get, "FORMGUARD_REFERER_ALLOW"),
            agent_exemptions: read_map_from(&get, "FORMGUARD_AGENT_EXEMPTIONS"),
            noscript_warning: non_empty("FORMGUARD_NOSCRIPT_WARNING")
                .unwrap_or(defaults.noscript_warning),
            script_url: non_empty("FORMGUARD_SCRIPT_URL"),
            redirect_url: non_empty("FORMGUARD_REDIRECT_URL"),
            error_message: non_empty("FORMGUARD_ERROR_MESSAGE"),
            session_cookie: non_empty("FORMGUARD_SESSION_COOKIE").unwrap_or(defaults.session_cookie),
            cookie: CookieAttributes {
                path: non_empty("FORMGUARD_COOKIE_PATH").unwrap_or(defaults.cookie.path),
                domain: non_empty("FORMGUARD_COOKIE_DOMAIN"),
                secure: read_flag_from(&get, "FORMGUARD_COOKIE_SECURE", true),
                max_age_secs: read_u32_from(&get, "FORMGUARD_COOKIE_MAX_AGE", 1800),
            },
        }
    }

    /// Verifies that the configuration is complete enough to protect with.
    ///
    /// The engine refuses to start on a violation rather than run with a
    /// half-configured policy.
    pub fn validate(&self) -> Result<(), ProtectError> {
        if self.token_name.is_empty() {
            return Err(ProtectError::MissingConfig("FORMGUARD_TOKEN_NAME"));
        }
        if self.session_cookie.is_empty() {
            return Err(ProtectError::MissingConfig("FORMGUARD_SESSION_COOKIE"));
        }
        let actions = [self.post_action, self.get_action];
        if actions.contains(&FailureAction::Redirect) && self.redirect_url.is_none() {
            return Err(ProtectError::MissingConfig("FORMGUARD_REDIRECT_URL"));
        }
        if actions.contains(&FailureAction::CustomMessage) && self.error_message.is_none() {
            return Err(ProtectError::MissingConfig("FORMGUARD_ERROR_MESSAGE"));
        }
        Ok(())
    }

    /// Sets the token field/cookie name.
    pub fn with_token_name(mut self, name: impl Into<String>) -> Self {
        self.token_name = name.into();
        self
    }

    /// Sets the token length.
    pub fn with_token_length(mut self, length: u32) -> Self {
        self.token_length = length;
        self
    }

    /// Sets the failure action for mutating requests.
    pub fn with_post_action(mut self, action: FailureAction) -> Self {
        self.post_action = action;
        self
    }

    /// Sets the failure action for GET requests.
    pub fn with_get_action(mut self, action: FailureAction) -> Self {
        self.get_action = action;
        self
    }

    /// Sets the GET exemption glob patterns.
    pub fn with_exempt_urls(mut self, patterns: Vec<String>) -> Self {
        self.exempt_urls = patterns;
        self
    }

    /// Sets the referer substrings allowed to use the cookie token.
    pub fn with_referer_allow(mut self, substrings: Vec<String>) -> Self {
        self.referer_allow = substrings;
        self
    }

    /// Adds one `user-agent -> path` exemption.
    pub fn with_agent_exemption(
        mut self,
        agent: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        self.agent_exemptions.insert(agent.into(), path.into());
        self
    }

    /// Sets the client script URL.
    pub fn with_script_url(mut self, url: impl Into<String>) -> Self {
        self.script_url = Some(url.into());
        self
    }

    /// Sets the error page for the redirect action.
    pub fn with_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    /// Sets the terminal error message.
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Sets the host session cookie name.
    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    /// Sets the token cookie attributes.
    pub fn with_cookie(mut self, cookie: CookieAttributes) -> Self {
        self.cookie = cookie;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete_and_valid() {
        let cfg = ProtectConfig::default();
        assert_eq!(cfg.token_name, "fg_auth_token");
        assert_eq!(cfg.token_length, DEFAULT_TOKEN_LENGTH);
        assert_eq!(cfg.post_action, FailureAction::Forbidden);
        assert_eq!(cfg.cookie.path, "/");
        assert!(cfg.cookie.secure);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn from_env_with_reads_all_sections() {
        let fake = |k: &str| -> Option<String> {
            match k {
                "FORMGUARD_TOKEN_NAME" => Some("xsrf".into()),
                "FORMGUARD_TOKEN_LENGTH" => Some("48".into()),
                "FORMGUARD_POST_ACTION" => Some("clear".into()),
                "FORMGUARD_GET_ACTION" => Some("redirect".into()),
                "FORMGUARD_EXEMPT_URLS" => Some("/health,/public/*".into()),
                "FORMGUARD_REFERER_ALLOW" => Some("trusted.example".into()),
                "FORMGUARD_AGENT_EXEMPTIONS" => Some("probe/1.0=/status".into()),
                "FORMGUARD_REDIRECT_URL" => Some("/error".into()),
                "FORMGUARD_SESSION_COOKIE" => Some("session".into()),
                "FORMGUARD_COOKIE_SECURE" => Some("false".into()),
                "FORMGUARD_COOKIE_MAX_AGE" => Some("600".into()),
                _ => None,
            }
        };

        let cfg = ProtectConfig::from_env_with(fake);
        assert_eq!(cfg.token_name, "xsrf");
        assert_eq!(cfg.token_length, 48);
        assert_eq!(cfg.post_action, FailureAction::ClearParameters);
        assert_eq!(cfg.get_action, FailureAction::Redirect);
        assert_eq!(cfg.exempt_urls, vec!["/health", "/public/*"]);
        assert_eq!(cfg.referer_allow, vec!["trusted.example"]);
        assert_eq!(
            cfg.agent_exemptions.get("probe/1.0").map(String::as_str),
            Some("/status")
        );
        assert_eq!(cfg.redirect_url.as_deref(), Some("/error"));
        assert_eq!(cfg.session_cookie, "session");
        assert!(!cfg.cookie.secure);
        assert_eq!(cfg.cookie.max_age_secs, 600);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn from_env_reads_process_environment() {
        temp_env::with_vars(
            vec![
                ("APP_ENV", Some("production")),
                ("FORMGUARD_TOKEN_NAME", Some("env_token")),
            ],
            || {
                let cfg = ProtectConfig::from_env();
                assert_eq!(cfg.token_name, "env_token");
            },
        );
    }

    #[test]
    fn validate_requires_redirect_url_for_redirect_action() {
        let cfg = ProtectConfig::default().with_get_action(FailureAction::Redirect);
        assert!(matches!(
            cfg.validate(),
            Err(ProtectError::MissingConfig("FORMGUARD_REDIRECT_URL"))
        ));

        let cfg = cfg.with_redirect_url("/error");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_requires_message_for_custom_message_action() {
        let cfg = ProtectConfig::default().with_post_action(FailureAction::CustomMessage);
        assert!(matches!(
            cfg.validate(),
            Err(ProtectError::MissingConfig("FORMGUARD_ERROR_MESSAGE"))
        ));

        let cfg = cfg.with_error_message("request refused");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_token_name() {
        let cfg = ProtectConfig::default().with_token_name("");
        assert!(matches!(
            cfg.validate(),
            Err(ProtectError::MissingConfig("FORMGUARD_TOKEN_NAME"))
        ));
    }
}
