//! # URL Allow-list Matching
//!
//! Decides whether a GET request is exempt from token verification. Patterns
//! are simple globs: `*` matches any sequence, everything else is literal.
//! They are translated to anchored regular expressions once, at engine
//! construction; an invalid pattern is a fatal configuration error.

use regex::Regex;

use crate::error::ProtectError;

/// Compiled set of exemption patterns.
#[derive(Debug, Clone, Default)]
pub struct UrlAllowList {
    patterns: Vec<Regex>,
}

impl UrlAllowList {
    /// Compiles glob patterns into anchored matchers.
    pub fn compile(globs: &[String]) -> Result<Self, ProtectError> {
        let mut patterns = Vec::with_capacity(globs.len());
        for glob in globs {
            let expr = glob_to_regex(glob);
            let regex = Regex::new(&expr).map_err(|source| ProtectError::InvalidPattern {
                pattern: glob.clone(),
                source,
            })?;
            patterns.push(regex);
        }
        Ok(Self { patterns })
    }

    /// Returns `true` when any pattern matches either the request path or the
    /// reconstructed absolute URL. No patterns means nothing is exempt.
    pub fn is_exempt(&self, absolute_url: &str, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.is_match(path) || p.is_match(absolute_url))
    }

    /// Whether any patterns are configured at all.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Translates one glob into an anchored regex, escaping everything but `*`.
/// Each `*` becomes `.*`, including leading and trailing ones, so the segment
/// position decides where the wildcards go, not the expression built so far.
fn glob_to_regex(glob: &str) -> String {
    let mut expr = String::with_capacity(glob.len() + 8);
    expr.push('^');
    let mut segments = glob.split('*');
    if let Some(first) = segments.next() {
        expr.push_str(&regex::escape(first));
    }
    for segment in segments {
        expr.push_str(".*");
        expr.push_str(&regex::escape(segment));
    }
    expr.push('$');
    expr
}
