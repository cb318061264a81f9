//! # Response Rewriting
//!
//! Outgoing HTML pages are rewritten to carry the data the client-side
//! verification script needs: a no-JavaScript warning right after the opening
//! `<body>` tag, two hidden carriers (the active token field name and the
//! JSON list of exempt URL patterns) before `</body>`, and the script tag
//! itself.
//!
//! The rewriter keeps a one-way latch: until a case-insensitive `<html`
//! marker has been observed, every buffer passes through untouched. That is
//! what protects JSON and binary payloads from corruption.

use std::borrow::Cow;

use crate::config::ProtectConfig;

/// `id` of the hidden input carrying the token field name.
pub const TOKEN_NAME_CARRIER_ID: &str = "formguard-token-name";

/// `id` of the hidden input carrying the exempt-URL pattern list as JSON.
pub const EXEMPT_URLS_CARRIER_ID: &str = "formguard-exempt-urls";

/// Rewrites one response stream. The HTML latch is per-instance state, so a
/// fresh rewriter is created for every response.
#[derive(Debug)]
pub struct ResponseRewriter {
    html_seen: bool,
    token_name: String,
    exempt_urls_json: String,
    noscript_warning: String,
    script_url: Option<String>,
}

impl ResponseRewriter {
    /// Builds a rewriter for one response from the engine configuration.
    pub fn new(config: &ProtectConfig) -> Self {
        Self {
            html_seen: false,
            token_name: config.token_name.clone(),
            // Vec<String> serialization cannot fail.
            exempt_urls_json: serde_json::to_string(&config.exempt_urls)
                .unwrap_or_else(|_| "[]".to_string()),
            noscript_warning: config.noscript_warning.clone(),
            script_url: config.script_url.clone(),
        }
    }

    /// Whether the stream has been confirmed to be HTML.
    pub fn is_html(&self) -> bool {
        self.html_seen
    }

    /// Processes one fully assembled buffer.
    ///
    /// Pre-latch buffers are returned borrowed and unmodified. Once `<html`
    /// has been seen the verification data is injected.
    pub fn process<'a>(&mut self, body: &'a str) -> Cow<'a, str> {
        if !self.html_seen {
            if find_ci(body, "<html").is_none() {
                return Cow::Borrowed(body);
            }
            self.html_seen = true;
        }

        let open_body_end = find_ci(body, "<body")
            .and_then(|start| body[start..].find('>').map(|rel| start + rel + 1));
        let close_body = find_ci(body, "</body>");

        let mut out = String::with_capacity(body.len() + 512);
        match (open_body_end, close_body) {
            (Some(open), Some(close)) if open <= close => {
                out.push_str(&body[..open]);
                out.push_str(&self.noscript_block());
                out.push_str(&body[open..close]);
                out.push_str(&self.carriers());
                out.push_str(&self.script_tag());
                out.push_str(&body[close..]);
            }
            (Some(open), _) => {
                // No closing tag: the script still has to load, so it goes at
                // the very end of the buffer.
                out.push_str(&body[..open]);
                out.push_str(&self.noscript_block());
                out.push_str(&body[open..]);
                out.push_str(&self.script_tag());
            }
            (None, Some(close)) => {
                out.push_str(&body[..close]);
                out.push_str(&self.carriers());
                out.push_str(&self.script_tag());
                out.push_str(&body[close..]);
            }
            (None, None) => {
                out.push_str(body);
                out.push_str(&self.script_tag());
            }
        }
        Cow::Owned(out)
    }

    fn noscript_block(&self) -> String {
        format!("<noscript><p>{}</p></noscript>", self.noscript_warning)
    }

    fn carriers(&self) -> String {
        format!(
            "<input type=\"hidden\" id=\"{TOKEN_NAME_CARRIER_ID}\" value=\"{}\">\
             <input type=\"hidden\" id=\"{EXEMPT_URLS_CARRIER_ID}\" value='{}'>",
            self.token_name, self.exempt_urls_json
        )
    }

    fn script_tag(&self) -> String {
        match &self.script_url {
            Some(url) => format!("<script type=\"text/javascript\" src=\"{url}\"></script>"),
            None => String::new(),
        }
    }
}

/// Case-insensitive substring search over ASCII markup.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let (h, n) = (haystack.as_bytes(), needle.as_bytes());
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    h.windows(n.len()).position(|w| w.eq_ignore_ascii_case(n))
}
