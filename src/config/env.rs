//! # Environment Variable Utilities
//!
//! Helpers for reading configuration values from environment variables with
//! common type conversions: boolean flags, numbers, comma-separated lists and
//! `key=value` maps.
//!
//! Every reader has a `*_from` variant taking a provider closure so
//! configuration loading can be exercised without touching the real process
//! environment.
//!
//! # Examples
//! ```rust,no_run
//! use formguard::config::env::{read_flag, read_u32};
//!
//! let secure = read_flag("FORMGUARD_COOKIE_SECURE", true);
//! let length = read_u32("FORMGUARD_TOKEN_LENGTH", 32);
//! ```

/// Reads a boolean flag from an environment variable.
///
/// Returns `true` for any of the following case-insensitive values:
/// `"1"`, `"true"`, `"yes"`, `"on"`.
pub fn read_flag(name: &str, default: bool) -> bool {
    read_flag_from(|k| std::env::var(k).ok(), name, default)
}

/// Reads a boolean flag using a custom provider function.
///
/// # Example
/// ```rust
/// use formguard::config::env::read_flag_from;
///
/// assert!(read_flag_from(|_| Some("yes".into()), "SECURE", false));
/// ```
pub fn read_flag_from<F>(provider: F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match provider(name) {
        Some(v) => {
            let s = v.trim().trim_matches(|c| c == '"' || c == '\'');
            matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
        }
        None => default,
    }
}

/// Reads an unsigned integer (`u32`) from an environment variable,
/// returning the provided default if parsing fails.
pub fn read_u32(name: &str, default: u32) -> u32 {
    read_u32_from(|k| std::env::var(k).ok(), name, default)
}

/// Reads a `u32` using a custom provider function.
pub fn read_u32_from<F>(provider: F, name: &str, default: u32) -> u32
where
    F: Fn(&str) -> Option<String>,
{
    provider(name)
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

/// Reads a comma-separated list, trimming entries and dropping empty ones.
///
/// # Example
/// ```rust
/// use formguard::config::env::read_list_from;
///
/// let urls = read_list_from(|_| Some(" /health , ,/public/* ".into()), "X");
/// assert_eq!(urls, vec!["/health", "/public/*"]);
/// ```
pub fn read_list_from<F>(provider: F, name: &str) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    provider(name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Reads a comma-separated `key=value` map.
///
/// Entries without `=` are ignored. Keys and values are trimmed.
///
/// # Example
/// ```rust
/// use formguard::config::env::read_map_from;
///
/// let map = read_map_from(|_| Some("probe/1.0=/status, bad".into()), "X");
/// assert_eq!(map.get("probe/1.0").map(String::as_str), Some("/status"));
/// assert_eq!(map.len(), 1);
/// ```
pub fn read_map_from<F>(provider: F, name: &str) -> std::collections::HashMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    provider(name)
        .map(|raw| {
            raw.split(',')
                .filter_map(|pair| {
                    let (k, v) = pair.split_once('=')?;
                    let (k, v) = (k.trim(), v.trim());
                    if k.is_empty() || v.is_empty() {
                        None
                    } else {
                        Some((k.to_string(), v.to_string()))
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}
