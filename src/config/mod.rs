//! Configuration loading for the protection engine.

pub mod env;
pub mod settings;

pub use settings::{CookieAttributes, ProtectConfig, DEFAULT_NOSCRIPT_WARNING};
