use thiserror::Error;

/// Fatal errors raised while setting up CSRF protection.
///
/// These only occur at initialization time. Once an [`Engine`](crate::Engine)
/// exists, validation failures are handled by the configured
/// [`FailureAction`](crate::FailureAction) and never surface here.
///
/// # Example
/// ```
/// use formguard::ProtectError;
///
/// let err = ProtectError::MissingConfig("FORMGUARD_REDIRECT_URL");
/// assert_eq!(
///     err.to_string(),
///     "required configuration value FORMGUARD_REDIRECT_URL is missing"
/// );
/// ```
#[derive(Debug, Error)]
pub enum ProtectError {
    /// A configuration key required by the selected failure action (or by the
    /// engine itself) was not provided. The engine refuses to start rather
    /// than run unprotected.
    #[error("required configuration value {0} is missing")]
    MissingConfig(&'static str),

    /// An exempt-URL glob did not translate into a valid matching expression.
    #[error("invalid exempt-URL pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// [`Engine::install`](crate::Engine::install) was called a second time
    /// in the same process.
    #[error("CSRF protection engine is already installed for this process")]
    AlreadyInstalled,
}
