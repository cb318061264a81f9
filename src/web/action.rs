//! # Failure Actions
//!
//! When a request fails token validation the engine takes exactly one of a
//! closed set of actions. Terminal actions are returned as ordinary
//! [`Response`] values for the middleware boundary to emit; nothing here
//! interrupts the process or retries.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::ProtectConfig;

/// Body of the [`FailureAction::Forbidden`] terminal response.
pub const FORBIDDEN_BODY: &str = "403 Forbidden: cross-site request verification failed.";

/// Body of the [`FailureAction::InternalError`] terminal response.
pub const INTERNAL_ERROR_BODY: &str = "500 Internal Server Error";

/// Response-altering action taken after a failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureAction {
    /// Emit HTTP 403 and terminate the request.
    Forbidden,
    /// Drop the offending parameters (body for mutating requests, query for
    /// GET) and let the request continue as if none were sent.
    ClearParameters,
    /// Redirect to the configured error page, with the configured message as
    /// the terminal body.
    Redirect,
    /// Terminate immediately, emitting only the configured message.
    CustomMessage,
    /// Emit HTTP 500 and terminate the request.
    InternalError,
}

impl FailureAction {
    /// Parses a configured action name.
    ///
    /// Unrecognized names map to [`FailureAction::ClearParameters`], with a
    /// warning naming the value that failed to parse.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "forbidden" | "403" => Self::Forbidden,
            "clear" | "clearparameters" | "strip" => Self::ClearParameters,
            "redirect" => Self::Redirect,
            "message" | "custommessage" => Self::CustomMessage,
            "internalerror" | "500" => Self::InternalError,
            other => {
                tracing::warn!(
                    target: "formguard",
                    action = other,
                    "unrecognized failure action, falling back to clearing parameters"
                );
                Self::ClearParameters
            }
        }
    }
}

/// What the middleware should do with the failed request.
#[derive(Debug)]
pub enum Outcome {
    /// Short-circuit with this response; the handler never runs.
    Terminal(Response),
    /// Continue the request with its parameters discarded.
    StripParameters,
}

/// Maps a failure action to its outcome. Exhaustive over the closed enum.
pub fn dispatch(action: FailureAction, config: &ProtectConfig) -> Outcome {
    match action {
        FailureAction::Forbidden => {
            Outcome::Terminal((StatusCode::FORBIDDEN, FORBIDDEN_BODY).into_response())
        }
        FailureAction::ClearParameters => Outcome::StripParameters,
        FailureAction::Redirect => {
            let message = config
                .error_message
                .clone()
                .unwrap_or_else(|| "request blocked".to_string());
            // validate() guarantees the URL when this action is configured;
            // a missing one still must not emit an open response.
            match config.redirect_url.as_deref() {
                Some(url) => Outcome::Terminal(
                    (
                        StatusCode::FOUND,
                        [(header::LOCATION, url.to_string())],
                        message,
                    )
                        .into_response(),
                ),
                None => Outcome::Terminal(
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response(),
                ),
            }
        }
        FailureAction::CustomMessage => {
            let message = config
                .error_message
                .clone()
                .unwrap_or_else(|| "request blocked".to_string());
            Outcome::Terminal((StatusCode::OK, message).into_response())
        }
        FailureAction::InternalError => Outcome::Terminal(
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn parse_recognizes_every_action() {
        assert_eq!(FailureAction::parse("forbidden"), FailureAction::Forbidden);
        assert_eq!(FailureAction::parse("403"), FailureAction::Forbidden);
        assert_eq!(
            FailureAction::parse("ClearParameters"),
            FailureAction::ClearParameters
        );
        assert_eq!(FailureAction::parse("redirect"), FailureAction::Redirect);
        assert_eq!(
            FailureAction::parse("message"),
            FailureAction::CustomMessage
        );
        assert_eq!(
            FailureAction::parse("internalerror"),
            FailureAction::InternalError
        );
    }

    #[test]
    fn parse_falls_back_to_clear_parameters() {
        assert_eq!(
            FailureAction::parse("launch_missiles"),
            FailureAction::ClearParameters
        );
    }

    #[tokio::test]
    async fn forbidden_emits_403_with_marker_body() {
        let cfg = ProtectConfig::default();
        let Outcome::Terminal(resp) = dispatch(FailureAction::Forbidden, &cfg) else {
            panic!("expected terminal outcome");
        };
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(body_text(resp).await.contains("403"));
    }

    #[test]
    fn clear_parameters_continues_the_request() {
        let cfg = ProtectConfig::default();
        assert!(matches!(
            dispatch(FailureAction::ClearParameters, &cfg),
            Outcome::StripParameters
        ));
    }

    #[tokio::test]
    async fn redirect_points_at_configured_error_page() {
        let cfg = ProtectConfig::default()
            .with_redirect_url("/blocked")
            .with_error_message("go away");
        let Outcome::Terminal(resp) = dispatch(FailureAction::Redirect, &cfg) else {
            panic!("expected terminal outcome");
        };
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/blocked"
        );
        assert_eq!(body_text(resp).await, "go away");
    }

    #[tokio::test]
    async fn custom_message_emits_only_the_message() {
        let cfg = ProtectConfig::default().with_error_message("request refused");
        let Outcome::Terminal(resp) = dispatch(FailureAction::CustomMessage, &cfg) else {
            panic!("expected terminal outcome");
        };
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "request refused");
    }

    #[tokio::test]
    async fn internal_error_emits_500() {
        let cfg = ProtectConfig::default();
        let Outcome::Terminal(resp) = dispatch(FailureAction::InternalError, &cfg) else {
            panic!("expected terminal outcome");
        };
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(resp).await.contains("500"));
    }
}
