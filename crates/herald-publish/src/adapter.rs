use async_trait::async_trait;
use herald_core::Platform;
use herald_integrations::{IntegrationError, TokenCache};
use serde::Serialize;

/// What an adapter needs to publish one scheduled item.
#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest {
    /// Scheduled item id, for log correlation only.
    pub item_id: String,
    pub user_id: String,
    pub business_id: Option<String>,
    pub platform: Platform,
    pub post_text: String,
    pub media_url: Option<String>,
    /// Platform-specific extras (topic type, call-to-action, ...).
    pub platform_options: serde_json::Map<String, serde_json::Value>,
}

/// A post the platform accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Published {
    pub post_id: String,
    pub post_url: Option<String>,
}

/// Common interface for every platform family.
///
/// Adapters make exactly one publish attempt. Retry policy, if any, belongs
/// to the caller.
#[async_trait]
pub trait PublishAdapter: Send + Sync {
    /// Adapter name for logging and error messages.
    fn name(&self) -> &str;

    /// `tokens` is the sweep-scoped refresh cache; adapters that do not use
    /// OAuth ignore it.
    async fn publish(
        &self,
        req: &PublishRequest,
        tokens: &TokenCache,
    ) -> Result<Published, PublishError>;
}

/// Why a publish attempt failed. The `Display` text is what ends up in the
/// scheduled item's `error_message`, so it is written for end users.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// No connected account for the target platform.
    #[error("{0}")]
    IntegrationMissing(String),

    /// The refresh token is invalid; the user must reconnect.
    #[error("authorization expired: {0}")]
    AuthExpired(String),

    /// The platform answered with an error. `message` is the platform's own
    /// text, kept verbatim for diagnostics.
    #[error("{message}")]
    PlatformRejected { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    /// Required server-side configuration (API key, OAuth client) is missing.
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("network error: {0}")]
    Transport(String),

    #[error("unexpected platform response: {0}")]
    InvalidResponse(String),

    /// Local infrastructure failure (credential store unreachable).
    #[error("internal error: {0}")]
    Internal(String),
}

impl PublishError {
    /// True for failures where the same request could succeed later
    /// unchanged. Nothing retries automatically; this is logged so operators
    /// can tell transient failures from ones that need user action.
    pub fn is_transient(&self) -> bool {
        match self {
            PublishError::Timeout | PublishError::Transport(_) => true,
            PublishError::PlatformRejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Short error class for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::IntegrationMissing(_) => "integration_missing",
            PublishError::AuthExpired(_) => "auth_expired",
            PublishError::PlatformRejected { .. } => "platform_rejected",
            PublishError::Timeout => "timeout",
            PublishError::NotConfigured(_) => "not_configured",
            PublishError::Transport(_) => "transport",
            PublishError::InvalidResponse(_) => "invalid_response",
            PublishError::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PublishError::Timeout
        } else if e.is_decode() {
            PublishError::InvalidResponse(e.to_string())
        } else {
            PublishError::Transport(e.to_string())
        }
    }
}

impl From<IntegrationError> for PublishError {
    fn from(e: IntegrationError) -> Self {
        match e {
            IntegrationError::AuthExpired(reason) => PublishError::AuthExpired(reason),
            IntegrationError::Timeout => PublishError::Timeout,
            IntegrationError::Unavailable(reason) => PublishError::Transport(reason),
            IntegrationError::NotConfigured(reason) => PublishError::NotConfigured(reason),
            other => PublishError::Internal(other.to_string()),
        }
    }
}

/// Pull the most useful message out of an upstream error body.
///
/// Handles `{"error": {"message": ".."}}` (Google), `{"error": ".."}` and
/// `{"message": ".."}`; anything else is returned as the raw text.
pub(crate) fn upstream_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            v.pointer("/error/message"),
            v.get("error"),
            v.get("message"),
        ];
        for c in candidates.into_iter().flatten() {
            if let Some(s) = c.as_str() {
                return s.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty error response".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_message_prefers_structured_fields() {
        assert_eq!(
            upstream_message(r#"{"error":{"code":400,"message":"Invalid summary"}}"#),
            "Invalid summary"
        );
        assert_eq!(upstream_message(r#"{"error":"profile not found"}"#), "profile not found");
        assert_eq!(upstream_message(r#"{"message":"slow down"}"#), "slow down");
        assert_eq!(upstream_message("  Bad Gateway \n"), "Bad Gateway");
        assert_eq!(upstream_message(""), "empty error response");
    }

    #[test]
    fn transient_classification() {
        assert!(PublishError::Timeout.is_transient());
        assert!(PublishError::PlatformRejected {
            status: 503,
            message: "down".into()
        }
        .is_transient());
        assert!(PublishError::PlatformRejected {
            status: 429,
            message: "rate".into()
        }
        .is_transient());
        assert!(!PublishError::PlatformRejected {
            status: 400,
            message: "policy".into()
        }
        .is_transient());
        assert!(!PublishError::AuthExpired("x".into()).is_transient());
    }

    #[test]
    fn integration_errors_map_to_publish_errors() {
        assert!(matches!(
            PublishError::from(IntegrationError::AuthExpired("gone".into())),
            PublishError::AuthExpired(ref r) if r == "gone"
        ));
        assert!(matches!(
            PublishError::from(IntegrationError::Timeout),
            PublishError::Timeout
        ));
        assert!(matches!(
            PublishError::from(IntegrationError::LockPoisoned),
            PublishError::Internal(_)
        ));
    }

    #[test]
    fn platform_rejection_displays_platform_text_only() {
        let e = PublishError::PlatformRejected {
            status: 200,
            message: "Instagram requires an image".into(),
        };
        assert_eq!(e.to_string(), "Instagram requires an image");
    }
}
