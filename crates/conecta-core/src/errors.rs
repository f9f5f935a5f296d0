use std::time::Duration;

/// Typed error hierarchy for generative gateway operations.
/// Classifies errors as fatal (don't retry), retryable, or operational.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GatewayError {
    // Fatal — don't retry
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Retryable
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("provider overloaded")]
    ProviderOverloaded,
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    // Operational
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::ServerError { .. }
                | Self::ProviderOverloaded
                | Self::NetworkError(_)
                | Self::MalformedResponse(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::InvalidRequest(_))
    }

    pub fn suggested_delay(&self) -> Option<Duration> {
        if let Self::RateLimited { retry_after } = self {
            *retry_after
        } else {
            None
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::ProviderOverloaded => "provider_overloaded",
            Self::NetworkError(_) => "network_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            400 => Self::InvalidRequest(body),
            429 => Self::RateLimited { retry_after: None },
            529 => Self::ProviderOverloaded,
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(GatewayError::RateLimited { retry_after: None }.is_retryable());
        assert!(GatewayError::ServerError { status: 500, body: "err".into() }.is_retryable());
        assert!(GatewayError::ProviderOverloaded.is_retryable());
        assert!(GatewayError::NetworkError("tcp".into()).is_retryable());
        assert!(GatewayError::MalformedResponse("not json".into()).is_retryable());
    }

    #[test]
    fn fatal_classification() {
        assert!(GatewayError::AuthenticationFailed("bad key".into()).is_fatal());
        assert!(GatewayError::InvalidRequest("bad".into()).is_fatal());
    }

    #[test]
    fn timeout_is_neither_retryable_nor_fatal() {
        let timeout = GatewayError::Timeout(Duration::from_secs(30));
        assert!(!timeout.is_retryable());
        assert!(!timeout.is_fatal());
    }

    #[test]
    fn suggested_delay_only_for_rate_limit() {
        let rl = GatewayError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(rl.suggested_delay(), Some(Duration::from_secs(5)));

        let se = GatewayError::ServerError { status: 500, body: "err".into() };
        assert_eq!(se.suggested_delay(), None);
    }

    #[test]
    fn from_status_mapping() {
        assert!(GatewayError::from_status(401, "unauthorized".into()).is_fatal());
        assert!(GatewayError::from_status(403, "forbidden".into()).is_fatal());
        assert!(GatewayError::from_status(400, "bad request".into()).is_fatal());
        assert!(GatewayError::from_status(429, "rate limited".into()).is_retryable());
        assert!(GatewayError::from_status(529, "overloaded".into()).is_retryable());
        assert!(GatewayError::from_status(500, "internal".into()).is_retryable());
        assert!(GatewayError::from_status(502, "bad gateway".into()).is_retryable());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(GatewayError::ProviderOverloaded.error_kind(), "provider_overloaded");
        assert_eq!(GatewayError::MalformedResponse("x".into()).error_kind(), "malformed_response");
        assert_eq!(
            GatewayError::RateLimited { retry_after: None }.error_kind(),
            "rate_limited"
        );
    }
}
