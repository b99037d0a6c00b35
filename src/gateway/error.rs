//! Error types for the model gateway.

use std::time::Duration;
use thiserror::Error;

/// Additional context from provider errors for debugging.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// HTTP status code from the provider.
    pub http_status: Option<u16>,
    /// Provider status string from the error envelope (e.g. "INVALID_ARGUMENT").
    pub provider_status: Option<String>,
    /// Model the failed call was made against.
    pub model: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_provider_status(mut self, status: impl Into<String>) -> Self {
        self.provider_status = Some(status.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Errors that can occur when calling the generation API.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Invalid request - the prompt is unusable against any model.
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        context: Option<ErrorContext>,
    },

    /// Provider blocked the prompt (safety filter, etc.).
    #[error("refused: {message}")]
    Refused {
        message: String,
        context: Option<ErrorContext>,
    },

    /// Provider returned a non-success status or an unusable envelope.
    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
        context: Option<ErrorContext>,
    },

    /// The response parsed but carried no text.
    #[error("{provider} returned empty content for {model}")]
    EmptyContent {
        provider: &'static str,
        model: String,
    },

    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration, Option<ErrorContext>),

    /// HTTP/network error. Built with `without_url()` so the keyed URL never
    /// reaches messages or logs.
    #[error("http error: {0}")]
    Http(reqwest::Error),

    /// Every candidate model failed; carries the last failure.
    #[error("{reason}")]
    Exhausted { attempts: usize, reason: String },

    /// Configuration error (missing API key, bad base URL, etc.).
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            context: None,
        }
    }

    /// Create a refused error with context.
    pub fn refused(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Refused {
            message: message.into(),
            context: Some(context),
        }
    }

    /// Create a provider error.
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            context: None,
        }
    }

    /// Create a provider error with context.
    pub fn provider_with_context(
        provider: &'static str,
        message: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            context: Some(context),
        }
    }

    /// Create an empty content error.
    pub fn empty_content(provider: &'static str, model: impl Into<String>) -> Self {
        Self::EmptyContent {
            provider,
            model: model.into(),
        }
    }

    /// Create the terminal error raised once the candidate chain is used up.
    pub fn exhausted(attempts: usize, last: Option<&ProviderError>) -> Self {
        let reason = match last {
            Some(err) => err.to_string(),
            None => "all candidate models failed".to_string(),
        };
        Self::Exhausted { attempts, reason }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Refused { .. } => "refused",
            Self::Provider { .. } => "provider_error",
            Self::EmptyContent { .. } => "empty_content",
            Self::Timeout(_, _) => "timeout",
            Self::Http(_) => "http_error",
            Self::Exhausted { .. } => "exhausted",
            Self::Config(_) => "config_error",
        }
    }

    /// Get the error context if available.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::InvalidRequest { context, .. } => context.as_ref(),
            Self::Refused { context, .. } => context.as_ref(),
            Self::Provider { context, .. } => context.as_ref(),
            Self::Timeout(_, context) => context.as_ref(),
            Self::EmptyContent { .. } => None,
            Self::Http(_) => None,
            Self::Exhausted { .. } => None,
            Self::Config(_) => None,
        }
    }

    /// HTTP status reported by the provider, if any.
    pub fn http_status(&self) -> Option<u16> {
        self.context().and_then(|c| c.http_status)
    }
}
