//! Core types for the model gateway.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

// =============================================================================
// ATTRIBUTION
// =============================================================================

/// Attribution for usage accounting and log correlation.
///
/// Every request through the gateway carries attribution so we know:
/// - Which inbound request it belongs to (request_id)
/// - Which code path triggered it (caller)
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    /// Inbound request this call serves (if known).
    pub request_id: Option<Uuid>,
    /// Which code path made this call, for debugging.
    /// Use a static string like "pipeline::decide" or "cli::decide".
    pub caller: &'static str,
}

impl Attribution {
    pub fn new(caller: &'static str) -> Self {
        Self {
            caller,
            ..Default::default()
        }
    }

    pub fn with_request(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

// =============================================================================
// GENERATION TYPES
// =============================================================================

/// Sampling parameters sent with every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    /// Ask for a JSON-typed payload when the upstream supports it.
    pub json_response: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.9,
            json_response: true,
        }
    }
}

/// One generation call against a single model.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model identifier, e.g. "gemini-2.5-flash".
    pub model: String,
    /// Full prompt text, sent as a single user turn.
    pub prompt: String,
    /// API key passed to the upstream as a query parameter.
    pub api_key: String,
    pub config: GenerationConfig,
    pub attribution: Attribution,
}

impl GenerateRequest {
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        api_key: impl Into<String>,
        attribution: Attribution,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            api_key: api_key.into(),
            config: GenerationConfig::default(),
            attribution,
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }
}

/// Successful response from a single model.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// Extracted text (non-empty, trimmed).
    pub text: String,
    /// Prompt tokens, when the upstream reports usage.
    pub input_tokens: u32,
    /// Output tokens, when the upstream reports usage.
    pub output_tokens: u32,
    /// Time taken for the request.
    pub latency: Duration,
}

/// Text returned by the gateway, with the model that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub model: String,
    pub text: String,
    /// Zero-based position of `model` in the candidate chain.
    pub candidate_index: usize,
}
