//! Gemini adapter for `generateContent`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ErrorContext, ProviderError};
use super::types::*;

// =============================================================================
// TRAIT
// =============================================================================

/// Trait for text generation providers.
///
/// One call is one attempt against one model; fallback across models lives in
/// [`super::ModelGateway`].
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, ProviderError>;
}

// =============================================================================
// GEMINI ADAPTER
// =============================================================================

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum allowed response body length (1MB).
const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Maximum allowed prompt length in characters.
const MAX_INPUT_CHARS: usize = 500_000;

const PROVIDER: &str = "gemini";

/// Gemini API adapter.
#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl GeminiAdapter {
    /// Create with custom configuration.
    pub fn with_config(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ProviderError::config("Gemini base URL is empty"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model)
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateApiRequest<'a> {
    contents: [ApiContent<'a>; 1],
    generation_config: ApiGenerationConfig,
}

#[derive(Serialize)]
struct ApiContent<'a> {
    role: &'static str,
    parts: [ApiPart<'a>; 1],
}

#[derive(Serialize)]
struct ApiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

impl From<GenerationConfig> for ApiGenerationConfig {
    fn from(c: GenerationConfig) -> Self {
        Self {
            temperature: c.temperature,
            top_p: c.top_p,
            response_mime_type: c.json_response.then_some("application/json"),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateApiResponse {
    #[serde(default)]
    candidates: Option<Value>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    status: Option<String>,
}

/// Extract text from the candidate list.
///
/// Each candidate's parts are trimmed and joined with newlines; the first
/// candidate producing non-empty text wins. Entries of the wrong shape
/// (null candidates, parts without string text) are skipped.
fn extract_text(candidates: &Value) -> Option<String> {
    candidates.as_array()?.iter().find_map(|candidate| {
        let parts = candidate.pointer("/content/parts")?.as_array()?;
        let joined = parts
            .iter()
            .map(|part| part.get("text").and_then(Value::as_str).map_or("", str::trim))
            .collect::<Vec<_>>()
            .join("\n");
        let joined = joined.trim();
        (!joined.is_empty()).then(|| joined.to_string())
    })
}

// =============================================================================
// GENERATION PROVIDER IMPL
// =============================================================================

#[async_trait]
impl GenerationProvider for GeminiAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let prompt_chars = req.prompt.chars().count();
        if prompt_chars > MAX_INPUT_CHARS {
            return Err(ProviderError::invalid_request(format!(
                "Prompt too large: {prompt_chars} chars (max {MAX_INPUT_CHARS})"
            )));
        }
        if req.api_key.trim().is_empty() {
            return Err(ProviderError::config("Gemini API key is empty"));
        }

        let start = Instant::now();
        let model = req.model.as_str();

        let api_req = GenerateApiRequest {
            contents: [ApiContent {
                role: "user",
                parts: [ApiPart { text: &req.prompt }],
            }],
            generation_config: req.config.into(),
        };

        let mut response = self
            .client
            .post(self.generate_url(model))
            .query(&[("key", req.api_key.as_str())])
            .json(&api_req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(
                        self.timeout,
                        Some(ErrorContext::new().with_model(model)),
                    )
                } else {
                    // The URL carries the API key.
                    ProviderError::Http(e.without_url())
                }
            })?;

        let status = response.status();

        // Stream response to enforce size limit
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProviderError::Http(e.without_url()))?
        {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(ProviderError::provider(
                    PROVIDER,
                    format!("Response too large for {model}: {new_len} bytes"),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let body = String::from_utf8_lossy(&bytes).to_string();
        let ctx = ErrorContext::new()
            .with_status(status.as_u16())
            .with_model(model);

        if !status.is_success() {
            let ctx = match serde_json::from_str::<ApiErrorEnvelope>(&body)
                .ok()
                .and_then(|env| env.error)
                .and_then(|e| e.status)
            {
                Some(provider_status) => ctx.with_provider_status(provider_status),
                None => ctx,
            };
            return Err(ProviderError::provider_with_context(
                PROVIDER,
                format!("request failed for {model} ({}): {body}", status.as_u16()),
                ctx,
            ));
        }

        let parsed: GenerateApiResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::provider_with_context(
                PROVIDER,
                format!("invalid response envelope from {model}: {e}"),
                ctx.clone(),
            )
        })?;

        let candidates = parsed.candidates.unwrap_or(Value::Null);
        let Some(text) = extract_text(&candidates) else {
            if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(ProviderError::refused(
                    format!("prompt blocked for {model}: {reason}"),
                    ctx,
                ));
            }
            return Err(ProviderError::empty_content(PROVIDER, model));
        };

        let (input_tokens, output_tokens) = parsed
            .usage_metadata
            .map(|u| {
                (
                    u.prompt_token_count.unwrap_or(0),
                    u.candidates_token_count.unwrap_or(0),
                )
            })
            .unwrap_or((0, 0));

        Ok(GenerateResponse {
            text,
            input_tokens,
            output_tokens,
            latency: start.elapsed(),
        })
    }
}
