//! Model gateway: ordered candidate fallback over a generation provider.

pub mod error;
pub mod gemini;
pub mod types;
pub mod usage;

use std::sync::Arc;

use tracing::{debug, warn};

pub use gemini::{GeminiAdapter, GenerationProvider};
use usage::{ProviderCallRecord, UsageSink as UsageSinkTrait};

pub use error::{ErrorContext, ProviderError};
pub use types::*;
pub use usage::{NoopUsageSink, TracingUsageSink, UsageSink};

/// Default candidate chain; earlier entries are preferred.
pub const DEFAULT_MODELS: [&str; 2] = ["gemini-2.5-flash", "gemini-2.0-flash"];

/// Gateway seen by the pipeline: prompt in, first usable text out.
#[async_trait::async_trait]
pub trait TextGateway: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        api_key: &str,
        attribution: Attribution,
    ) -> Result<GeneratedText, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Ordered candidate model identifiers.
    pub models: Vec<String>,
    pub generation: GenerationConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            generation: GenerationConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn with_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

pub struct ModelGateway<P: GenerationProvider = GeminiAdapter, U: UsageSinkTrait = NoopUsageSink> {
    provider: P,
    usage_sink: Arc<U>,
    config: GatewayConfig,
}

#[async_trait::async_trait]
impl<P: GenerationProvider, U: UsageSinkTrait> TextGateway for ModelGateway<P, U> {
    async fn generate_text(
        &self,
        prompt: &str,
        api_key: &str,
        attribution: Attribution,
    ) -> Result<GeneratedText, ProviderError> {
        ModelGateway::generate_text(self, prompt, api_key, attribution).await
    }
}

impl<P: GenerationProvider, U: UsageSinkTrait> ModelGateway<P, U> {
    pub fn with_config(provider: P, usage_sink: Arc<U>, config: GatewayConfig) -> Self {
        Self {
            provider,
            usage_sink,
            config,
        }
    }

    /// Try each candidate model once, in order, and return the first text.
    ///
    /// Any per-candidate failure advances to the next model. When the chain is
    /// used up the returned error carries the last failure.
    pub async fn generate_text(
        &self,
        prompt: &str,
        api_key: &str,
        attribution: Attribution,
    ) -> Result<GeneratedText, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for (index, model) in self.config.models.iter().enumerate() {
            let req = GenerateRequest::new(model, prompt, api_key, attribution.clone())
                .with_config(self.config.generation);

            match self.provider.generate(&req).await {
                Ok(resp) => {
                    self.record_success(&req, index, &resp).await;
                    debug!(model = %model, candidate = index, "generation succeeded");
                    return Ok(GeneratedText {
                        model: model.clone(),
                        text: resp.text,
                        candidate_index: index,
                    });
                }
                Err(err) => {
                    self.record_failure(&req, index, &err).await;
                    warn!(
                        model = %model,
                        candidate = index,
                        code = err.code(),
                        provider_status = err
                            .context()
                            .and_then(|c| c.provider_status.as_deref())
                            .unwrap_or(""),
                        error = %err,
                        "candidate model failed; trying next"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(ProviderError::exhausted(
            self.config.models.len(),
            last_error.as_ref(),
        ))
    }

    async fn record_success(&self, req: &GenerateRequest, index: usize, resp: &GenerateResponse) {
        let record = self
            .base_record(req, index)
            .tokens(resp.input_tokens, resp.output_tokens)
            .latency(resp.latency.as_millis() as u64);
        self.usage_sink.record(record).await;
    }

    async fn record_failure(&self, req: &GenerateRequest, index: usize, err: &ProviderError) {
        let record = self
            .base_record(req, index)
            .error(err.code(), err.http_status());
        self.usage_sink.record(record).await;
    }

    fn base_record(&self, req: &GenerateRequest, index: usize) -> ProviderCallRecord {
        ProviderCallRecord::new(
            self.provider.name(),
            "generateContent",
            &req.model,
            req.attribution.caller,
        )
        .candidate(index)
        .request(req.attribution.request_id)
    }
}
