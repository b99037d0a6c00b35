//! Request body → routing decision.
//!
//! The pipeline, in order:
//! 1. **Normalize**: coerce the raw body into a bounded, typed input
//! 2. **Prompt**: render the routing prompt
//! 3. **Generate**: ask the candidate models in order, first usable text wins
//! 4. **Recover**: pull a JSON object out of the model text
//! 5. **Decide**: coerce that object into the strict [`Decision`]
//!
//! Nothing here knows about HTTP; the server and CLI are thin adapters around
//! [`DecisionPipeline`].

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

use crate::decision::{normalize_decision, Decision};
use crate::gateway::{Attribution, ProviderError, TextGateway};
use crate::normalize::{normalize_request, InputError, InputLimits, NormalizedInput};
use crate::prompts::{PromptTemplate, DEFAULT_PROMPT};
use crate::recovery::{parse_model_json, RecoveryError};
use crate::secrets::{SecretProvider, GEMINI_API_KEY};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("Missing {0} secret.")]
    MissingSecret(&'static str),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
}

impl PipelineError {
    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Input(_) => "missing_text",
            Self::MissingSecret(_) => "missing_secret",
            Self::Provider(e) => e.code(),
            Self::Recovery(_) => "invalid_model_json",
        }
    }

    /// Whether the caller, not the system, is at fault.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

/// A decision plus where it came from.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub decision: Decision,
    /// Model that produced the text.
    pub model: String,
    /// Position of `model` in the candidate chain.
    pub candidate_index: usize,
}

/// Run steps 2–5 for an already-normalized input.
pub async fn decide_with(
    gateway: &dyn TextGateway,
    api_key: &str,
    prompt: &PromptTemplate,
    input: &NormalizedInput,
    attribution: Attribution,
) -> Result<DecisionOutcome, PipelineError> {
    let rendered = prompt.render(input);
    debug!(
        template = prompt.slug,
        prompt_chars = rendered.len(),
        history_turns = input.history.len(),
        "rendered prompt"
    );

    let generated = gateway.generate_text(&rendered, api_key, attribution).await?;
    let parsed = parse_model_json(&generated.text)?;
    let decision = normalize_decision(&parsed);

    Ok(DecisionOutcome {
        decision,
        model: generated.model,
        candidate_index: generated.candidate_index,
    })
}

/// The routing pipeline with its collaborators injected.
#[derive(Clone)]
pub struct DecisionPipeline {
    gateway: Arc<dyn TextGateway>,
    secrets: Arc<dyn SecretProvider>,
    prompt: PromptTemplate,
    limits: InputLimits,
}

impl DecisionPipeline {
    pub fn new(gateway: Arc<dyn TextGateway>, secrets: Arc<dyn SecretProvider>) -> Self {
        Self {
            gateway,
            secrets,
            prompt: DEFAULT_PROMPT,
            limits: InputLimits::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_limits(mut self, limits: InputLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Normalize a raw body with this pipeline's limits.
    pub fn normalize(&self, body: &Value) -> Result<NormalizedInput, InputError> {
        normalize_request(body, &self.limits)
    }

    /// Full pipeline for one request body.
    ///
    /// Input is validated before the secret is read, and the secret before any
    /// network call.
    pub async fn decide(
        &self,
        body: &Value,
        caller: &'static str,
    ) -> Result<DecisionOutcome, PipelineError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("decision", request_id = %request_id, caller);

        async move {
            let input = self.normalize(body)?;

            let api_key = self
                .secrets
                .secret(GEMINI_API_KEY)
                .await
                .ok_or(PipelineError::MissingSecret(GEMINI_API_KEY))?;

            let attribution = Attribution::new(caller).with_request(request_id);
            let outcome =
                decide_with(self.gateway.as_ref(), &api_key, &self.prompt, &input, attribution)
                    .await?;

            info!(
                model = %outcome.model,
                candidate = outcome.candidate_index,
                mode = outcome.decision.mode.as_str(),
                confidence = outcome.decision.confidence,
                "decision ready"
            );
            Ok::<_, PipelineError>(outcome)
        }
        .instrument(span)
        .await
    }
}
