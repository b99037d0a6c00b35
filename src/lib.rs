#![forbid(unsafe_code)]

//! # cashflow-router
//!
//! Turns a free-form money utterance ("spent 20 on coffee") plus the caller's
//! screen context and recent conversation into a strict routing decision: log
//! it on the main ledger, log it against a shared tour, or ask a clarifying
//! question.
//!
//! Each request is independent. The body is normalized, rendered into a
//! prompt, sent to an ordered chain of Gemini models, and whatever JSON the
//! model produced is coerced into a [`Decision`] with every field present.
//! The HTTP surface lives in [`server`]; the same pipeline backs the CLI.

pub mod auth;
pub mod coerce;
pub mod config;
pub mod decision;
pub mod gateway;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod recovery;
pub mod secrets;
pub mod server;

pub use auth::{AuthError, IdentityToolkitVerifier, TokenVerifier};
pub use config::{AuthMode, ConfigError, ServerConfig};
pub use decision::{normalize_decision, Decision, MainDraft, Mode, TourDraft, TxType};
pub use gateway::{
    Attribution, GatewayConfig, GeminiAdapter, ModelGateway, ProviderError, TextGateway,
    UsageSink,
};
pub use normalize::{normalize_request, InputError, InputLimits, NormalizedInput};
pub use pipeline::{DecisionOutcome, DecisionPipeline, PipelineError};
pub use prompts::PromptTemplate;
pub use recovery::{parse_model_json, RecoveryError};
pub use secrets::{EnvSecretProvider, SecretProvider, StaticSecretProvider};
pub use server::{authenticated_router, open_router};
