//! Usage tracking via the UsageSink trait.
//!
//! The gateway logs every candidate attempt through a UsageSink. This decouples
//! the gateway from any specific reporting backend:
//! - The server uses TracingUsageSink (structured log lines)
//! - Tests use NoopUsageSink or a recording sink

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Status of a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

/// Record of a single generation attempt.
#[derive(Debug, Clone)]
pub struct ProviderCallRecord {
    /// Provider name: "gemini".
    pub provider: &'static str,
    /// Endpoint: "generateContent".
    pub endpoint: &'static str,
    /// Model used.
    pub model: String,
    /// Position in the candidate chain.
    pub candidate_index: usize,
    /// Input tokens consumed.
    pub input_tokens: u32,
    /// Output tokens generated.
    pub output_tokens: u32,
    /// Inbound request this attempt served (if known).
    pub request_id: Option<Uuid>,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Call status.
    pub status: CallStatus,
    /// Error code if status is Error.
    pub error_code: Option<String>,
    /// HTTP status reported by the provider, if any.
    pub http_status: Option<u16>,
    /// Which code path made this call.
    pub caller: &'static str,
    /// When the call was made.
    pub timestamp: DateTime<Utc>,
}

impl ProviderCallRecord {
    /// Create a new record with required fields, defaulting others.
    pub fn new(
        provider: &'static str,
        endpoint: &'static str,
        model: impl Into<String>,
        caller: &'static str,
    ) -> Self {
        Self {
            provider,
            endpoint,
            model: model.into(),
            candidate_index: 0,
            input_tokens: 0,
            output_tokens: 0,
            request_id: None,
            latency_ms: 0,
            status: CallStatus::Success,
            error_code: None,
            http_status: None,
            caller,
            timestamp: Utc::now(),
        }
    }

    pub fn candidate(mut self, index: usize) -> Self {
        self.candidate_index = index;
        self
    }

    pub fn tokens(mut self, input: u32, output: u32) -> Self {
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }

    pub fn request(mut self, request_id: Option<Uuid>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn latency(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn error(mut self, code: impl Into<String>, http_status: Option<u16>) -> Self {
        self.status = CallStatus::Error;
        self.error_code = Some(code.into());
        self.http_status = http_status;
        self
    }
}

/// Trait for recording provider call usage.
#[async_trait]
pub trait UsageSink: Send + Sync {
    /// Record a provider call. This should be fire-and-forget:
    /// failures should be logged but not propagated.
    async fn record(&self, record: ProviderCallRecord);
}

/// No-op usage sink that discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    async fn record(&self, _record: ProviderCallRecord) {}
}

/// Usage sink that emits one structured `tracing` event per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUsageSink;

#[async_trait]
impl UsageSink for TracingUsageSink {
    async fn record(&self, record: ProviderCallRecord) {
        tracing::info!(
            target: "cashflow_router::usage",
            provider = record.provider,
            endpoint = record.endpoint,
            model = %record.model,
            candidate = record.candidate_index,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            latency_ms = record.latency_ms,
            status = record.status.as_str(),
            error_code = record.error_code.as_deref().unwrap_or(""),
            http_status = record.http_status.unwrap_or(0),
            caller = record.caller,
            request_id = %record.request_id.map(|id| id.to_string()).unwrap_or_default(),
            "provider call"
        );
    }
}
