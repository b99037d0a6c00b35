//! Secret retrieval behind a trait, so the pipeline never reads ambient state.

use std::collections::HashMap;

/// Name of the upstream generation API key.
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";

#[async_trait::async_trait]
pub trait SecretProvider: Send + Sync {
    /// Current value of `name`, or `None` when unset or blank.
    async fn secret(&self, name: &str) -> Option<String>;
}

/// Reads secrets from process environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretProvider;

#[async_trait::async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn secret(&self, name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Fixed in-memory secrets.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretProvider {
    values: HashMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

#[async_trait::async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn secret(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
