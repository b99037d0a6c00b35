//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use crate::auth::{DEFAULT_LOOKUP_TIMEOUT, DEFAULT_LOOKUP_URL};
use crate::gateway::gemini::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::gateway::DEFAULT_MODELS;
use crate::normalize::InputLimits;
use crate::prompts::{available_prompt_slugs, prompt_by_slug, PromptTemplate, DEFAULT_PROMPT};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("unknown prompt template {0:?} (available: {1})")]
    UnknownPrompt(String, String),
    #[error("{0} must be set when bearer auth is enabled")]
    MissingAuthKey(&'static str),
}

/// Which hosting variant to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Every decision request needs a verified bearer token.
    Bearer,
    /// No authentication; preflight answered explicitly.
    Open,
}

impl AuthMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bearer" => Some(Self::Bearer),
            "open" | "none" => Some(Self::Open),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub auth_mode: AuthMode,
    pub prompt: PromptTemplate,
    pub limits: InputLimits,
    pub models: Vec<String>,
    pub gemini_base_url: String,
    pub gemini_timeout: Duration,
    /// Web API key for the identity provider; required in bearer mode.
    pub identity_api_key: Option<String>,
    pub identity_lookup_url: String,
    pub identity_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8080))),
            auth_mode: AuthMode::Bearer,
            prompt: DEFAULT_PROMPT,
            limits: InputLimits::default(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            gemini_timeout: DEFAULT_TIMEOUT,
            identity_api_key: None,
            identity_lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            identity_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(v) = get("CASHFLOW_BIND_ADDR") {
            cfg.bind_addr = v.trim().parse().map_err(|e: std::net::AddrParseError| {
                invalid("CASHFLOW_BIND_ADDR", &v, e.to_string())
            })?;
        }
        if let Some(v) = get("CASHFLOW_AUTH_MODE") {
            cfg.auth_mode = AuthMode::parse(&v)
                .ok_or_else(|| invalid("CASHFLOW_AUTH_MODE", &v, "expected bearer or open"))?;
        }
        if let Some(v) = get("CASHFLOW_PROMPT") {
            cfg.prompt = resolve_prompt(&v)?;
        }
        if let Some(v) = get("CASHFLOW_MAX_LIST_ITEMS") {
            cfg.limits.max_list_items = parse_positive("CASHFLOW_MAX_LIST_ITEMS", &v)?;
        }
        if let Some(v) = get("CASHFLOW_MAX_HISTORY_TURNS") {
            cfg.limits.max_history_turns = parse_positive("CASHFLOW_MAX_HISTORY_TURNS", &v)?;
        }
        if let Some(v) = get("GEMINI_MODELS") {
            cfg.models = parse_models(&v);
            if cfg.models.is_empty() {
                return Err(invalid("GEMINI_MODELS", &v, "no model identifiers"));
            }
        }
        if let Some(v) = get("GEMINI_BASE_URL") {
            cfg.gemini_base_url = v.trim().to_string();
        }
        if let Some(v) = get("GEMINI_TIMEOUT_SECONDS") {
            cfg.gemini_timeout =
                Duration::from_secs(parse_positive("GEMINI_TIMEOUT_SECONDS", &v)? as u64);
        }
        cfg.identity_api_key = get("FIREBASE_WEB_API_KEY").map(|v| v.trim().to_string());
        if let Some(v) = get("IDENTITY_TOOLKIT_URL") {
            cfg.identity_lookup_url = v.trim().to_string();
        }
        if let Some(v) = get("IDENTITY_TOOLKIT_TIMEOUT_SECONDS") {
            cfg.identity_timeout =
                Duration::from_secs(parse_positive("IDENTITY_TOOLKIT_TIMEOUT_SECONDS", &v)? as u64);
        }

        Ok(cfg)
    }

    /// Check cross-field requirements before serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_mode == AuthMode::Bearer && self.identity_api_key.is_none() {
            return Err(ConfigError::MissingAuthKey("FIREBASE_WEB_API_KEY"));
        }
        Ok(())
    }
}

/// Comma-separated model list, order preserved, blanks dropped.
pub fn parse_models(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn resolve_prompt(slug: &str) -> Result<PromptTemplate, ConfigError> {
    prompt_by_slug(slug.trim()).ok_or_else(|| {
        ConfigError::UnknownPrompt(slug.to_string(), available_prompt_slugs().join(", "))
    })
}

fn parse_positive(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(invalid(var, value, "must be greater than zero")),
        Err(e) => Err(invalid(var, value, e.to_string())),
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}
