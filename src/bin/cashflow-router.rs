#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cashflow_router::config::{resolve_prompt, AuthMode, ConfigError, ServerConfig};
use cashflow_router::gateway::{GatewayConfig, GeminiAdapter, ModelGateway, TracingUsageSink};
use cashflow_router::server::{authenticated_router, open_router};
use cashflow_router::{DecisionPipeline, EnvSecretProvider, IdentityToolkitVerifier};

const CALLER: &str = "cli::decide";

#[derive(Parser)]
#[command(name = "cashflow-router", version, about = "Transaction intent router")]
struct Cli {
    /// Prompt template slug (defaults to CASHFLOW_PROMPT or router_detailed)
    #[arg(long, global = true)]
    prompt_template: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Serve without bearer authentication
        #[arg(long)]
        open: bool,
        /// Comma-separated Gemini model IDs, in fallback order
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
    },
    /// Decide once for a JSON request body
    Decide {
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
    },
    /// Print the prompt that would be sent for a request body
    Prompt {
        #[arg(long)]
        request: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = ServerConfig::from_env()?;
    if let Some(slug) = &cli.prompt_template {
        cfg.prompt = resolve_prompt(slug)?;
    }

    match cli.command {
        Commands::Serve { bind, open, models } => {
            if let Some(bind) = bind {
                cfg.bind_addr = bind;
            }
            if open {
                cfg.auth_mode = AuthMode::Open;
            }
            apply_models(&mut cfg, models);
            cfg.validate()?;
            serve(cfg).await?;
        }
        Commands::Decide {
            request,
            out,
            models,
        } => {
            apply_models(&mut cfg, models);
            let body: Value = read_json(&request)?;
            let pipeline = build_pipeline(&cfg)?;
            let outcome = pipeline.decide(&body, CALLER).await?;
            let payload = json!({ "decision": outcome.decision });
            match out {
                Some(path) => write_json(&path, &payload)?,
                None => {
                    let mut stdout = io::stdout().lock();
                    serde_json::to_writer_pretty(&mut stdout, &payload)?;
                    writeln!(stdout)?;
                }
            }
        }
        Commands::Prompt { request } => {
            let body: Value = read_json(&request)?;
            let input = cashflow_router::normalize_request(&body, &cfg.limits)?;
            println!("{}", cfg.prompt.render(&input));
        }
    }

    Ok(())
}

async fn serve(cfg: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = build_pipeline(&cfg)?;

    let app = match cfg.auth_mode {
        AuthMode::Bearer => {
            let api_key = cfg
                .identity_api_key
                .clone()
                .ok_or(ConfigError::MissingAuthKey("FIREBASE_WEB_API_KEY"))?;
            let verifier = IdentityToolkitVerifier::new(
                cfg.identity_lookup_url.as_str(),
                api_key,
                cfg.identity_timeout,
            )?;
            authenticated_router(pipeline, Arc::new(verifier))
        }
        AuthMode::Open => open_router(pipeline),
    };

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    info!(
        addr = %cfg.bind_addr,
        auth = ?cfg.auth_mode,
        prompt = cfg.prompt.slug,
        models = ?cfg.models,
        "cashflow-router listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_pipeline(cfg: &ServerConfig) -> Result<DecisionPipeline, Box<dyn std::error::Error>> {
    let adapter = GeminiAdapter::with_config(cfg.gemini_base_url.as_str(), cfg.gemini_timeout)?;
    let gateway = ModelGateway::with_config(
        adapter,
        Arc::new(TracingUsageSink),
        GatewayConfig::with_models(cfg.models.iter().cloned()),
    );
    Ok(DecisionPipeline::new(Arc::new(gateway), Arc::new(EnvSecretProvider))
        .with_prompt(cfg.prompt)
        .with_limits(cfg.limits))
}

fn apply_models(cfg: &mut ServerConfig, models: Vec<String>) {
    let models: Vec<String> = models
        .into_iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    if !models.is_empty() {
        cfg.models = models;
    }
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &PathBuf,
) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
