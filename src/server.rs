//! HTTP adapters around [`DecisionPipeline`].
//!
//! Two hosting variants share one handler: [`authenticated_router`] requires a
//! verified bearer token, [`open_router`] does not. Both answer CORS preflight
//! through [`CorsLayer`] and allow any origin.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, AUTHORIZATION, CONTENT_TYPE,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, MethodRouter};
use axum::{middleware, Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

use crate::auth::{bearer_token, TokenVerifier};
use crate::decision::Decision;
use crate::pipeline::{DecisionPipeline, PipelineError};

pub const FAILURE_SUMMARY: &str = "Failed to classify transaction intent.";

const CALLER: &str = "server::decide";

#[derive(Clone)]
struct AppState {
    pipeline: DecisionPipeline,
    verifier: Option<Arc<dyn TokenVerifier>>,
}

/// Variant that verifies `Authorization: Bearer <token>` before deciding.
pub fn authenticated_router(pipeline: DecisionPipeline, verifier: Arc<dyn TokenVerifier>) -> Router {
    router(AppState {
        pipeline,
        verifier: Some(verifier),
    })
}

/// Variant without authentication.
pub fn open_router(pipeline: DecisionPipeline) -> Router {
    router(AppState {
        pipeline,
        verifier: None,
    })
}

fn router(state: AppState) -> Router {
    let decision: MethodRouter<Arc<AppState>> = post(decide).fallback(method_not_allowed);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/", decision.clone())
        .route("/v1/decision", decision)
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(middleware::map_response(echo_allowed_methods))
        .with_state(Arc::new(state))
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub decision: Decision,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details: None,
            },
        }
    }

    fn internal(details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                error: FAILURE_SUMMARY.to_string(),
                details: Some(details.into()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        if err.is_caller_error() {
            return ApiError::new(StatusCode::BAD_REQUEST, err.to_string());
        }
        error!(code = err.code(), error = %err, "decision request failed");
        ApiError::internal(err.to_string())
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn decide(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DecisionResponse>, ApiError> {
    if let Some(verifier) = &state.verifier {
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let token = bearer_token(header).map_err(|e| {
            warn!(reason = %e, "rejected request without usable bearer token");
            ApiError::new(StatusCode::UNAUTHORIZED, e.to_string())
        })?;
        verifier
            .verify(token)
            .await
            .map_err(|e| ApiError::new(StatusCode::UNAUTHORIZED, e.to_string()))?;
    }

    let body = parse_body(&body)?;
    let outcome = state.pipeline.decide(&body, CALLER).await?;

    Ok(Json(DecisionResponse {
        decision: outcome.decision,
    }))
}

/// Empty bodies count as `{}`; anything else must be valid JSON.
fn parse_body(bytes: &[u8]) -> Result<Value, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(bytes)
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "Invalid JSON body"))
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

async fn healthz() -> &'static str {
    "ok"
}

/// `CorsLayer` only lists methods and headers on preflight responses; callers
/// expect them on every response, in this exact form.
async fn echo_allowed_methods(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}
