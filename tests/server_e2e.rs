use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use cashflow_router::auth::{AuthError, TokenVerifier};
use cashflow_router::gateway::{GatewayConfig, GeminiAdapter, ModelGateway, NoopUsageSink};
use cashflow_router::secrets::{StaticSecretProvider, GEMINI_API_KEY};
use cashflow_router::server::{authenticated_router, open_router};
use cashflow_router::DecisionPipeline;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FLASH: &str = "/gemini-2.5-flash:generateContent";

struct AcceptOnly(&'static str);

#[async_trait::async_trait]
impl TokenVerifier for AcceptOnly {
    async fn verify(&self, token: &str) -> Result<(), AuthError> {
        if token == self.0 {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

async fn upstream_replying(text: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })))
        .mount(&server)
        .await;
    server
}

fn pipeline(server: &MockServer, api_key: Option<&str>) -> DecisionPipeline {
    let adapter = GeminiAdapter::with_config(server.uri(), Duration::from_secs(5)).unwrap();
    let gateway = ModelGateway::with_config(
        adapter,
        Arc::new(NoopUsageSink),
        GatewayConfig::with_models(["gemini-2.5-flash"]),
    );
    let secrets = match api_key {
        Some(key) => StaticSecretProvider::new().with(GEMINI_API_KEY, key),
        None => StaticSecretProvider::new(),
    };
    DecisionPipeline::new(Arc::new(gateway), Arc::new(secrets))
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_with_auth(body: &str, authorization: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, authorization)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, bytes.to_vec())
}

async fn send_json(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, _, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn coffee_expense_routes_to_main() {
    let server =
        upstream_replying(r#"{"mode":"main","confidence":0.92,"main":{"amount":20,"type":"expense"}}"#)
            .await;
    let app = open_router(pipeline(&server, Some("k")));

    let (status, body) = send_json(app, post("/", r#"{"text":"spent 20 on coffee"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "decision": {
                "mode": "main",
                "confidence": 0.92,
                "missingFields": [],
                "clarificationQuestion": null,
                "assistantMessage": null,
                "main": {
                    "amount": 20.0, "type": "expense", "accountName": null,
                    "categoryName": null, "dateIso": null, "note": null
                },
                "tour": {
                    "amount": null, "tourId": null, "tourName": null,
                    "contributorName": null, "sharerNames": [], "dateIso": null, "note": null
                }
            }
        })
    );
}

#[tokio::test]
async fn versioned_route_serves_the_same_handler() {
    let server = upstream_replying(r#"{"mode":"tour","tour":{"tourId":"t1","amount":"15.5"}}"#).await;
    let app = open_router(pipeline(&server, Some("k")));

    let (status, body) = send_json(app, post("/v1/decision", r#"{"text":"15.5 for dinner"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"]["mode"], "tour");
    assert_eq!(body["decision"]["tour"]["tourId"], "t1");
    assert_eq!(body["decision"]["tour"]["amount"], json!(15.5));
}

#[tokio::test]
async fn non_post_methods_are_rejected_with_cors() {
    let server = MockServer::start().await;
    let app = open_router(pipeline(&server, Some("k")));

    let req = Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let (status, headers, bytes) = send(app, req).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        serde_json::from_slice::<Value>(&bytes).unwrap(),
        json!({"error": "Method not allowed"})
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn preflight_is_answered_without_auth() {
    let server = MockServer::start().await;
    let app = authenticated_router(pipeline(&server, Some("k")), Arc::new(AcceptOnly("good")));

    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/v1/decision")
        .header(header::ORIGIN, "https://app.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,authorization")
        .body(Body::empty())
        .unwrap();
    let (status, headers, bytes) = send(app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert!(bytes.is_empty());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
}

#[tokio::test]
async fn missing_or_blank_text_is_bad_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    for body in [r#"{}"#, r#"{"text":"   "}"#, r#"{"text":20}"#, r#"[1,2]"#, ""] {
        let app = open_router(pipeline(&server, Some("k")));
        let (status, json) = send_json(app, post("/", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(json, json!({"error": "Missing text"}), "body {body:?}");
    }
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let server = MockServer::start().await;
    let app = open_router(pipeline(&server, Some("k")));

    let (status, json) = send_json(app, post("/", "{\"text\": ")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"error": "Invalid JSON body"}));
}

#[tokio::test]
async fn bearer_variant_rejects_bad_credentials() {
    let server = MockServer::start().await;
    let body = r#"{"text":"spent 20 on coffee"}"#;

    let cases = [
        (None, "Missing bearer token"),
        (Some("Token good"), "Missing bearer token"),
        (Some("Bearer   "), "Empty bearer token"),
        (Some("Bearer forged"), "Invalid auth token"),
    ];

    for (authorization, expected) in cases {
        let app = authenticated_router(pipeline(&server, Some("k")), Arc::new(AcceptOnly("good")));
        let req = match authorization {
            Some(value) => post_with_auth(body, value),
            None => post("/", body),
        };
        let (status, json) = send_json(app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{authorization:?}");
        assert_eq!(json, json!({"error": expected}), "{authorization:?}");
    }
}

#[tokio::test]
async fn bearer_variant_accepts_verified_token() {
    let server = upstream_replying(r#"{"mode":"clarify","clarificationQuestion":"Which account?"}"#).await;
    let app = authenticated_router(pipeline(&server, Some("k")), Arc::new(AcceptOnly("good")));

    let (status, json) = send_json(
        app,
        post_with_auth(r#"{"text":"paid 40"}"#, "Bearer good"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["decision"]["mode"], "clarify");
    assert_eq!(json["decision"]["clarificationQuestion"], "Which account?");
}

#[tokio::test]
async fn missing_api_key_is_internal_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let app = open_router(pipeline(&server, None));

    let (status, json) = send_json(app, post("/", r#"{"text":"spent 20"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json,
        json!({
            "error": "Failed to classify transaction intent.",
            "details": "Missing GEMINI_API_KEY secret."
        })
    );
}

#[tokio::test]
async fn unparseable_model_output_is_internal_error_with_raw_text() {
    let server = upstream_replying("Sure! That sounds like coffee.").await;
    let app = open_router(pipeline(&server, Some("k")));

    let (status, json) = send_json(app, post("/", r#"{"text":"spent 20 on coffee"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to classify transaction intent.");
    assert_eq!(
        json["details"],
        "Model output was not valid JSON: Sure! That sounds like coffee."
    );
}

#[tokio::test]
async fn exhausted_models_surface_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;
    let app = open_router(pipeline(&server, Some("k")));

    let (status, json) = send_json(app, post("/", r#"{"text":"spent 20"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let details = json["details"].as_str().unwrap();
    assert!(details.contains("503"), "{details}");
    assert!(details.contains("unavailable"), "{details}");
}

#[tokio::test]
async fn successful_responses_carry_cors_headers() {
    let server = upstream_replying(r#"{"mode":"clarify"}"#).await;
    let app = open_router(pipeline(&server, Some("k")));

    let (status, headers, _) = send(app, post("/", r#"{"text":"hm"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
}

#[tokio::test]
async fn transport_failure_does_not_leak_api_key() {
    const KEY: &str = "SUPER-SECRET-KEY";
    // Nothing listens on port 1, so every candidate fails to connect.
    let adapter =
        GeminiAdapter::with_config("http://127.0.0.1:1/models", Duration::from_secs(5)).unwrap();
    let gateway = ModelGateway::with_config(adapter, Arc::new(NoopUsageSink), GatewayConfig::default());
    let secrets = StaticSecretProvider::new().with(GEMINI_API_KEY, KEY);
    let app = open_router(DecisionPipeline::new(Arc::new(gateway), Arc::new(secrets)));

    let (status, _, bytes) = send(app, post("/", r#"{"text":"spent 20"}"#)).await;
    let body = String::from_utf8(bytes).unwrap();

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("http error"), "{body}");
    assert!(!body.contains(KEY), "{body}");
    assert!(!body.contains("key="), "{body}");
}

#[tokio::test]
async fn health_check_answers_ok() {
    let server = MockServer::start().await;
    let app = open_router(pipeline(&server, Some("k")));

    let req = Request::builder()
        .method(Method::GET)
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let (status, _, bytes) = send(app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"ok");
}
