use std::path::Path;

use serde_json::{json, Value};
use tempfile::tempdir;
use tokio::process::Command;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENV_VARS: [&str; 13] = [
    "CASHFLOW_BIND_ADDR",
    "CASHFLOW_AUTH_MODE",
    "CASHFLOW_PROMPT",
    "CASHFLOW_MAX_LIST_ITEMS",
    "CASHFLOW_MAX_HISTORY_TURNS",
    "GEMINI_MODELS",
    "GEMINI_BASE_URL",
    "GEMINI_TIMEOUT_SECONDS",
    "GEMINI_API_KEY",
    "FIREBASE_WEB_API_KEY",
    "IDENTITY_TOOLKIT_URL",
    "IDENTITY_TOOLKIT_TIMEOUT_SECONDS",
    "RUST_LOG",
];

fn cli(workdir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cashflow-router"));
    cmd.current_dir(workdir);
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn write_request(dir: &Path, body: &Value) -> std::path::PathBuf {
    let path = dir.join("request.json");
    std::fs::write(&path, serde_json::to_string(body).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn prompt_command_renders_normalized_request() {
    let dir = tempdir().unwrap();
    let request = write_request(
        dir.path(),
        &json!({
            "text": "  spent 20 on coffee ",
            "context": { "entryPoint": "tourDashboard", "currentTourId": "t1" },
            "history": [{ "role": "assistant", "text": "Hi" }, { "text": "   " }]
        }),
    );

    let output = cli(dir.path())
        .arg("prompt")
        .arg("--request")
        .arg(&request)
        .output()
        .await
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("You are CashFlow's transaction intent router."));
    assert!(stdout.contains("\"entryPoint\":\"tourDashboard\",\"currentTourId\":\"t1\""));
    assert!(stdout.contains("Conversation history JSON:\n[{\"role\":\"assistant\",\"text\":\"Hi\"}]"));
    assert!(stdout.ends_with("Latest user utterance:\nspent 20 on coffee\n"));
}

#[tokio::test]
async fn prompt_command_honours_template_override() {
    let dir = tempdir().unwrap();
    let request = write_request(dir.path(), &json!({ "text": "got paid 500" }));

    let output = cli(dir.path())
        .args(["--prompt-template", "router_compact", "prompt", "--request"])
        .arg(&request)
        .output()
        .await
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Schema:\n"));
    assert!(stdout.contains("User text:\ngot paid 500"));
}

#[tokio::test]
async fn prompt_command_rejects_missing_text() {
    let dir = tempdir().unwrap();
    let request = write_request(dir.path(), &json!({ "context": {} }));

    let output = cli(dir.path())
        .arg("prompt")
        .arg("--request")
        .arg(&request)
        .output()
        .await
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Missing text"));
}

#[tokio::test]
async fn decide_command_writes_decision_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/custom-model:generateContent"))
        .and(query_param("key", "cli-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{
                "text": "```json\n{\"mode\":\"main\",\"confidence\":0.8,\"main\":{\"amount\":\"12\",\"type\":\"Expense\"}}\n```"
            }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let request = write_request(dir.path(), &json!({ "text": "lunch 12" }));
    let out = dir.path().join("decision.json");

    let output = cli(dir.path())
        .env("GEMINI_API_KEY", "cli-key")
        .env("GEMINI_BASE_URL", server.uri())
        .args(["decide", "--models", "custom-model", "--request"])
        .arg(&request)
        .arg("--out")
        .arg(&out)
        .output()
        .await
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["decision"]["mode"], "main");
    assert_eq!(written["decision"]["main"]["amount"], json!(12.0));
    assert_eq!(written["decision"]["main"]["type"], "expense");
    assert_eq!(written["decision"]["tour"]["sharerNames"], json!([]));
}

#[tokio::test]
async fn decide_command_fails_without_api_key() {
    let dir = tempdir().unwrap();
    let request = write_request(dir.path(), &json!({ "text": "lunch 12" }));

    let output = cli(dir.path())
        .arg("decide")
        .arg("--request")
        .arg(&request)
        .output()
        .await
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Missing GEMINI_API_KEY secret."));
}
