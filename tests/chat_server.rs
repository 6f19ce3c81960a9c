//! End-to-end tests for the chat server.
//!
//! The server runs in-process on a free port with a fake [`ChatModel`], so
//! no network access or API key is needed.

use async_trait::async_trait;
use kb_insights::chat::{ChatModel, ChatTurn, Role};
use kb_insights::config::Config;
use kb_insights::server::{run_server_with_model, APOLOGY};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ─── Fake models ────────────────────────────────────────────────────

/// Replies with the number of prior turns and the message, and records
/// every system prompt it was given.
#[derive(Default)]
struct EchoModel {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatModel for EchoModel {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(system_prompt.to_string());
        if let Some(last) = history.last() {
            assert_eq!(last.role, Role::Model);
        }
        Ok(format!("[{}] {}", history.len(), message))
    }
}

struct FailingModel;

#[async_trait]
impl ChatModel for FailingModel {
    async fn generate(&self, _: &str, _: &[ChatTurn], _: &str) -> anyhow::Result<String> {
        anyhow::bail!("quota exceeded")
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn test_config(tmp: &TempDir, port: u16) -> Config {
    let index = tmp.path().join("assistant.html");
    std::fs::write(&index, "<html><body>Medical plan assistant</body></html>").unwrap();

    let mut cfg = Config::default();
    cfg.server.bind = format!("127.0.0.1:{}", port);
    cfg.server.index_file = index;
    cfg.chat.system_prompt = "You help with plans.".to_string();
    cfg
}

async fn start(model: Arc<dyn ChatModel>) -> (TempDir, String) {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp, port);
    tokio::spawn(async move {
        run_server_with_model(&cfg, model).await.unwrap();
    });
    wait_for_server(port).await;
    (tmp, format!("http://127.0.0.1:{}", port))
}

async fn post(base: &str, path: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}{}", base, path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_keeps_history_per_session() {
    let model = Arc::new(EchoModel::default());
    let (_tmp, base) = start(model.clone()).await;

    let (status, body) = post(
        &base,
        "/api/chat",
        json!({"message": "hello", "session_id": "a"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["response"], "[0] hello");
    assert_eq!(body["session_id"], "a");

    let (_, body) = post(
        &base,
        "/api/chat",
        json!({"message": "which plan?", "session_id": "a"}),
    )
    .await;
    assert_eq!(body["response"], "[2] which plan?");

    // Another session starts from scratch.
    let (_, body) = post(&base, "/api/chat", json!({"message": "hi", "session_id": "b"})).await;
    assert_eq!(body["response"], "[0] hi");

    assert!(model
        .prompts
        .lock()
        .unwrap()
        .iter()
        .all(|p| p == "You help with plans."));
}

#[tokio::test]
async fn test_chat_defaults_session_id() {
    let (_tmp, base) = start(Arc::new(EchoModel::default())).await;

    let (status, body) = post(&base, "/api/chat", json!({"message": "hi"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["session_id"], "default");
}

#[tokio::test]
async fn test_reset_clears_history() {
    let (_tmp, base) = start(Arc::new(EchoModel::default())).await;

    post(&base, "/api/chat", json!({"message": "one"})).await;
    let (_, body) = post(&base, "/api/chat", json!({"message": "two"})).await;
    assert_eq!(body["response"], "[2] two");

    let (status, body) = post(&base, "/api/reset", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"status": "success", "message": "Conversation reset"}));

    let (_, body) = post(&base, "/api/chat", json!({"message": "three"})).await;
    assert_eq!(body["response"], "[0] three");

    // Resetting an unknown session still succeeds.
    let (status, _) = post(&base, "/api/reset", json!({"session_id": "ghost"})).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_model_failure_returns_apology() {
    let (_tmp, base) = start(Arc::new(FailingModel)).await;

    let (status, body) = post(&base, "/api/chat", json!({"message": "hi"})).await;
    assert_eq!(status, 500);
    assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
    assert_eq!(body["response"], APOLOGY);
}

#[tokio::test]
async fn test_malformed_body_is_a_server_error() {
    let (_tmp, base) = start(Arc::new(EchoModel::default())).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/chat", base))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
    assert_eq!(body["response"], APOLOGY);

    let resp = client
        .post(format!("{}/api/reset", base))
        .header("Content-Type", "application/json")
        .body("\"oops\"")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
    assert!(body.get("response").is_none());
}

#[tokio::test]
async fn test_index_health_and_cors() {
    let (_tmp, base) = start(Arc::new(EchoModel::default())).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().contains("Medical plan assistant"));

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

    let resp = client
        .post(format!("{}/api/chat", base))
        .header("Origin", "http://example.com")
        .json(&json!({"message": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
