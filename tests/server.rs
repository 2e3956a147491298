//! HTTP surface tests: the router is served on an ephemeral port over an
//! in-memory store, with offline embedding and completion fakes.

use anyhow::{bail, Result};
use async_trait::async_trait;
use clarify_harness::server::router;
use clarify_harness_core::completion::{CompletionProvider, Message};
use clarify_harness_core::embedding::EmbeddingProvider;
use clarify_harness_core::store::memory::InMemoryStore;
use clarify_harness_core::workflow::Engine;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct LengthEmbedder;

#[async_trait]
impl EmbeddingProvider for LengthEmbedder {
    fn model_name(&self) -> &str {
        "length"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| vec![1.0, t.len() as f32]).collect())
    }
}

struct QueuedModel(Mutex<VecDeque<String>>);

#[async_trait]
impl CompletionProvider for QueuedModel {
    fn model_name(&self) -> &str {
        "queued"
    }
    async fn complete(&self, _messages: &[Message]) -> Result<String> {
        match self.0.lock().unwrap().pop_front() {
            Some(r) => Ok(r),
            None => bail!("model unavailable"),
        }
    }
}

/// Serve the router and return its base URL.
async fn start(replies: &[&str]) -> String {
    let model = QueuedModel(Mutex::new(replies.iter().map(|s| s.to_string()).collect()));
    let engine = Engine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(LengthEmbedder),
        Arc::new(model),
    );
    let app = router(Arc::new(engine));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

async fn seed(client: &reqwest::Client, base: &str) {
    let project = json!({
        "project_name": "Payments",
        "github_link": ["https://github.com/acme/payments"],
        "issues": [{
            "key": "PAY-1",
            "summary": "Checkout",
            "tasks": [{
                "key": "PAY-7",
                "summary": "Card payments",
                "description": "Accept card payments at checkout.",
                "issue_type": "Story"
            }]
        }]
    });
    let resp = client
        .post(format!("{}/projects", base))
        .json(&project)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    for role in ["CLARIFY", "CHAT", "SUGGESTION"] {
        let resp = client
            .put(format!("{}/prompts/{}", base, role))
            .json(&json!({
                "contextualize_q_system_prompt": "rewrite",
                "qa_system_prompt": "Answer from the ticket context."
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
}

#[tokio::test]
async fn test_health_reports_version() {
    let base = start(&[]).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_catalog_endpoints() {
    let base = start(&[]).await;
    let client = reqwest::Client::new();
    seed(&client, &base).await;

    let body: Value = client
        .get(format!("{}/projects", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["projects"], json!(["Payments"]));

    let epics: Value = client
        .get(format!("{}/projects/Payments/epics", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(epics[0]["key"], "PAY-1");

    let tickets: Value = client
        .get(format!("{}/projects/Payments/epics/PAY-1/tickets", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tickets[0]["key"], "PAY-7");
    assert_eq!(tickets[0]["issue_type"], "Story");

    let links: Value = client
        .post(format!("{}/links", base))
        .json(&json!({ "project_name": "Payments" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(links["otherLinks"], json!(["https://github.com/acme/payments"]));

    let resp = client
        .get(format!("{}/projects/Nope/epics", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["details"], "not_found");
}

#[tokio::test]
async fn test_prompt_roundtrip_and_bad_role() {
    let base = start(&[]).await;
    let client = reqwest::Client::new();
    seed(&client, &base).await;

    let body: Value = client
        .get(format!("{}/prompts/chat", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["qa_system_prompt"], "Answer from the ticket context.");

    let resp = client
        .get(format!("{}/prompts/PIRATE", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_clarify_then_chat_over_http() {
    let base = start(&["card", "Which card brands?", "card", "Visa and Mastercard."]).await;
    let client = reqwest::Client::new();
    seed(&client, &base).await;

    let key = json!({ "project_name": "Payments", "epic_key": "PAY-1", "ticket_key": "PAY-7" });
    let body: Value = client
        .post(format!("{}/clarify", base))
        .json(&key)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], "Questions generated");
    let session = body["questions"][0]["sessionID"].as_str().unwrap().to_string();

    let again: Value = client
        .post(format!("{}/clarify", base))
        .json(&key)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["success"], "Session already exists");

    let reply: Value = client
        .post(format!("{}/chat", base))
        .json(&json!({
            "sessionID": session,
            "message": "Which ones?",
            "project_name": "Payments",
            "epic_key": "PAY-1",
            "ticket_key": "PAY-7"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["response"], "Visa and Mastercard.");
    assert_eq!(reply["stream"], "Visa<|sp|>and<|sp|>Mastercard.");

    let history: Value = client
        .get(format!("{}/sessions/{}/messages", base, session))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["messages"].as_array().unwrap().len(), 2);

    let resp = client
        .put(format!("{}/questions/{}/status", base, session))
        .json(&json!({ "status": "resolved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .delete(format!("{}/sessions/{}", base, session))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_missing_context_selector_is_bad_request() {
    let base = start(&[]).await;
    let client = reqwest::Client::new();
    seed(&client, &base).await;

    let resp = client
        .post(format!("{}/clarify", base))
        .json(&json!({ "project_name": "Payments", "epic_key": "PAY-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["details"], "invalid_input");
}

#[tokio::test]
async fn test_model_failure_is_bad_gateway() {
    let base = start(&[]).await;
    let client = reqwest::Client::new();
    seed(&client, &base).await;

    let resp = client
        .post(format!("{}/suggest", base))
        .json(&json!({
            "sessionID": "unknown",
            "project_name": "Payments",
            "epic_key": "PAY-1",
            "ticket_key": "PAY-7"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .post(format!("{}/chat", base))
        .json(&json!({
            "sessionID": "s-1",
            "message": "hello",
            "project_name": "Payments",
            "epic_key": "PAY-1",
            "ticket_key": "PAY-7"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
}
