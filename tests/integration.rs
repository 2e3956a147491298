use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn clarify_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("clarify");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        root.join("payments.json"),
        r#"{
  "project_name": "Payments",
  "github_link": ["https://github.com/acme/payments"],
  "jira_link": ["https://acme.atlassian.net/browse/PAY"],
  "issues": [
    {
      "key": "PAY-1",
      "summary": "Checkout",
      "tasks": [
        { "key": "PAY-7", "summary": "Card payments", "description": "Accept cards.", "issue_type": "Story" },
        { "key": "PAY-8", "summary": "Refunds", "description": "Refund to card." }
      ]
    }
  ]
}"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/clarify.sqlite"

[chunking]
chunk_size = 500
chunk_overlap = 50

[retrieval]
top_k = 3

[server]
bind = "127.0.0.1:7341"
"#,
        root.display()
    );

    let config_path = config_dir.join("clarify.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_clarify(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = clarify_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run clarify binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_clarify(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/clarify.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_clarify(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_clarify(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_and_browse_projects() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("payments.json");

    let (stdout, stderr, success) =
        run_clarify(&config_path, &["ingest", file.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Project Payments saved"));

    let (stdout, _, success) = run_clarify(&config_path, &["projects", "list"]);
    assert!(success);
    assert_eq!(stdout.trim(), "Payments");

    let (stdout, _, success) = run_clarify(&config_path, &["projects", "epics", "Payments"]);
    assert!(success);
    assert!(stdout.contains("PAY-1\tCheckout"));

    let (stdout, _, success) =
        run_clarify(&config_path, &["projects", "tickets", "Payments", "PAY-1"]);
    assert!(success);
    assert!(stdout.contains("PAY-7\tStory\tCard payments"));
    assert!(stdout.contains("PAY-8\tTask\tRefunds"));

    let (stdout, _, success) = run_clarify(&config_path, &["projects", "links", "Payments"]);
    assert!(success);
    let links: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(links["otherLinks"].as_array().unwrap().len(), 2);
}

#[test]
fn test_reingest_merges_links() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("payments.json");

    run_clarify(&config_path, &["ingest", file.to_str().unwrap()]);
    run_clarify(&config_path, &["ingest", file.to_str().unwrap()]);

    let (stdout, _, success) = run_clarify(&config_path, &["projects", "list"]);
    assert!(success);
    assert_eq!(stdout.lines().count(), 1, "re-ingest must not duplicate projects");

    let (stdout, _, _) = run_clarify(&config_path, &["projects", "links", "Payments"]);
    let links: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(links["otherLinks"].as_array().unwrap().len(), 4);
}

#[test]
fn test_prompt_set_and_get() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_clarify(
        &config_path,
        &[
            "prompt",
            "set",
            "clarify",
            "--contextualize",
            "Rewrite as a query.",
            "--qa",
            "Ask about gaps in the ticket.",
        ],
    );
    assert!(success, "prompt set failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Prompt for CLARIFY saved"));

    let (stdout, _, success) = run_clarify(&config_path, &["prompt", "get", "CLARIFY"]);
    assert!(success);
    let template: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(template["role"], "CLARIFY");
    assert_eq!(template["contextualize_q_system_prompt"], "Rewrite as a query.");
}

#[test]
fn test_prompt_get_missing_fails() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_clarify(&config_path, &["prompt", "get", "chat"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_unknown_role_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_clarify(&config_path, &["prompt", "get", "pirate"]);
    assert!(!success);
    assert!(stderr.contains("unknown role"));
}

#[test]
fn test_history_of_unknown_session_is_empty() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_clarify(&config_path, &["history", "no-such-session"]);
    assert!(success, "history failed: stderr={}", stderr);
    assert!(stdout.trim().is_empty());

    let (_, _, success) = run_clarify(&config_path, &["session", "delete", "no-such-session"]);
    assert!(success, "deleting an absent session should succeed");
}

#[test]
fn test_ask_without_model_fails_cleanly() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("payments.json");
    run_clarify(&config_path, &["ingest", file.to_str().unwrap()]);
    run_clarify(
        &config_path,
        &["prompt", "set", "clarify", "--contextualize", "r", "--qa", "q"],
    );

    // The default config has embeddings and llm disabled.
    let (_, stderr, success) = run_clarify(
        &config_path,
        &["ask", "Payments", "PAY-1", "--ticket", "PAY-7"],
    );
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr={}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) =
        run_clarify(&tmp.path().join("nope.toml"), &["projects", "list"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
