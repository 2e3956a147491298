//! SQLite store behavior: project merging, session ordering, and the
//! conditional clarify batch insert.

use clarify_harness::config::Config;
use clarify_harness::db;
use clarify_harness::migrate;
use clarify_harness::sqlite_store::SqliteStore;
use clarify_harness_core::models::{
    ChatMessage, ClarifyQuestion, ContextKey, Epic, LinkedSources, Project, PromptTemplate,
    QuestionStatus, Role, Sender,
};
use clarify_harness_core::store::Store;
use std::sync::Arc;
use tempfile::TempDir;

fn test_config(tmp: &TempDir) -> Config {
    let content = format!(
        r#"[db]
path = "{}/data/clarify.sqlite"

[server]
bind = "127.0.0.1:0"
"#,
        tmp.path().display()
    );
    toml::from_str(&content).unwrap()
}

async fn open_store(tmp: &TempDir) -> SqliteStore {
    let cfg = test_config(tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    SqliteStore::new(pool)
}

fn epic(key: &str) -> Epic {
    Epic {
        key: key.into(),
        summary: format!("{} summary", key),
        description: String::new(),
        tasks: Vec::new(),
        source: LinkedSources::default(),
    }
}

fn question(session: &str, text: &str, key: &ContextKey) -> ClarifyQuestion {
    ClarifyQuestion {
        session_id: session.into(),
        question: text.into(),
        project_name: key.project_name.clone(),
        epic_key: key.epic_key.clone(),
        ticket_key: key.ticket_key.clone(),
        url: key.source_url.clone(),
        status: None,
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    migrate::run_migrations(store.pool()).await.unwrap();
    assert!(store.list_project_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_project_merge_appends_links_and_replaces_issues() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let mut first = Project::new("Payments");
    first.github_link = vec!["https://github.com/acme/pay".into()];
    first.issues = vec![epic("E1")];
    store.upsert_project(&first).await.unwrap();

    let mut second = Project::new("Payments");
    second.github_link = vec!["https://github.com/acme/pay-ui".into()];
    second.docs_link = vec!["https://docs.example.com/pay".into()];
    second.issues = vec![epic("E2")];
    store.upsert_project(&second).await.unwrap();

    let stored = store.get_project("Payments").await.unwrap().unwrap();
    assert_eq!(
        stored.github_link,
        vec!["https://github.com/acme/pay", "https://github.com/acme/pay-ui"]
    );
    assert_eq!(stored.docs_link, vec!["https://docs.example.com/pay"]);
    assert_eq!(stored.issues.len(), 1);
    assert_eq!(stored.issues[0].key, "E2");

    assert_eq!(store.list_project_names().await.unwrap(), vec!["Payments"]);
    assert!(store.get_project("Missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_prompt_upsert_overwrites() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    for qa in ["first answer prompt", "second answer prompt"] {
        store
            .upsert_prompt(&PromptTemplate {
                role: Role::Chat,
                contextualize_q_system_prompt: "rewrite".into(),
                qa_system_prompt: qa.into(),
            })
            .await
            .unwrap();
    }

    let t = store.get_prompt(Role::Chat).await.unwrap().unwrap();
    assert_eq!(t.qa_system_prompt, "second answer prompt");
    assert!(store.get_prompt(Role::Clarify).await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_messages_keep_order_and_tokens() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    store
        .push_message("s1", &ChatMessage::human("hello", 2))
        .await
        .unwrap();
    store
        .push_message("s1", &ChatMessage::agent("hi there", 3))
        .await
        .unwrap();
    store
        .push_message("s2", &ChatMessage::human("other", 1))
        .await
        .unwrap();

    let history = store.load_messages("s1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender, Sender::Human);
    assert_eq!(history[0].input_token_count, 2);
    assert_eq!(history[0].output_token_count, 0);
    assert_eq!(history[1].sender, Sender::Agent);
    assert_eq!(history[1].content, "hi there");
    assert_eq!(history[1].output_token_count, 3);

    assert!(store.load_messages("nope").await.unwrap().is_empty());

    assert_eq!(store.delete_session("s1").await.unwrap(), 2);
    assert_eq!(store.delete_session("s1").await.unwrap(), 0);
    assert_eq!(store.load_messages("s2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_batch_insert_is_conditional() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let key = ContextKey::new("P", "E1").with_ticket("T1");

    assert!(!store.batch_exists(&key).await.unwrap());
    let inserted = store
        .insert_batch_if_absent(
            &key,
            &[question("q1", "Which currencies?", &key), question("q2", "Refunds?", &key)],
        )
        .await
        .unwrap();
    assert!(inserted);
    assert!(store.batch_exists(&key).await.unwrap());

    let again = store
        .insert_batch_if_absent(&key, &[question("q3", "Duplicate?", &key)])
        .await
        .unwrap();
    assert!(!again);
    assert!(store.find_question("q3", &key).await.unwrap().is_none());

    // A different ticket under the same epic is a different context.
    let other = ContextKey::new("P", "E1").with_ticket("T2");
    assert!(!store.batch_exists(&other).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_batch_inserts_admit_one() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(open_store(&tmp).await);
    let key = ContextKey::new("P", "E1");

    let mut handles = Vec::new();
    for i in 0..4 {
        let store = store.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            let q = question(&format!("s{}", i), &format!("question {}", i), &key);
            store.insert_batch_if_absent(&key, &[q]).await
        }));
    }

    let mut winners = 0;
    for h in handles {
        if h.await.unwrap().unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clarify_questions")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_find_question_requires_matching_context() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let key = ContextKey::new("P", "E1").with_source_url("https://wiki.example.com/page");

    store
        .insert_batch_if_absent(&key, &[question("q1", "Who approves?", &key)])
        .await
        .unwrap();

    let found = store.find_question("q1", &key).await.unwrap().unwrap();
    assert_eq!(found.question, "Who approves?");
    assert_eq!(found.url.as_deref(), Some("https://wiki.example.com/page"));
    assert_eq!(found.status, None);

    let wrong = ContextKey::new("P", "E2").with_source_url("https://wiki.example.com/page");
    assert!(store.find_question("q1", &wrong).await.unwrap().is_none());
}

#[tokio::test]
async fn test_question_status_set_and_clear() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let key = ContextKey::new("P", "E1");
    store
        .insert_batch_if_absent(&key, &[question("q1", "Scope?", &key)])
        .await
        .unwrap();

    assert!(store
        .set_question_status("q1", Some(QuestionStatus::Resolved))
        .await
        .unwrap());
    let q = store.find_question("q1", &key).await.unwrap().unwrap();
    assert_eq!(q.status, Some(QuestionStatus::Resolved));

    assert!(store.set_question_status("q1", None).await.unwrap());
    let q = store.find_question("q1", &key).await.unwrap().unwrap();
    assert_eq!(q.status, None);

    assert!(!store
        .set_question_status("missing", Some(QuestionStatus::Dismissed))
        .await
        .unwrap());
}
