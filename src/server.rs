//! HTTP server for the clarify, suggest and chat workflows.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/clarify` | Generate clarifying questions for a context |
//! | `POST` | `/suggest` | Suggest answers for a stored question |
//! | `POST` | `/chat` | One history-aware chat turn |
//! | `PUT`  | `/prompts/{role}` | Create or overwrite a prompt template |
//! | `GET`  | `/prompts/{role}` | Read a prompt template |
//! | `DELETE` | `/sessions/{session_id}` | Delete a chat session |
//! | `GET`  | `/sessions/{session_id}/messages` | Session history |
//! | `PUT`  | `/questions/{session_id}/status` | Set or clear a question's status |
//! | `POST` | `/projects` | Ingest (insert or merge) a project record |
//! | `GET`  | `/projects` | List project names |
//! | `GET`  | `/projects/{name}/epics` | List a project's epics |
//! | `GET`  | `/projects/{name}/epics/{epic}/tickets` | List an epic's tickets |
//! | `POST` | `/links` | Links for a project, epic or ticket |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "epic 'E404' not found", "details": "not_found" }
//! ```
//!
//! `not_found` (404), `invalid_input` (400), `data_unavailable` (503),
//! `upstream_failure` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! front ends.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use clarify_harness_core::error::HarnessError;
use clarify_harness_core::models::{ContextKey, Project, QuestionStatus, Role};
use clarify_harness_core::workflow::{ClarifyOutcome, Engine};

use crate::config::Config;
use crate::harness::Harness;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

/// Build the router over an already wired [`Engine`].
pub fn router(engine: Arc<Engine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/clarify", post(handle_clarify))
        .route("/suggest", post(handle_suggest))
        .route("/chat", post(handle_chat))
        .route("/prompts/{role}", put(handle_set_prompt).get(handle_get_prompt))
        .route("/sessions/{session_id}", delete(handle_delete_session))
        .route("/sessions/{session_id}/messages", get(handle_history))
        .route("/questions/{session_id}/status", put(handle_question_status))
        .route("/projects", post(handle_ingest).get(handle_list_projects))
        .route("/projects/{name}/epics", get(handle_list_epics))
        .route("/projects/{name}/epics/{epic}/tickets", get(handle_list_tickets))
        .route("/links", post(handle_links))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { engine })
}

/// Open the harness and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let harness = Harness::open(config).await?;
    let app = router(harness.engine());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "server listening");
    println!("Clarify server listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    harness.close().await;
    Ok(())
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
struct AppError(HarnessError);

impl From<HarnessError> for AppError {
    fn from(e: HarnessError) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            HarnessError::NotFound(_) => StatusCode::NOT_FOUND,
            HarnessError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            HarnessError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            HarnessError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(self.0.to_body())).into_response()
    }
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    raw.parse::<Role>()
        .map_err(|e| AppError(HarnessError::invalid_input(e)))
}

type ApiResult = Result<Json<serde_json::Value>, AppError>;

// ============ Workflows ============

async fn handle_clarify(State(state): State<AppState>, Json(key): Json<ContextKey>) -> ApiResult {
    let outcome = state.engine.generate_clarify_questions(key).await?;
    let body = match &outcome {
        ClarifyOutcome::Generated {
            response,
            questions,
        } => json!({
            "success": outcome.message(),
            "response": response,
            "questions": questions,
        }),
        ClarifyOutcome::AlreadyExists => json!({ "success": outcome.message() }),
    };
    Ok(Json(body))
}

#[derive(Deserialize)]
struct SuggestRequest {
    #[serde(rename = "sessionID")]
    session_id: String,
    #[serde(flatten)]
    key: ContextKey,
}

/// Responds with JSON `null` when the model has no suggestions.
async fn handle_suggest(
    State(state): State<AppState>,
    Json(req): Json<SuggestRequest>,
) -> ApiResult {
    let suggestion = state
        .engine
        .generate_suggestion(&req.session_id, req.key)
        .await?;
    Ok(Json(json!(suggestion)))
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(rename = "sessionID")]
    session_id: String,
    message: String,
    #[serde(flatten)]
    key: ContextKey,
}

async fn handle_chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> ApiResult {
    let reply = state
        .engine
        .chat(&req.session_id, &req.message, req.key)
        .await?;
    Ok(Json(json!(reply)))
}

// ============ Prompts ============

#[derive(Deserialize)]
struct PromptBody {
    contextualize_q_system_prompt: String,
    qa_system_prompt: String,
}

async fn handle_set_prompt(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Json(body): Json<PromptBody>,
) -> ApiResult {
    let role = parse_role(&role)?;
    state
        .engine
        .set_prompt_template(
            role,
            &body.contextualize_q_system_prompt,
            &body.qa_system_prompt,
        )
        .await?;
    Ok(Json(json!({ "success": format!("Prompt for {} saved", role) })))
}

async fn handle_get_prompt(State(state): State<AppState>, Path(role): Path<String>) -> ApiResult {
    let template = state.engine.get_prompt_template(parse_role(&role)?).await?;
    Ok(Json(json!({
        "contextualize_q_system_prompt": template.contextualize_q_system_prompt,
        "qa_system_prompt": template.qa_system_prompt,
    })))
}

// ============ Sessions and questions ============

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    state.engine.delete_session(&session_id).await?;
    Ok(Json(json!({ "success": "Session deleted" })))
}

async fn handle_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let messages = state.engine.session_history(&session_id).await?;
    Ok(Json(json!({ "sessionID": session_id, "messages": messages })))
}

#[derive(Deserialize)]
struct StatusRequest {
    #[serde(default)]
    status: Option<QuestionStatus>,
}

async fn handle_question_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> ApiResult {
    state
        .engine
        .mark_question_status(&session_id, req.status)
        .await?;
    Ok(Json(json!({ "success": "Status updated" })))
}

// ============ Catalog ============

async fn handle_ingest(State(state): State<AppState>, Json(project): Json<Project>) -> ApiResult {
    state.engine.catalog().ingest(&project).await?;
    Ok(Json(json!({ "success": format!("Project {} saved", project.project_name) })))
}

async fn handle_list_projects(State(state): State<AppState>) -> ApiResult {
    let projects = state.engine.catalog().list_projects().await?;
    Ok(Json(json!({ "projects": projects })))
}

async fn handle_list_epics(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult {
    let epics = state.engine.catalog().list_epics(&name).await?;
    Ok(Json(json!(epics)))
}

async fn handle_list_tickets(
    State(state): State<AppState>,
    Path((name, epic)): Path<(String, String)>,
) -> ApiResult {
    let tickets = state.engine.catalog().list_tickets(&name, &epic).await?;
    Ok(Json(json!(tickets)))
}

#[derive(Deserialize)]
struct LinksRequest {
    project_name: String,
    #[serde(default)]
    epic_key: Option<String>,
    #[serde(default)]
    ticket_key: Option<String>,
}

async fn handle_links(State(state): State<AppState>, Json(req): Json<LinksRequest>) -> ApiResult {
    let links = state
        .engine
        .catalog()
        .links(
            &req.project_name,
            req.epic_key.as_deref().filter(|e| !e.is_empty()),
            req.ticket_key.as_deref().filter(|t| !t.is_empty()),
        )
        .await?;
    Ok(Json(json!(links)))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
