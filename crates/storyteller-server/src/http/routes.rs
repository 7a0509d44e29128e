use super::{ApiError, ApiResult, AppState, JsonResponse};
use axum::{
    body::Bytes,
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/new-story", post(new_story))
        // The chat client is served from another origin
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "Storyteller relay is running"
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    version: String,
    uptime_seconds: u64,
    agent_id: Option<String>,
}

async fn health(State(state): State<AppState>) -> Json<JsonResponse<HealthResponse>> {
    let (healthy, agent_id) = match state.relay.current_agent().await {
        Ok(id) => (true, id.map(|id| id.to_string())),
        Err(e) => {
            warn!("Health check could not read agent id: {}", e);
            (false, None)
        }
    };

    Json(JsonResponse::ok(HealthResponse {
        healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        agent_id,
    }))
}

/// Pull a non-blank string field out of a JSON object body.
///
/// Bodies that are missing, not JSON, or not objects count as the field
/// being absent, so every such request gets the same 400.
fn required_field(body: &[u8], field: &str) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get(field)?
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn chat(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<ChatResponse>> {
    let message =
        required_field(&body, "message").ok_or_else(|| ApiError::bad_request("Message is required"))?;

    let response = state
        .relay
        .chat(&message)
        .await
        .map_err(ApiError::from_chat)?;

    info!("Chat reply: {} chars", response.len());
    Ok(Json(ChatResponse { response }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewStoryResponse {
    success: bool,
    summary_id: String,
}

async fn new_story(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<NewStoryResponse>> {
    let story =
        required_field(&body, "story").ok_or_else(|| ApiError::bad_request("Story is required"))?;

    let receipt = state
        .relay
        .add_story(&story)
        .await
        .map_err(ApiError::from_story)?;

    info!(
        "Story stored as {} ({:?})",
        receipt.summary_id, receipt.agent
    );
    Ok(Json(NewStoryResponse {
        success: true,
        summary_id: receipt.summary_id,
    }))
}
