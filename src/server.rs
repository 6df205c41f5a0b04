use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::AppState;
use crate::domain::catalog::{CatalogError, CatalogRecord};
use crate::domain::matching::StrategyKind;
use crate::runtime::builder::{AgentDraft, build_custom_agent};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Start the Axum server for the given state.
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// All routes with middleware applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/agents", get(list_agents).post(register_agent))
        .route("/api/agents/build", post(build_agent))
        .route("/api/agents/{id}", get(get_agent))
        .route("/api/match", post(match_agent))
        .route(
            "/api/settings/api-key",
            get(api_key_status).put(save_api_key).delete(clear_api_key),
        )
        .layer(axum::middleware::from_fn(
            |req: Request, next: Next| async move {
                match tokio::time::timeout(REQUEST_TIMEOUT, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn catalog_error(e: &CatalogError) -> (StatusCode, String) {
    let status = match e {
        CatalogError::DuplicateId(_) => StatusCode::CONFLICT,
        CatalogError::EmptyField { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

async fn health() -> &'static str {
    "ok"
}

async fn list_agents(State(state): State<AppState>) -> Json<Vec<CatalogRecord>> {
    Json(state.catalog.snapshot().await.records().to_vec())
}

async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CatalogRecord>, StatusCode> {
    state
        .catalog
        .snapshot()
        .await
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn register_agent(
    State(state): State<AppState>,
    Json(record): Json<CatalogRecord>,
) -> Result<(StatusCode, Json<CatalogRecord>), (StatusCode, String)> {
    let record = state
        .catalog
        .register(record)
        .await
        .map_err(|e| catalog_error(&e))?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn build_agent(
    State(state): State<AppState>,
    Json(draft): Json<AgentDraft>,
) -> Result<(StatusCode, Json<CatalogRecord>), (StatusCode, String)> {
    if draft.query.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query must not be empty".to_string()));
    }
    let record = state
        .catalog
        .register(build_custom_agent(draft))
        .await
        .map_err(|e| catalog_error(&e))?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize)]
struct MatchBody {
    query: String,
}

#[derive(Debug, Serialize)]
struct MatchedAgent {
    agent: CatalogRecord,
    strategy: StrategyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
}

#[derive(Debug, Serialize)]
struct MatchResponse {
    #[serde(rename = "match")]
    matched: Option<MatchedAgent>,
}

/// POST /api/match - never fails; no suitable agent is `{"match": null}`.
async fn match_agent(
    State(state): State<AppState>,
    Json(body): Json<MatchBody>,
) -> Json<MatchResponse> {
    let credential = match state.credentials.get().await {
        Ok(credential) => credential,
        Err(e) => {
            warn!(error = %e, "Credential store unreadable, matching without it");
            None
        }
    };
    let catalog = state.catalog.snapshot().await;

    let matched = state
        .matchmaker
        .find_best_match(&body.query, &catalog, credential.as_deref())
        .await
        .map(|m| MatchedAgent {
            agent: m.record.clone(),
            strategy: m.reason.strategy(),
            score: m.reason.score(),
        });

    Json(MatchResponse { matched })
}

#[derive(Debug, Serialize)]
struct ApiKeyStatus {
    configured: bool,
}

#[derive(Debug, Deserialize)]
struct ApiKeyBody {
    api_key: String,
}

async fn api_key_status(
    State(state): State<AppState>,
) -> Result<Json<ApiKeyStatus>, (StatusCode, String)> {
    let credential = state
        .credentials
        .get()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(ApiKeyStatus {
        configured: credential.is_some(),
    }))
}

async fn save_api_key(
    State(state): State<AppState>,
    Json(body): Json<ApiKeyBody>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.credentials.save(&body.api_key).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(crate::credentials::CredentialError::Empty) => Err((
            StatusCode::BAD_REQUEST,
            "api_key must not be empty".to_string(),
        )),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn clear_api_key(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    state
        .credentials
        .clear()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}
