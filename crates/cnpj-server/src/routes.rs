//! HTTP routes for the importer server

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde_json::json;
use sqlx::PgPool;
use tokio::sync::broadcast;

use crate::config::{Config, ImporterConfig};
use crate::error::AppError;
use crate::importer::{
    api::ReceitaClient, EventBus, EventSink, FixedDelay, ImportError, ImportRunner,
    PgImportStore, RunController,
};
use crate::middleware;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub importer: ImporterConfig,
    pub controller: Arc<RunController>,
    pub events: EventBus,
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/start", post(toggle_import))
        .route("/events", get(event_stream))
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .with_state(state)
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// UI page handler
async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

/// Toggle the background import run
///
/// POST /start with no body; answers `{"status": "started"|"stopped"}`.
async fn toggle_import(State(state): State<AppState>) -> Result<Response, AppError> {
    let store = PgImportStore::new(state.db.clone());
    let api = ReceitaClient::new(&state.importer).map_err(ImportError::from)?;
    let pacer = FixedDelay::new(state.importer.pace());
    let sink: Arc<dyn EventSink> = Arc::new(state.events.clone());

    let outcome = state
        .controller
        .toggle(move |cancel| ImportRunner::new(store, api, pacer, sink, cancel).execute())
        .await;

    Ok(Json(json!({ "status": outcome.as_str() })).into_response())
}

/// SSE stream of importer events
///
/// Late subscribers only see events emitted after they connect; a lagging
/// subscriber loses the oldest events rather than slowing the run.
async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = Event::default()
                        .event(event.name())
                        .data(event.payload().to_string());
                    return Some((Ok(sse), rx));
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged, dropping events");
                    continue;
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Result<Response, StatusCode> {
    match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response()),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        },
    }
}

/// Import statistics
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let candidates = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cnpj_sitac")
        .fetch_one(&state.db);
    let imported =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM empresa").fetch_one(&state.db);

    let (candidates_res, imported_res) = tokio::join!(candidates, imported);

    match (candidates_res, imported_res) {
        (Ok(candidates), Ok(imported)) => (
            StatusCode::OK,
            Json(json!({
                "candidates": candidates,
                "imported": imported,
                "running": state.controller.is_running().await,
            })),
        )
            .into_response(),
        _ => {
            tracing::error!("Failed to fetch stats from database");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch statistics" })),
            )
                .into_response()
        },
    }
}
