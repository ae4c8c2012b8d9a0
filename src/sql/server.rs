// SPDX-License-Identifier: MIT

//! HTTP surface: ask questions and list provider models

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::model::provider::LlmFactory;
use crate::sql::agent::SqlAgent;
use crate::sql::workflow::{SqlState, WorkflowEvent};

pub struct AppState {
    pub agent: Arc<SqlAgent>,
    pub factory: LlmFactory,
}

#[derive(Deserialize)]
pub struct AskRequest {
    pub question: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/models/{provider}", get(list_models))
        .route("/api/ask", post(ask))
        .route("/api/ask/stream", post(ask_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(
    state: Arc<AppState>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_models(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.factory.list_models(&provider).await {
        Ok(models) => (StatusCode::OK, Json(json!(models))),
        Err(e) => {
            log::warn!("Listing models for {} failed: {}", provider, e);
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
        }
    }
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> (StatusCode, Json<Value>) {
    match state.agent.invoke(&payload.question).await {
        Ok(result) => (StatusCode::OK, Json(json!(result))),
        Err(e) => {
            log::error!("Question failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

/// One item of a streamed run: progress, then the final state or an error
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamMessage {
    Workflow(WorkflowEvent),
    Result(SqlState),
    Error { error: String },
}

impl StreamMessage {
    fn event_name(&self) -> &'static str {
        match self {
            StreamMessage::Workflow(_) => "workflow",
            StreamMessage::Result(_) => "result",
            StreamMessage::Error { .. } => "error",
        }
    }

    fn into_event(self) -> Event {
        match Event::default().event(self.event_name()).json_data(&self) {
            Ok(event) => event,
            Err(e) => Event::default().event("error").data(e.to_string()),
        }
    }
}

/// Run `question` in the background, forwarding progress as it happens
pub fn stream_run(agent: Arc<SqlAgent>, question: String) -> mpsc::Receiver<StreamMessage> {
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        log::info!("Starting streaming run for: {}", question);

        let (events_tx, mut events_rx) = mpsc::channel(100);
        let forward_tx = tx.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if forward_tx.send(StreamMessage::Workflow(event)).await.is_err() {
                    break;
                }
            }
        });

        let result = agent.invoke_stream(&question, Some(&events_tx)).await;
        drop(events_tx);
        let _ = forward.await;

        let last = match result {
            Ok(final_state) => StreamMessage::Result(final_state),
            Err(e) => {
                log::error!("Streaming run failed: {}", e);
                StreamMessage::Error {
                    error: e.to_string(),
                }
            }
        };
        let _ = tx.send(last).await;
    });

    rx
}

async fn ask_stream(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = stream_run(state.agent.clone(), payload.question);
    let stream = ReceiverStream::new(rx).map(|message| Ok::<Event, Infallible>(message.into_event()));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(std::time::Duration::from_secs(1)))
}
