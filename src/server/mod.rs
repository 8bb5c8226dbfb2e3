//! HTTP surface.
//!
//! ```text
//! GET    /health
//! POST   /{webhooks|chats|forms}                 upsert a registration
//! DELETE /{webhooks|chats|forms}?id=             delete a registration
//! ANY    /{webhook|chat|form}/{prod|test}/{id}   trigger endpoints
//! GET    /calls/{kind}/{id}?limit=               call history
//! POST   /workflow/execution-events
//! GET    /workflow/execution-events/{executionId}?sinceId=
//! POST   /workflow/execute-node
//! GET    /workflow/executions/{executionId}
//! GET    /uploads/{name}                         locally stored form uploads
//! ```

mod handlers;

use std::{any::Any, sync::Arc};

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::{Engine, HookflowError, Result};

use handlers::*;

pub fn router(engine: Arc<Engine>) -> Router {
    let uploads = ServeDir::new(engine.uploads().local_dir());
    Router::new()
        .route("/health", get(health))
        .route("/calls/{kind}/{id}", get(list_calls))
        .route("/workflow/execution-events", post(append_event))
        .route("/workflow/execution-events/{execution_id}", get(list_events))
        .route("/workflow/execute-node", post(execute_node))
        .route("/workflow/executions/{execution_id}", get(get_execution))
        .route("/{kinds}", post(upsert_registration).delete(delete_registration))
        .route("/{kind}/{mode}/{id}", any(trigger))
        .nest_service("/uploads", uploads)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(engine)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("request handler panicked: {}", details);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Internal server error", "details": details }))).into_response()
}

/// Binds the configured address and serves until the process stops.
pub async fn serve(engine: Arc<Engine>) -> Result<()> {
    let bind = engine.config().server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind).await.map_err(|e| HookflowError::Engine(format!("failed to bind {}: {}", bind, e)))?;
    info!("hookflow listening on {}", bind);
    axum::serve(listener, router(engine)).await.map_err(|e| HookflowError::Engine(format!("server error: {}", e)))
}
