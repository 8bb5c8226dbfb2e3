use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    Engine, HookflowError, Result,
    dispatch::{self, Inbound},
    engine::ExecutionMode,
    events::{EventType, ExecutionEvent},
    gateway::{Gateway, Identity},
    model::NodeModel,
    registry::{RegistrationStatus, TriggerKind, TriggerRegistration},
    runtime::ExecutionContext,
};

const DEFAULT_CALL_LIMIT: usize = 20;

type AppState = State<Arc<Engine>>;

fn not_found(what: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found", "details": what }))).into_response()
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationBody {
    #[serde(default)]
    id: String,
    #[serde(default, alias = "ownerUserId")]
    user_id: String,
    #[serde(default)]
    workflow_id: String,
    method: Option<String>,
    #[serde(default)]
    status: Option<RegistrationStatus>,
}

pub async fn upsert_registration(
    State(engine): AppState,
    Path(kinds): Path<String>,
    body: std::result::Result<Json<RegistrationBody>, JsonRejection>,
) -> Response {
    let Some(kind) = TriggerKind::from_plural(&kinds) else {
        return not_found(format!("unknown registry '{}'", kinds));
    };
    let Ok(Json(body)) = body else {
        return HookflowError::BadRequest("a JSON body with id, userId and workflowId is required".to_string()).into_response();
    };
    let reg = TriggerRegistration {
        id: body.id,
        kind,
        owner_user_id: body.user_id,
        workflow_id: body.workflow_id,
        method: body.method,
        status: body.status.unwrap_or_default(),
    };
    match engine.registry().upsert(&reg) {
        Ok(reg) => Json(json!({ "success": true, "registration": reg })).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn delete_registration(
    State(engine): AppState,
    Path(kinds): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(kind) = TriggerKind::from_plural(&kinds) else {
        return not_found(format!("unknown registry '{}'", kinds));
    };
    let Some(id) = params.get("id").filter(|id| !id.is_empty()) else {
        return HookflowError::BadRequest("id is required".to_string()).into_response();
    };
    match engine.registry().delete(kind, id) {
        Ok(deleted) => Json(json!({ "success": true, "deleted": deleted })).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn trigger(
    State(engine): AppState,
    Path((kind, mode, id)): Path<(String, String, String)>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (Ok(kind), Some(mode)) = (kind.parse::<TriggerKind>(), ExecutionMode::from_segment(&mode)) else {
        return not_found(format!("no trigger route /{}/{}", kind, mode));
    };
    let inbound = Inbound {
        method,
        query,
        headers,
        body,
    };
    dispatch::dispatch(engine, kind, mode, &id, inbound).await
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    limit: Option<usize>,
}

pub async fn list_calls(
    State(engine): AppState,
    Path((kind, id)): Path<(String, String)>,
    Query(params): Query<LimitParams>,
) -> Response {
    let Some(kind) = kind.parse::<TriggerKind>().ok().or_else(|| TriggerKind::from_plural(&kind)) else {
        return not_found(format!("unknown trigger kind '{}'", kind));
    };
    match engine.calls(kind, &id, params.limit.unwrap_or(DEFAULT_CALL_LIMIT)) {
        Ok(calls) => Json(json!({ "calls": calls })).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    execution_id: String,
    event_type: String,
    node_id: Option<String>,
    edge_id: Option<String>,
    #[serde(default)]
    data: Value,
}

pub async fn append_event(
    State(engine): AppState,
    Json(body): Json<EventBody>,
) -> Response {
    if body.execution_id.is_empty() {
        return HookflowError::BadRequest("executionId is required".to_string()).into_response();
    }
    let Ok(event_type) = body.event_type.parse::<EventType>() else {
        return HookflowError::BadRequest(format!("unknown eventType '{}'", body.event_type)).into_response();
    };
    let id = engine.recorder().append(&body.execution_id, event_type, body.node_id.as_deref(), body.edge_id.as_deref(), body.data);
    Json(json!({ "success": id.is_some(), "id": id })).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinceParams {
    since_id: Option<i64>,
}

pub async fn list_events(
    State(engine): AppState,
    Path(execution_id): Path<String>,
    Query(params): Query<SinceParams>,
) -> Result<Json<Value>> {
    let events: Vec<ExecutionEvent> = engine.recorder().list_since(&execution_id, params.since_id)?;
    Ok(Json(json!({ "events": events })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteNodeBody {
    node: NodeModel,
    #[serde(default)]
    input_data: Value,
    #[serde(default)]
    execution_context: Option<ExecutionContext>,
}

async fn bearer_identity(
    engine: &Engine,
    headers: &HeaderMap,
) -> Result<Option<Identity>> {
    let token = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).and_then(|v| v.strip_prefix("Bearer ")).map(str::trim).filter(|t| !t.is_empty());
    match token {
        Some(token) => match engine.gateway().authenticate(token).await? {
            Some(identity) => Ok(Some(identity)),
            None => Err(HookflowError::Unauthorized("invalid or expired token".to_string())),
        },
        None => Ok(None),
    }
}

pub async fn execute_node(
    State(engine): AppState,
    headers: HeaderMap,
    Json(body): Json<ExecuteNodeBody>,
) -> Result<Json<Value>> {
    let identity = bearer_identity(&engine, &headers).await?;
    let execution = body.execution_context.unwrap_or_default();
    let outcome = engine.execute_node(&body.node, body.input_data, &execution, identity).await;
    let mut reply = json!({ "output": outcome.output, "logs": outcome.logs });
    if let Some(err) = outcome.error {
        reply["error"] = Value::String(err);
    }
    Ok(Json(reply))
}

pub async fn get_execution(
    State(engine): AppState,
    Path(execution_id): Path<String>,
) -> Response {
    match engine.execution(&execution_id) {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => not_found(format!("execution '{}' not found", execution_id)),
        Err(err) => err.into_response(),
    }
}
