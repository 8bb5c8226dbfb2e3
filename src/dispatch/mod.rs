//! Trigger dispatch.
//!
//! Webhook, chat and form requests share one pipeline:
//!
//! 1. look the trigger up in the registry, unknown ids end here
//! 2. check the kind's precondition (webhooks gate on the method)
//! 3. normalize the payload and keep the raw call for history
//! 4. test mode echoes the payload; production gates on the registration
//!    status, loads the workflow, gates on its stored status and starts a run
//!    from the trigger's node
//! 5. answer the way the kind answers: webhook and form acknowledge and run
//!    in the background, chat waits for the run and replies

pub mod payload;
mod reply;
mod upload;

use std::sync::Arc;

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::{
    Engine, HookflowError, Result,
    engine::ExecutionMode,
    gateway::Identity,
    model::WorkflowModel,
    registry::{TriggerKind, TriggerRegistration},
    workflow::Node,
};

pub use payload::{Inbound, Normalized};
pub use reply::{NO_RESPONSE, extract_reply};
pub use upload::{FileLocation, FileStore, LocalFileStore, ObjectFileStore, StoredFile, UploadedFile, Uploads};

const DEFAULT_FORM_SUCCESS_MESSAGE: &str = "Form submitted successfully";

/// Runs the pipeline and renders its outcome. Errors become `{error, details}`
/// replies, an inactive workflow becomes a 200 skip.
pub async fn dispatch(
    engine: Arc<Engine>,
    kind: TriggerKind,
    mode: ExecutionMode,
    trigger_id: &str,
    inbound: Inbound,
) -> Response {
    match run_pipeline(engine, kind, mode, trigger_id, inbound).await {
        Ok(value) => Json(value).into_response(),
        Err(HookflowError::WorkflowInactive(workflow_id)) => {
            info!(trigger = %trigger_id, workflow = %workflow_id, "workflow not active, execution skipped");
            Json(json!({
                "status": "ok",
                "message": format!("Workflow '{}' is not active, execution skipped", workflow_id),
            }))
            .into_response()
        }
        Err(err) => {
            if err.status_code().is_server_error() {
                error!(kind = kind.as_ref(), trigger = %trigger_id, "dispatch failed: {}", err);
            }
            err.into_response()
        }
    }
}

fn check_precondition(
    kind: TriggerKind,
    reg: &TriggerRegistration,
    inbound: &Inbound,
) -> Result<()> {
    if kind == TriggerKind::Webhook
        && let Some(expected) = reg.method.as_deref()
        && !expected.eq_ignore_ascii_case(inbound.method.as_str())
    {
        return Err(HookflowError::MethodMismatch {
            expected: expected.to_string(),
            actual: inbound.method.to_string(),
        });
    }
    Ok(())
}

fn find_entry_node(
    workflow: &WorkflowModel,
    kind: TriggerKind,
    trigger_id: &str,
) -> Result<Node> {
    workflow.nodes.iter().map(Node::from).find(|n| n.references_trigger(kind.config_key(), trigger_id)).ok_or_else(|| HookflowError::TriggerNodeMissing {
        workflow_id: workflow.id.clone(),
        trigger_id: trigger_id.to_string(),
    })
}

async fn run_pipeline(
    engine: Arc<Engine>,
    kind: TriggerKind,
    mode: ExecutionMode,
    trigger_id: &str,
    inbound: Inbound,
) -> Result<Value> {
    let reg = engine.registry().get_by_id(kind, trigger_id)?.ok_or_else(|| HookflowError::RegistrationNotFound(trigger_id.to_string()))?;
    check_precondition(kind, &reg, &inbound)?;

    let Normalized {
        mut payload,
        files,
    } = payload::normalize(kind, trigger_id, inbound).await?;
    if let Err(err) = engine.record_call(kind, trigger_id, mode, &payload) {
        warn!(kind = kind.as_ref(), trigger = %trigger_id, "failed to record call: {}", err);
    }

    if mode == ExecutionMode::Test {
        return Ok(json!({
            "status": "ok",
            "mode": mode.as_ref(),
            "message": "Test trigger received, workflow not executed",
            "payload": payload,
        }));
    }

    if !reg.is_active() {
        return Err(HookflowError::WorkflowInactive(reg.workflow_id.clone()));
    }
    let workflow = engine.loader().load(&reg.owner_user_id, &reg.workflow_id)?.ok_or_else(|| HookflowError::WorkflowDocumentMissing(reg.workflow_id.clone()))?;
    if !workflow.is_active() {
        return Err(HookflowError::WorkflowInactive(workflow.id.clone()));
    }
    let entry = find_entry_node(&workflow, kind, trigger_id)?;

    if !files.is_empty() {
        let submitted_at = submitted_at_millis(&payload);
        let refs = engine.uploads().persist(&entry.config, &files, submitted_at).await?;
        payload["files"] = Value::Object(refs);
    }

    let execution_id = engine.create_execution(&workflow, kind, trigger_id, &payload)?;
    let identity = Some(Identity::new(&reg.owner_user_id));
    info!(kind = kind.as_ref(), trigger = %trigger_id, execution = %execution_id, "dispatching workflow {}", workflow.id);

    match kind {
        TriggerKind::Chat => {
            let ctx = engine.execute(&execution_id, &workflow, &entry.id, payload, identity).await?;
            Ok(json!({
                "status": "ok",
                "executionId": execution_id,
                "message": extract_reply(&workflow, &ctx),
            }))
        }
        TriggerKind::Webhook | TriggerKind::Form => {
            spawn_execution(engine.clone(), execution_id.clone(), workflow, entry.id.clone(), payload, identity);
            if kind == TriggerKind::Webhook {
                return Ok(json!({
                    "status": "ok",
                    "executionId": execution_id,
                    "message": "Workflow execution started",
                }));
            }
            match entry.config.get_str("redirectUrl") {
                Some(url) => Ok(json!({
                    "status": "ok",
                    "redirect": url,
                    "executionId": execution_id,
                })),
                None => Ok(json!({
                    "status": "ok",
                    "executionId": execution_id,
                    "message": entry.config.get_str("successMessage").unwrap_or(DEFAULT_FORM_SUCCESS_MESSAGE),
                })),
            }
        }
    }
}

/// Millisecond submission time of a form payload, now when it cannot be read.
fn submitted_at_millis(payload: &Value) -> i64 {
    payload
        .get("submittedAt")
        .and_then(Value::as_str)
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.timestamp_millis())
        .unwrap_or_else(crate::utils::time::time_millis)
}

fn spawn_execution(
    engine: Arc<Engine>,
    execution_id: String,
    workflow: WorkflowModel,
    entry_id: String,
    payload: Value,
    identity: Option<Identity>,
) {
    tokio::spawn(async move {
        if let Err(err) = engine.execute(&execution_id, &workflow, &entry_id, payload, identity).await {
            error!(execution = %execution_id, "background execution failed: {}", err);
        }
    });
}
