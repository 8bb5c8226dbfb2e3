//! Application context.
//!
//! The engine is built once at start-up and handed to every request handler.
//! It owns the store and every component built on it, and drives workflow
//! runs from an entry node to their execution record's terminal status.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{AsRefStr, EnumString};
use tracing::{error, info};

use crate::{
    Config, HookflowError, Result,
    dispatch::Uploads,
    events::{EventSink, EventType, ExecutionSink, Recorder},
    gateway::{Capabilities, Identity, StoreGateway},
    loader::WorkflowLoader,
    model::{NodeModel, WorkflowModel},
    registry::{TriggerKind, TriggerRegistry},
    runtime::{ExecutionContext, Process},
    store::{Store, data, query::Query},
    utils,
    workflow::{Node, NodeExecutor, NodeOutcome, Workflow},
};

/// Whether a trigger request may run its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionMode {
    Production,
    Test,
}

impl ExecutionMode {
    /// Parses the `prod`/`test` segment of a trigger url.
    pub fn from_segment(s: &str) -> Option<Self> {
        match s {
            "prod" | "production" => Some(ExecutionMode::Production),
            "test" => Some(ExecutionMode::Test),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

/// One dispatched run, as reported by `GET /workflow/executions/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    pub workflow_id: String,
    pub owner_user_id: String,
    pub trigger_id: Option<String>,
    pub mode: ExecutionMode,
    pub trigger_kind: TriggerKind,
    pub trigger_payload: Value,
    pub status: ExecutionStatus,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub succeeded: i64,
    pub failed: i64,
}

impl TryFrom<&data::Execution> for ExecutionRecord {
    type Error = HookflowError;

    fn try_from(row: &data::Execution) -> Result<Self> {
        let invalid = |field: &str, value: &str| HookflowError::Store(format!("invalid {} '{}' in execution {}", field, value, row.id));
        Ok(Self {
            id: row.id.clone(),
            workflow_id: row.workflow_id.clone(),
            owner_user_id: row.owner_user_id.clone(),
            trigger_id: row.trigger_id.clone(),
            mode: row.mode.parse().map_err(|_| invalid("mode", &row.mode))?,
            trigger_kind: row.trigger_kind.parse().map_err(|_| invalid("trigger kind", &row.trigger_kind))?,
            trigger_payload: serde_json::from_str(&row.trigger_payload).unwrap_or(Value::Null),
            status: row.status.parse().map_err(|_| invalid("status", &row.status))?,
            started_at: row.started_at,
            finished_at: (row.finished_at > 0).then_some(row.finished_at),
            succeeded: row.succeeded,
            failed: row.failed,
        })
    }
}

/// Raw trigger request kept for history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: String,
    pub kind: TriggerKind,
    pub trigger_id: String,
    pub mode: ExecutionMode,
    pub payload: Value,
    pub timestamp: i64,
}

pub struct Engine {
    config: Config,
    store: Arc<Store>,
    registry: TriggerRegistry,
    loader: WorkflowLoader,
    gateway: Arc<StoreGateway>,
    recorder: Arc<Recorder>,
    executor: NodeExecutor,
    uploads: Uploads,
    http: reqwest::Client,
}

impl Engine {
    pub(crate) fn new(
        config: Config,
        store: Arc<Store>,
    ) -> Self {
        let http = reqwest::Client::new();
        Self {
            registry: TriggerRegistry::new(store.clone()),
            loader: WorkflowLoader::new(store.clone()),
            gateway: Arc::new(StoreGateway::new(store.clone())),
            recorder: Arc::new(Recorder::new(store.clone())),
            executor: NodeExecutor::new(&config),
            uploads: Uploads::new(&config, http.clone()),
            http,
            store,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &WorkflowLoader {
        &self.loader
    }

    pub fn gateway(&self) -> &Arc<StoreGateway> {
        &self.gateway
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    pub fn uploads(&self) -> &Uploads {
        &self.uploads
    }

    /// Writes a workflow document to the document store.
    pub fn deploy(
        &self,
        workflow: &WorkflowModel,
    ) -> Result<bool> {
        self.store.deploy(workflow)
    }

    fn capabilities(
        &self,
        identity: Option<Identity>,
    ) -> Capabilities {
        Capabilities::new(identity, self.gateway.clone(), self.http.clone())
    }

    /// Persists the raw request of a trigger call.
    pub fn record_call(
        &self,
        kind: TriggerKind,
        trigger_id: &str,
        mode: ExecutionMode,
        payload: &Value,
    ) -> Result<String> {
        let row = data::Call {
            id: utils::longid(),
            kind: kind.as_ref().to_string(),
            trigger_id: trigger_id.to_string(),
            mode: mode.as_ref().to_string(),
            payload: payload.to_string(),
            timestamp: utils::time::time_millis(),
        };
        self.store.calls().create(&row)?;
        Ok(row.id)
    }

    /// Latest calls of a trigger, newest first.
    pub fn calls(
        &self,
        kind: TriggerKind,
        trigger_id: &str,
        limit: usize,
    ) -> Result<Vec<CallRecord>> {
        let query = Query::new().with_filter("kind", kind.as_ref()).with_filter("trigger_id", trigger_id).with_order("timestamp", true).with_limit(limit);
        let page = self.store.calls().query(&query)?;
        page.rows
            .iter()
            .map(|row| {
                Ok(CallRecord {
                    id: row.id.clone(),
                    kind,
                    trigger_id: row.trigger_id.clone(),
                    mode: row.mode.parse().map_err(|_| HookflowError::Store(format!("invalid mode '{}' in call {}", row.mode, row.id)))?,
                    payload: serde_json::from_str(&row.payload).unwrap_or(Value::Null),
                    timestamp: row.timestamp,
                })
            })
            .collect()
    }

    /// Creates the running record of a production run and returns its id.
    pub fn create_execution(
        &self,
        workflow: &WorkflowModel,
        kind: TriggerKind,
        trigger_id: &str,
        payload: &Value,
    ) -> Result<String> {
        let row = data::Execution {
            id: utils::execution_id(),
            workflow_id: workflow.id.clone(),
            owner_user_id: workflow.owner_user_id.clone(),
            trigger_id: Some(trigger_id.to_string()),
            mode: ExecutionMode::Production.as_ref().to_string(),
            trigger_kind: kind.as_ref().to_string(),
            trigger_payload: payload.to_string(),
            status: ExecutionStatus::Running.as_ref().to_string(),
            started_at: utils::time::time_millis(),
            finished_at: 0,
            succeeded: 0,
            failed: 0,
        };
        self.store.executions().create(&row)?;
        Ok(row.id)
    }

    pub fn execution(
        &self,
        execution_id: &str,
    ) -> Result<Option<ExecutionRecord>> {
        self.store.executions().find(execution_id)?.as_ref().map(ExecutionRecord::try_from).transpose()
    }

    fn finish_execution(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        succeeded: usize,
        failed: usize,
    ) -> Result<()> {
        let Some(mut row) = self.store.executions().find(execution_id)? else {
            return Err(HookflowError::Store(format!("execution {} not found", execution_id)));
        };
        row.status = status.as_ref().to_string();
        row.finished_at = utils::time::time_millis();
        row.succeeded = succeeded as i64;
        row.failed = failed as i64;
        self.store.executions().update(&row)?;
        Ok(())
    }

    /// Runs `workflow` from `entry_node_id` and settles the execution record.
    ///
    /// Node failures do not fail the call; the record ends `failed` when any
    /// node errored. A graph that cannot be built ends the run right after
    /// `workflow_start` with a failed `workflow_end` and an empty context.
    /// Errors come only from the execution record store.
    pub async fn execute(
        &self,
        execution_id: &str,
        workflow: &WorkflowModel,
        entry_node_id: &str,
        payload: Value,
        identity: Option<Identity>,
    ) -> Result<ExecutionContext> {
        let sink = ExecutionSink::new(self.recorder.clone(), execution_id);
        let graph = match Workflow::try_from(workflow) {
            Ok(graph) => Arc::new(graph),
            Err(err) => {
                error!(execution = %execution_id, workflow = %workflow.id, "invalid workflow graph: {}", err);
                sink.emit(EventType::WorkflowStart, None, None, json!({ "workflowId": workflow.id, "triggerPayload": payload }));
                sink.emit(
                    EventType::WorkflowEnd,
                    None,
                    None,
                    json!({ "status": ExecutionStatus::Failed.as_ref(), "succeeded": 0, "failed": 0, "error": err.to_string() }),
                );
                self.finish_execution(execution_id, ExecutionStatus::Failed, 0, 0)?;
                return Ok(ExecutionContext::new());
            }
        };

        info!(execution = %execution_id, workflow = %workflow.id, entry = %entry_node_id, "execution started");
        let process = Process::new(graph, self.executor.clone(), self.capabilities(identity));
        let ctx = process.run(entry_node_id, payload, &sink).await;

        let status = if ctx.failed() > 0 || ctx.is_empty() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        self.finish_execution(execution_id, status, ctx.succeeded(), ctx.failed())?;
        info!(execution = %execution_id, status = status.as_ref(), "execution finished");
        Ok(ctx)
    }

    /// Runs one node outside of any graph.
    pub async fn execute_node(
        &self,
        node: &NodeModel,
        input: Value,
        execution: &ExecutionContext,
        identity: Option<Identity>,
    ) -> NodeOutcome {
        let node = Node::from(node);
        self.executor.execute(&node, input, execution, &self.capabilities(identity)).await
    }
}
