//! Graph execution state machine.

use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, RwLock},
    time::Instant,
};

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
    events::{EventSink, EventType},
    gateway::Capabilities,
    runtime::{ExecutionContext, NodeRun},
    utils,
    workflow::{NodeExecutor, Workflow},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProcessState {
    #[default]
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// One run of a workflow graph from an entry node.
pub struct Process {
    workflow: Arc<Workflow>,
    executor: NodeExecutor,
    capabilities: Capabilities,
    state: RwLock<ProcessState>,
}

impl Process {
    pub fn new(
        workflow: Arc<Workflow>,
        executor: NodeExecutor,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            workflow,
            executor,
            capabilities,
            state: RwLock::new(ProcessState::NotStarted),
        }
    }

    pub fn state(&self) -> ProcessState {
        *self.state.read().unwrap()
    }

    fn set_state(
        &self,
        state: ProcessState,
    ) {
        *self.state.write().unwrap() = state;
    }

    /// Input of `node_id`: the trigger payload for the entry node, the
    /// single upstream output verbatim, or all upstream outputs as an array
    /// in connection order.
    fn merge_input(
        &self,
        node_id: &str,
        entry_id: &str,
        payload: &Value,
        ctx: &ExecutionContext,
    ) -> Value {
        if node_id == entry_id {
            return payload.clone();
        }
        let mut outputs = self.workflow.incoming(node_id).into_iter().filter_map(|e| ctx.output(&e.source).cloned()).collect::<Vec<_>>();
        match outputs.len() {
            0 => payload.clone(),
            1 => outputs.remove(0),
            _ => Value::Array(outputs),
        }
    }

    /// A node joins once every incoming connection's source has a result,
    /// failed sources included.
    fn is_ready(
        &self,
        node_id: &str,
        ctx: &ExecutionContext,
    ) -> bool {
        self.workflow.incoming(node_id).iter().all(|e| ctx.contains(&e.source))
    }

    /// Walks the graph from `entry_id`. Node failures are recorded and the
    /// walk goes on; the returned context holds every node that ran.
    pub async fn run(
        &self,
        entry_id: &str,
        payload: Value,
        sink: &dyn EventSink,
    ) -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        self.set_state(ProcessState::Running);
        sink.emit(EventType::WorkflowStart, None, None, json!({ "workflowId": self.workflow.id(), "triggerPayload": payload }));

        if self.workflow.node(entry_id).is_none() {
            warn!(workflow = %self.workflow.id(), entry = %entry_id, "entry node not found");
            self.set_state(ProcessState::Failed);
            sink.emit(
                EventType::WorkflowEnd,
                None,
                None,
                json!({
                    "status": ProcessState::Failed.as_ref(),
                    "succeeded": 0,
                    "failed": 0,
                    "error": format!("entry node '{}' not found", entry_id),
                }),
            );
            return ctx;
        }

        let mut ready = VecDeque::from([entry_id.to_string()]);
        let mut enqueued = HashSet::from([entry_id.to_string()]);

        while let Some(node_id) = ready.pop_front() {
            let Some(node) = self.workflow.node(&node_id) else {
                continue;
            };
            let input = self.merge_input(&node_id, entry_id, &payload, &ctx);

            debug!(workflow = %self.workflow.id(), node = %node_id, "node start");
            sink.emit(EventType::NodeStart, Some(&node_id), None, json!({ "nodeType": node.node_type, "name": node.title() }));

            let started = Instant::now();
            let outcome = self.executor.execute(node, input, &ctx, &self.capabilities).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let mut end = json!({
                "success": outcome.error.is_none(),
                "durationMs": duration_ms,
                "output": outcome.output,
                "logs": outcome.logs,
            });
            if let Some(err) = &outcome.error {
                end["error"] = Value::String(err.clone());
            }
            ctx.insert(
                &node_id,
                NodeRun {
                    output: outcome.output,
                    logs: outcome.logs,
                    timestamp: utils::time::time_millis(),
                    error: outcome.error,
                },
            );
            sink.emit(EventType::NodeEnd, Some(&node_id), None, end);

            for edge in self.workflow.outgoing(&node_id) {
                sink.emit(EventType::EdgeTraverse, None, Some(&edge.id), json!({ "source": edge.source, "target": edge.target }));
                if !enqueued.contains(&edge.target) && self.is_ready(&edge.target, &ctx) {
                    enqueued.insert(edge.target.clone());
                    ready.push_back(edge.target.clone());
                }
            }
        }

        let state = if ctx.failed() > 0 {
            ProcessState::Failed
        } else {
            ProcessState::Completed
        };
        self.set_state(state);
        info!(workflow = %self.workflow.id(), succeeded = ctx.succeeded(), failed = ctx.failed(), "workflow finished");
        sink.emit(EventType::WorkflowEnd, None, None, json!({ "status": state.as_ref(), "succeeded": ctx.succeeded(), "failed": ctx.failed() }));
        ctx
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use serde_json::{Value, json};

    use super::{Process, ProcessState};
    use crate::{
        Config, WorkflowModel,
        events::{EventSink, EventType},
        gateway::{Capabilities, StoreGateway},
        store::{DbStore, MemStore, Store},
        workflow::{NodeExecutor, Workflow},
    };

    #[derive(Default)]
    struct VecSink(Mutex<Vec<(EventType, Option<String>, Option<String>, Value)>>);

    impl EventSink for VecSink {
        fn emit(
            &self,
            event_type: EventType,
            node_id: Option<&str>,
            edge_id: Option<&str>,
            data: Value,
        ) {
            self.0.lock().unwrap().push((event_type, node_id.map(String::from), edge_id.map(String::from), data));
        }
    }

    impl VecSink {
        fn trace(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .map(|(t, n, e, _)| match (n, e) {
                    (Some(n), _) => format!("{}({})", t.as_ref(), n),
                    (_, Some(e)) => format!("{}({})", t.as_ref(), e),
                    _ => t.as_ref().to_string(),
                })
                .collect()
        }
    }

    fn process(model: Value) -> Process {
        let model: WorkflowModel = serde_json::from_value(model).unwrap();
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        let caps = Capabilities::new(None, Arc::new(StoreGateway::new(Arc::new(store))), reqwest::Client::new());
        Process::new(Arc::new(Workflow::try_from(&model).unwrap()), NodeExecutor::new(&Config::default()), caps)
    }

    #[tokio::test]
    async fn test_linear_run_event_order() {
        let proc = process(json!({
            "id": "w1",
            "nodes": [
                {"id": "t", "type": "webhook_trigger", "config": {"webhookId": "wh1"}},
                {"id": "n", "type": "no_op"}
            ],
            "connections": [{"id": "e1", "source": "t", "target": "n"}]
        }));
        let sink = VecSink::default();
        let ctx = proc.run("t", json!({"a": 1}), &sink).await;

        assert_eq!(sink.trace(), vec!["workflow_start", "node_start(t)", "node_end(t)", "edge_traverse(e1)", "node_start(n)", "node_end(n)", "workflow_end"]);
        assert_eq!(ctx.output("n"), Some(&json!({"a": 1})));
        assert_eq!(proc.state(), ProcessState::Completed);
    }

    #[tokio::test]
    async fn test_join_waits_for_all_predecessors() {
        let proc = process(json!({
            "id": "w1",
            "nodes": [
                {"id": "t", "type": "webhook_trigger"},
                {"id": "a", "type": "set", "config": {"values": {"from": "a"}, "keepOnlySet": true}},
                {"id": "b", "type": "code", "config": {"code": "throw new Error('b failed');"}},
                {"id": "j", "type": "no_op"}
            ],
            "connections": [
                {"source": "t", "target": "a"},
                {"source": "t", "target": "b"},
                {"source": "a", "target": "j"},
                {"source": "b", "target": "j"}
            ]
        }));
        let sink = VecSink::default();
        let ctx = proc.run("t", json!({}), &sink).await;

        let order = ctx.iter().map(|(id, _)| id.to_string()).collect::<Vec<_>>();
        assert_eq!(order, vec!["t", "a", "b", "j"]);
        assert_eq!(ctx.output("j"), Some(&json!([{"from": "a"}, {"error": "b failed"}])));
        assert_eq!(ctx.failed(), 1);
        assert_eq!(proc.state(), ProcessState::Failed);
        let trace = sink.trace();
        assert_eq!(trace.iter().filter(|t| t.as_str() == "node_start(j)").count(), 1);

        let events = sink.0.lock().unwrap();
        let (_, _, _, end) = events.last().unwrap();
        assert_eq!(end["succeeded"], json!(3));
        assert_eq!(end["failed"], json!(1));
    }

    #[tokio::test]
    async fn test_unreached_predecessor_blocks_join() {
        let proc = process(json!({
            "id": "w1",
            "nodes": [
                {"id": "t", "type": "webhook_trigger"},
                {"id": "other", "type": "chat_trigger"},
                {"id": "j", "type": "no_op"}
            ],
            "connections": [
                {"source": "t", "target": "j"},
                {"source": "other", "target": "j"}
            ]
        }));
        let ctx = proc.run("t", json!({}), &VecSink::default()).await;
        assert_eq!(ctx.len(), 1);
        assert!(!ctx.contains("j"));
    }

    #[tokio::test]
    async fn test_missing_entry_node() {
        let proc = process(json!({"id": "w1", "nodes": [{"id": "t", "type": "webhook_trigger"}]}));
        let sink = VecSink::default();
        let ctx = proc.run("ghost", json!({}), &sink).await;
        assert!(ctx.is_empty());
        assert_eq!(sink.trace(), vec!["workflow_start", "workflow_end"]);
        assert_eq!(proc.state(), ProcessState::Failed);
    }
}
