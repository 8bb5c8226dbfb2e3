//! Runs one node's logic against its input.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::{
    Config, HookflowError,
    config::SandboxConfig,
    gateway::Capabilities,
    runtime::{Context, ExecutionContext, LogEntry, LogLevel},
    workflow::{Node, actions::create_action},
};

/// What a node produced. `error` is set when the logic failed, `output` then
/// holds `{error: message}`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
    pub output: Value,
    pub logs: Vec<LogEntry>,
    pub error: Option<String>,
}

impl NodeOutcome {
    fn failed(
        message: String,
        mut logs: Vec<LogEntry>,
    ) -> Self {
        logs.push(LogEntry::new(LogLevel::Error, message.clone()));
        Self {
            output: json!({ "error": message }),
            logs,
            error: Some(message),
        }
    }
}

#[derive(Clone)]
pub struct NodeExecutor {
    env: Arc<HashMap<String, String>>,
    sandbox: SandboxConfig,
    networked: Arc<HashSet<String>>,
}

impl NodeExecutor {
    pub fn new(config: &Config) -> Self {
        Self {
            env: Arc::new(config.env.clone()),
            sandbox: config.sandbox.clone(),
            networked: Arc::new(config.metering.networked_node_types.iter().cloned().collect()),
        }
    }

    pub fn is_networked(
        &self,
        node_type: &str,
    ) -> bool {
        self.networked.contains(node_type)
    }

    /// Never fails: compile and runtime errors become the node's output.
    pub async fn execute(
        &self,
        node: &Node,
        input: Value,
        execution: &ExecutionContext,
        capabilities: &Capabilities,
    ) -> NodeOutcome {
        let action = match create_action(node) {
            Ok(action) => action,
            Err(err) => {
                error!(node = %node.id, node_type = %node.node_type, "failed to compile node logic: {}", err);
                return NodeOutcome::failed(err.to_string(), Vec::new());
            }
        };

        let Some(action) = action else {
            debug!(node = %node.id, node_type = %node.node_type, "pass-through node");
            return NodeOutcome {
                output: input,
                logs: vec![LogEntry::new(LogLevel::Info, format!("node '{}' ({}) has no logic, passing input through", node.title(), node.node_type))],
                error: None,
            };
        };

        let ctx = Arc::new(Context::new(node.clone(), input, execution.clone(), self.env.clone(), capabilities.clone()).with_sandbox(self.sandbox.clone()));
        let run = action.run(ctx.clone());
        let result = match self.sandbox.node_timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), run).await.unwrap_or_else(|_| Err(HookflowError::NodeRuntime(format!("node logic timed out after {} ms", ms)))),
            None => run.await,
        };
        let logs = ctx.take_logs();

        match result {
            Ok(output) => {
                if self.is_networked(&node.node_type)
                    && let Err(err) = capabilities.record_api_call().await
                {
                    warn!(node = %node.id, "failed to meter api call: {}", err);
                }
                NodeOutcome {
                    output,
                    logs,
                    error: None,
                }
            }
            Err(err) => {
                error!(node = %node.id, node_type = %node.node_type, error = ?err, "node logic failed: {}", err);
                NodeOutcome::failed(err.to_string(), logs)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use super::NodeExecutor;
    use crate::{
        Config,
        gateway::{Capabilities, Identity, StoreGateway},
        model::NodeModel,
        runtime::{ExecutionContext, LogLevel},
        store::{DbStore, MemStore, Store},
        workflow::Node,
    };

    fn setup() -> (Arc<StoreGateway>, NodeExecutor) {
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        let mut config = Config::default();
        config.metering.networked_node_types.push("set".to_string());
        (Arc::new(StoreGateway::new(Arc::new(store))), NodeExecutor::new(&config))
    }

    fn node(
        node_type: &str,
        config: Value,
    ) -> Node {
        Node::from(&NodeModel {
            id: "n1".to_string(),
            node_type: node_type.to_string(),
            name: None,
            config: config.into(),
        })
    }

    #[tokio::test]
    async fn test_pass_through_is_identity() {
        let (gateway, executor) = setup();
        let caps = Capabilities::new(None, gateway, reqwest::Client::new());
        let input = json!({"a": [1, 2, {"b": null}]});
        let outcome = executor.execute(&node("custom_crm", json!({})), input.clone(), &ExecutionContext::new(), &caps).await;
        assert_eq!(outcome.output, input);
        assert_eq!(outcome.logs.len(), 1);
        assert_eq!(outcome.logs[0].level, LogLevel::Info);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_runtime_error_becomes_output() {
        let (gateway, executor) = setup();
        let caps = Capabilities::new(None, gateway, reqwest::Client::new());
        let outcome = executor.execute(&node("code", json!({"code": "console.log('x'); throw new Error('boom');"})), json!({}), &ExecutionContext::new(), &caps).await;
        assert_eq!(outcome.output, json!({"error": "boom"}));
        assert_eq!(outcome.error.as_deref(), Some("boom"));
        assert_eq!(outcome.logs[0].message, "x");
    }

    #[tokio::test]
    async fn test_compile_error_becomes_output() {
        let (gateway, executor) = setup();
        let caps = Capabilities::new(None, gateway, reqwest::Client::new());
        let outcome = executor.execute(&node("code", json!({"code": "return {"})), json!({}), &ExecutionContext::new(), &caps).await;
        assert!(outcome.error.is_some());
        assert!(outcome.output.get("error").is_some());
    }

    #[tokio::test]
    async fn test_networked_success_is_metered() {
        let (gateway, executor) = setup();
        let identity = Identity::new("u1");
        let caps = Capabilities::new(Some(identity.clone()), gateway.clone(), reqwest::Client::new());
        executor.execute(&node("set", json!({"values": {"a": 1}})), json!({}), &ExecutionContext::new(), &caps).await;
        executor.execute(&node("set", json!({"values": {"a": 1}})), json!({}), &ExecutionContext::new(), &caps).await;
        executor.execute(&node("code", json!({"code": "return 1;"})), json!({}), &ExecutionContext::new(), &caps).await;
        assert_eq!(gateway.api_calls(&identity).unwrap(), 2);
    }
}
