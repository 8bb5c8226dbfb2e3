use std::{
    collections::{HashMap, hash_map},
    sync::{Arc, Mutex},
};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    ser::SerializeMap,
};
use serde_json::Value;
use strum::AsRefStr;

use crate::{config::SandboxConfig, gateway::Capabilities, utils, workflow::Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
}

/// One log call made by node logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: i64,
}

impl LogEntry {
    pub fn new(
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: utils::time::time_millis(),
        }
    }
}

/// Result of one node inside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRun {
    pub output: Value,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeRun {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Run scoped map from node id to that node's result.
///
/// Iterates and serializes in the order nodes finished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    runs: HashMap<String, NodeRun>,
    order: Vec<String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        node_id: &str,
        run: NodeRun,
    ) {
        if let hash_map::Entry::Vacant(e) = self.runs.entry(node_id.to_string()) {
            e.insert(run);
            self.order.push(node_id.to_string());
        } else {
            self.runs.insert(node_id.to_string(), run);
        }
    }

    pub fn get(
        &self,
        node_id: &str,
    ) -> Option<&NodeRun> {
        self.runs.get(node_id)
    }

    pub fn output(
        &self,
        node_id: &str,
    ) -> Option<&Value> {
        self.runs.get(node_id).map(|r| &r.output)
    }

    pub fn contains(
        &self,
        node_id: &str,
    ) -> bool {
        self.runs.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Results in completion order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &NodeRun)> {
        self.order.iter().filter_map(|id| self.runs.get(id).map(|run| (id.as_str(), run)))
    }

    pub fn succeeded(&self) -> usize {
        self.runs.values().filter(|r| !r.failed()).count()
    }

    pub fn failed(&self) -> usize {
        self.runs.values().filter(|r| r.failed()).count()
    }
}

impl Serialize for ExecutionContext {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for (id, run) in self.iter() {
            map.serialize_entry(id, run)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ExecutionContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let runs = HashMap::<String, NodeRun>::deserialize(deserializer)?;
        let mut order = runs.keys().cloned().collect::<Vec<_>>();
        order.sort_by(|a, b| runs[a].timestamp.cmp(&runs[b].timestamp).then_with(|| a.cmp(b)));
        Ok(Self {
            runs,
            order,
        })
    }
}

/// Everything one node invocation may look at.
pub struct Context {
    node: Node,
    input: Value,
    items: Vec<Value>,
    execution: ExecutionContext,
    env: Arc<HashMap<String, String>>,
    capabilities: Capabilities,
    sandbox: SandboxConfig,
    logs: Mutex<Vec<LogEntry>>,
}

impl Context {
    pub fn new(
        node: Node,
        input: Value,
        execution: ExecutionContext,
        env: Arc<HashMap<String, String>>,
        capabilities: Capabilities,
    ) -> Self {
        let items = items_of(&input);
        Self {
            node,
            input,
            items,
            execution,
            env,
            capabilities,
            sandbox: SandboxConfig::default(),
            logs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_sandbox(
        mut self,
        sandbox: SandboxConfig,
    ) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Merged input of the node.
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Input flattened into items, never empty.
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn first_item(&self) -> &Value {
        &self.items[0]
    }

    pub fn execution(&self) -> &ExecutionContext {
        &self.execution
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn sandbox(&self) -> &SandboxConfig {
        &self.sandbox
    }

    pub fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
    ) {
        self.logs.lock().unwrap().push(LogEntry::new(level, message));
    }

    pub fn extend_logs(
        &self,
        entries: Vec<LogEntry>,
    ) {
        self.logs.lock().unwrap().extend(entries);
    }

    pub fn take_logs(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.logs.lock().unwrap())
    }
}

/// Splits an input into items: arrays yield their elements, anything else is
/// a single item.
pub fn items_of(input: &Value) -> Vec<Value> {
    match input {
        Value::Array(values) if !values.is_empty() => values.clone(),
        Value::Array(_) => vec![Value::Null],
        other => vec![other.clone()],
    }
}
