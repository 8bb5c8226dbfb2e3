//! Execution events.
//!
//! A run reports its progress through an [`EventSink`]. The engine's sink
//! appends to the [`Recorder`], which persists the events for polling
//! for polling clients.

mod recorder;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, EnumString};

use crate::{HookflowError, Result, store::data};

pub use recorder::Recorder;

/// Lifecycle notification kinds, in the order a run emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    WorkflowStart,
    NodeStart,
    NodeEnd,
    EdgeTraverse,
    WorkflowEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    /// Strictly increasing within one execution.
    pub id: i64,
    pub execution_id: String,
    pub event_type: EventType,
    pub node_id: Option<String>,
    pub edge_id: Option<String>,
    pub data: Value,
    pub timestamp: i64,
}

impl TryFrom<&data::Event> for ExecutionEvent {
    type Error = HookflowError;

    fn try_from(row: &data::Event) -> Result<Self> {
        let event_type = row.event_type.parse::<EventType>().map_err(|_| HookflowError::Store(format!("unknown event type '{}' in event {}", row.event_type, row.id)))?;
        Ok(Self {
            id: row.id,
            execution_id: row.execution_id.clone(),
            event_type,
            node_id: row.node_id.clone(),
            edge_id: row.edge_id.clone(),
            data: serde_json::from_str(&row.data).unwrap_or_else(|_| Value::String(row.data.clone())),
            timestamp: row.timestamp,
        })
    }
}

/// Receiver of one run's lifecycle events.
///
/// Emitting never fails the run, sinks deal with their own errors.
pub trait EventSink: Send + Sync {
    fn emit(
        &self,
        event_type: EventType,
        node_id: Option<&str>,
        edge_id: Option<&str>,
        data: Value,
    );
}

/// Sink writing one execution's events to the recorder.
#[derive(Clone)]
pub struct ExecutionSink {
    recorder: Arc<Recorder>,
    execution_id: String,
}

impl ExecutionSink {
    pub fn new(
        recorder: Arc<Recorder>,
        execution_id: &str,
    ) -> Self {
        Self {
            recorder,
            execution_id: execution_id.to_string(),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }
}

impl EventSink for ExecutionSink {
    fn emit(
        &self,
        event_type: EventType,
        node_id: Option<&str>,
        edge_id: Option<&str>,
        data: Value,
    ) {
        self.recorder.append(&self.execution_id, event_type, node_id, edge_id, data);
    }
}
