//! Connections between nodes.

use serde::{Deserialize, Serialize};

use crate::{model::ConnectionModel, workflow::node::NodeId};

/// Unique identifier for an edge within a workflow.
pub type EdgeId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl From<&ConnectionModel> for Edge {
    fn from(model: &ConnectionModel) -> Self {
        let id = if model.id.is_empty() {
            format!("{}->{}", model.source_node_id, model.target_node_id)
        } else {
            model.id.clone()
        };
        Self {
            id,
            source: model.source_node_id.clone(),
            target: model.target_node_id.clone(),
        }
    }
}
