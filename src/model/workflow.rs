use serde::{Deserialize, Serialize};

use crate::{
    HookflowError, Result,
    model::{ConnectionModel, NodeModel},
};

/// Status value under which production triggers execute a workflow.
pub const WORKFLOW_STATUS_ACTIVE: &str = "active";

/// Workflow document as held by the external document store.
///
/// `status` is kept verbatim, including its absence: production dispatch
/// gates on it and must not read a missing status as active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowModel {
    pub id: String,
    #[serde(default, alias = "userId")]
    pub owner_user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub nodes: Vec<NodeModel>,
    #[serde(default, alias = "edges", deserialize_with = "null_as_empty")]
    pub connections: Vec<ConnectionModel>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl WorkflowModel {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<WorkflowModel>(s).map_err(|e| HookflowError::Workflow(format!("{}", e)))
    }

    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some(WORKFLOW_STATUS_ACTIVE)
    }
}

#[cfg(test)]
mod test {
    use super::WorkflowModel;

    #[test]
    fn test_missing_collections_normalize_to_empty() {
        let wf = WorkflowModel::from_json(r#"{"id": "w1", "ownerUserId": "u1", "nodes": null}"#).unwrap();
        assert!(wf.nodes.is_empty());
        assert!(wf.connections.is_empty());
    }

    #[test]
    fn test_status_is_preserved_verbatim() {
        let wf = WorkflowModel::from_json(r#"{"id": "w1", "ownerUserId": "u1"}"#).unwrap();
        assert_eq!(wf.status, None);
        assert!(!wf.is_active());

        let wf = WorkflowModel::from_json(r#"{"id": "w1", "ownerUserId": "u1", "status": "paused"}"#).unwrap();
        assert_eq!(wf.status.as_deref(), Some("paused"));
    }

    #[test]
    fn test_parse_nodes_and_connections() {
        let wf = WorkflowModel::from_json(
            r#"{
                "id": "w1",
                "userId": "u1",
                "status": "active",
                "nodes": [
                    {"id": "t", "type": "webhook_trigger", "config": {"webhookId": "wh1"}},
                    {"id": "n", "type": "no_op"}
                ],
                "connections": [{"id": "c1", "sourceNodeId": "t", "targetNodeId": "n"}]
            }"#,
        )
        .unwrap();
        assert!(wf.is_active());
        assert_eq!(wf.owner_user_id, "u1");
        assert_eq!(wf.nodes[0].config.get_str("webhookId"), Some("wh1"));
        assert_eq!(wf.connections[0].target_node_id, "n");
    }
}
