use serde::{Deserialize, Serialize};

use crate::{
    common::Vars,
    model::NodeModel,
    workflow::actions::ActionType,
};

/// node id
pub type NodeId = String;

/// Runtime node: the document node plus its resolved action type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Vars,
    /// `None` for types without a built-in implementation
    #[serde(skip)]
    pub action_type: Option<ActionType>,
}

impl Node {
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Trigger nodes only pass their payload on.
    pub fn is_trigger(&self) -> bool {
        self.action_type.is_some_and(|t| t.is_trigger())
    }

    /// Whether this node's config carries `trigger_id` under `config_key`.
    pub fn references_trigger(
        &self,
        config_key: &str,
        trigger_id: &str,
    ) -> bool {
        self.config.get_str(config_key) == Some(trigger_id)
    }
}

impl From<&NodeModel> for Node {
    fn from(model: &NodeModel) -> Self {
        Self {
            id: model.id.clone(),
            node_type: model.node_type.clone(),
            name: model.name.clone(),
            config: model.config.clone(),
            action_type: model.node_type.parse().ok(),
        }
    }
}
