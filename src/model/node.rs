use serde::{Deserialize, Serialize};

use crate::common::Vars;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeModel {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Vars,
}
