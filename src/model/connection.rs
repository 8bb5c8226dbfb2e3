use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionModel {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "source")]
    pub source_node_id: String,
    #[serde(alias = "target")]
    pub target_node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_output: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_input: Option<u32>,
}
