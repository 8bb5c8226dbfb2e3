use serde::{Deserialize, Serialize};

#[derive(Default, Deserialize, Serialize, Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub execution_id: String,
    pub event_type: String,
    pub node_id: Option<String>,
    pub edge_id: Option<String>,
    /// event payload as JSON text
    pub data: String,
    pub timestamp: i64,
}
