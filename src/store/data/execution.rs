use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Execution {
    pub id: String,
    pub workflow_id: String,
    pub owner_user_id: String,
    pub trigger_id: Option<String>,
    pub mode: String,
    pub trigger_kind: String,
    /// trigger payload as JSON text
    pub trigger_payload: String,
    pub status: String,
    pub started_at: i64,
    pub finished_at: i64,
    pub succeeded: i64,
    pub failed: i64,
}

impl DbCollectionIden for Execution {
    fn iden() -> StoreIden {
        StoreIden::Executions
    }
}
