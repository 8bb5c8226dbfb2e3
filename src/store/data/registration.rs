use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Registration {
    /// `{kind}:{trigger_id}`
    pub id: String,
    pub kind: String,
    pub trigger_id: String,
    pub owner_user_id: String,
    pub workflow_id: String,
    pub method: Option<String>,
    pub status: String,
    pub create_time: i64,
    pub update_time: i64,
}

impl Registration {
    pub fn key(
        kind: &str,
        trigger_id: &str,
    ) -> String {
        format!("{}:{}", kind, trigger_id)
    }
}

impl DbCollectionIden for Registration {
    fn iden() -> StoreIden {
        StoreIden::Registrations
    }
}
