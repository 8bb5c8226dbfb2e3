use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Workflow {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub status: Option<String>,
    /// full workflow document as JSON text
    pub data: String,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Workflow {
    fn iden() -> StoreIden {
        StoreIden::Workflows
    }
}
