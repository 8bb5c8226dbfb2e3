use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

/// Raw inbound trigger request, kept for debugging and history.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Call {
    pub id: String,
    pub kind: String,
    pub trigger_id: String,
    pub mode: String,
    pub payload: String,
    pub timestamp: i64,
}

impl DbCollectionIden for Call {
    fn iden() -> StoreIden {
        StoreIden::Calls
    }
}
