use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

/// Bearer token issued to a user.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ApiToken {
    /// the token itself
    pub id: String,
    pub user_id: String,
    /// 0 when the token never expires
    pub expires_at: i64,
    pub create_time: i64,
}

impl DbCollectionIden for ApiToken {
    fn iden() -> StoreIden {
        StoreIden::Tokens
    }
}
