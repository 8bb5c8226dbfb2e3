use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Credential {
    /// `{owner_user_id}/{credential_id}`
    pub id: String,
    pub credential_id: String,
    pub owner_user_id: String,
    pub name: String,
    pub kind: String,
    /// secret material as JSON text
    pub data: String,
    pub update_time: i64,
}

impl Credential {
    pub fn key(
        owner_user_id: &str,
        credential_id: &str,
    ) -> String {
        format!("{}/{}", owner_user_id, credential_id)
    }
}

impl DbCollectionIden for Credential {
    fn iden() -> StoreIden {
        StoreIden::Credentials
    }
}
