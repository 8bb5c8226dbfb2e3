use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Usage {
    /// `{user_id}/{period}`
    pub id: String,
    pub user_id: String,
    pub period: String,
    pub api_calls: i64,
}

impl Usage {
    pub fn key(
        user_id: &str,
        period: &str,
    ) -> String {
        format!("{}/{}", user_id, period)
    }
}
