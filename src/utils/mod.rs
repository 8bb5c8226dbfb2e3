pub mod time;

/// Generates a random url-safe id for records that need no ordering.
pub fn longid() -> String {
    nanoid::nanoid!()
}

/// Generates an execution id.
pub fn execution_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
