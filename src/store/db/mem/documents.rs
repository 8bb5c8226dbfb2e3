use crate::store::{data::*, db::mem::DbDocument};

impl DbDocument for Registration {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DbDocument for Workflow {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DbDocument for Execution {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DbDocument for Call {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DbDocument for Credential {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DbDocument for ApiToken {
    fn id(&self) -> &str {
        &self.id
    }
}
