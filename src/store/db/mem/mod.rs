mod collect;
mod documents;
mod event;
mod usage;

use std::{collections::HashMap, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{
    HookflowError, Result,
    store::{DbCollection, DbStore, Store, data::*},
};
pub use collect::Collect;
pub use event::MemEventLog;
pub use usage::MemUsage;

#[derive(Debug, Clone)]
pub struct MemStore {
    registrations: Arc<Collect<Registration>>,
    workflows: Arc<Collect<Workflow>>,
    executions: Arc<Collect<Execution>>,
    calls: Arc<Collect<Call>>,
    credentials: Arc<Collect<Credential>>,
    tokens: Arc<Collect<ApiToken>>,
    events: Arc<MemEventLog>,
    usage: Arc<MemUsage>,
}

/// Row stored by a [`Collect`]. Queries filter and sort over `doc()`.
trait DbDocument: Serialize + DeserializeOwned {
    fn id(&self) -> &str;

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        match serde_json::to_value(self)? {
            JsonValue::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(HookflowError::Store(format!("document {} is not an object", self.id()))),
        }
    }
}

impl DbStore for MemStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        s.register(self.registrations());
        s.register(self.workflows());
        s.register(self.executions());
        s.register(self.calls());
        s.register(self.credentials());
        s.register(self.tokens());
        s.register_events(self.events.clone());
        s.register_usage(self.usage.clone());
        Ok(())
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            registrations: Arc::new(Collect::new("registrations")),
            workflows: Arc::new(Collect::new("workflows")),
            executions: Arc::new(Collect::new("executions")),
            calls: Arc::new(Collect::new("calls")),
            credentials: Arc::new(Collect::new("credentials")),
            tokens: Arc::new(Collect::new("api_tokens")),
            events: Arc::new(MemEventLog::new()),
            usage: Arc::new(MemUsage::new()),
        }
    }

    pub fn registrations(&self) -> Arc<dyn DbCollection<Item = Registration> + Send + Sync> {
        self.registrations.clone()
    }

    pub fn workflows(&self) -> Arc<dyn DbCollection<Item = Workflow> + Send + Sync> {
        self.workflows.clone()
    }

    pub fn executions(&self) -> Arc<dyn DbCollection<Item = Execution> + Send + Sync> {
        self.executions.clone()
    }

    pub fn calls(&self) -> Arc<dyn DbCollection<Item = Call> + Send + Sync> {
        self.calls.clone()
    }

    pub fn credentials(&self) -> Arc<dyn DbCollection<Item = Credential> + Send + Sync> {
        self.credentials.clone()
    }

    pub fn tokens(&self) -> Arc<dyn DbCollection<Item = ApiToken> + Send + Sync> {
        self.tokens.clone()
    }
}
