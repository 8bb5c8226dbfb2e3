use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use crate::{
    Result,
    store::{DbCollection, DbStore, Store, data::*, map_db_err},
};

use super::{DbInit, collection::*, synclient::SynClient};

pub struct PostgresStore {
    registrations: Arc<RegistrationCollection>,
    workflows: Arc<WorkflowCollection>,
    executions: Arc<ExecutionCollection>,
    calls: Arc<CallCollection>,
    credentials: Arc<CredentialCollection>,
    tokens: Arc<TokenCollection>,
    events: Arc<EventCollection>,
    usage: Arc<UsageCollection>,
}

impl DbStore for PostgresStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        self.registrations.init()?;
        self.workflows.init()?;
        self.executions.init()?;
        self.calls.init()?;
        self.credentials.init()?;
        self.tokens.init()?;
        self.events.init()?;
        self.usage.init()?;
        info!("postgres tables ready");

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

impl PostgresStore {
    pub fn new(
        db_url: &str,
        handle: Handle,
    ) -> Result<Self> {
        let conn = Arc::new(SynClient::connect(db_url, handle).map_err(map_db_err)?);

        Ok(Self {
            registrations: Arc::new(RegistrationCollection::new(&conn)),
            workflows: Arc::new(WorkflowCollection::new(&conn)),
            executions: Arc::new(ExecutionCollection::new(&conn)),
            calls: Arc::new(CallCollection::new(&conn)),
            credentials: Arc::new(CredentialCollection::new(&conn)),
            tokens: Arc::new(TokenCollection::new(&conn)),
            events: Arc::new(EventCollection::new(&conn)),
            usage: Arc::new(UsageCollection::new(&conn)),
        })
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
