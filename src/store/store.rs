use std::{
    any::Any,
    collections::HashMap,
    convert::AsRef,
    sync::{Arc, RwLock},
};

use tracing::trace;

use crate::{HookflowError, Result, ShareLock, model::WorkflowModel, utils};

use super::{DbCollection, DbCollectionIden, EventLog, StoreIden, UsageCounter, data::*};

#[derive(Clone)]
pub struct DynDbSetRef<T>(Arc<dyn DbCollection<Item = T>>);

#[derive(Clone)]
struct DynEventLogRef(Arc<dyn EventLog>);

#[derive(Clone)]
struct DynUsageRef(Arc<dyn UsageCounter>);

/// Registry of the collections a backend provides.
pub struct Store {
    collections: ShareLock<HashMap<StoreIden, Arc<dyn Any + Send + Sync + 'static>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn collection<DATA>(&self) -> Arc<dyn DbCollection<Item = DATA>>
    where
        DATA: DbCollectionIden + Send + Sync + 'static,
    {
        let collections = self.collections.read().unwrap();

        #[allow(clippy::expect_fun_call)]
        let collection = collections.get(&DATA::iden()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()));

        #[allow(clippy::expect_fun_call)]
        collection.downcast_ref::<DynDbSetRef<DATA>>().map(|v| v.0.clone()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()))
    }

    pub fn register<DATA>(
        &self,
        collection: Arc<dyn DbCollection<Item = DATA> + Send + Sync + 'static>,
    ) where
        DATA: DbCollectionIden + 'static,
    {
        let mut collections = self.collections.write().unwrap();
        collections.insert(DATA::iden(), Arc::new(DynDbSetRef::<DATA>(collection)));
    }

    pub fn register_events(
        &self,
        events: Arc<dyn EventLog>,
    ) {
        let mut collections = self.collections.write().unwrap();
        collections.insert(StoreIden::Events, Arc::new(DynEventLogRef(events)));
    }

    pub fn register_usage(
        &self,
        usage: Arc<dyn UsageCounter>,
    ) {
        let mut collections = self.collections.write().unwrap();
        collections.insert(StoreIden::Usage, Arc::new(DynUsageRef(usage)));
    }

    pub fn registrations(&self) -> Arc<dyn DbCollection<Item = Registration>> {
        self.collection()
    }

    pub fn workflows(&self) -> Arc<dyn DbCollection<Item = Workflow>> {
        self.collection()
    }

    pub fn executions(&self) -> Arc<dyn DbCollection<Item = Execution>> {
        self.collection()
    }

    pub fn calls(&self) -> Arc<dyn DbCollection<Item = Call>> {
        self.collection()
    }

    pub fn credentials(&self) -> Arc<dyn DbCollection<Item = Credential>> {
        self.collection()
    }

    pub fn tokens(&self) -> Arc<dyn DbCollection<Item = ApiToken>> {
        self.collection()
    }

    pub fn events(&self) -> Arc<dyn EventLog> {
        let collections = self.collections.read().unwrap();

        #[allow(clippy::expect_fun_call)]
        collections
            .get(&StoreIden::Events)
            .and_then(|c| c.downcast_ref::<DynEventLogRef>())
            .map(|v| v.0.clone())
            .expect(&format!("fail to get collection: {}", StoreIden::Events.as_ref()))
    }

    pub fn usage(&self) -> Arc<dyn UsageCounter> {
        let collections = self.collections.read().unwrap();

        #[allow(clippy::expect_fun_call)]
        collections
            .get(&StoreIden::Usage)
            .and_then(|c| c.downcast_ref::<DynUsageRef>())
            .map(|v| v.0.clone())
            .expect(&format!("fail to get collection: {}", StoreIden::Usage.as_ref()))
    }

    /// Writes a workflow document, creating or replacing it.
    pub fn deploy(
        &self,
        workflow: &WorkflowModel,
    ) -> Result<bool> {
        trace!("store::deploy({})", workflow.id);
        if workflow.id.is_empty() {
            return Err(HookflowError::Workflow("missing id in workflow".into()));
        }
        if workflow.owner_user_id.is_empty() {
            return Err(HookflowError::Workflow(format!("missing owner in workflow {}", workflow.id)));
        }
        let text = serde_json::to_string(workflow)?;
        let workflows = self.workflows();
        match workflows.find(&workflow.id)? {
            Some(m) => {
                let data = Workflow {
                    id: workflow.id.clone(),
                    owner_user_id: workflow.owner_user_id.clone(),
                    name: workflow.name.clone(),
                    status: workflow.status.clone(),
                    data: text,
                    create_time: m.create_time,
                    update_time: utils::time::time_millis(),
                };
                workflows.update(&data)
            }
            None => {
                let data = Workflow {
                    id: workflow.id.clone(),
                    owner_user_id: workflow.owner_user_id.clone(),
                    name: workflow.name.clone(),
                    status: workflow.status.clone(),
                    data: text,
                    create_time: utils::time::time_millis(),
                    update_time: 0,
                };
                workflows.create(&data)
            }
        }
    }
}
