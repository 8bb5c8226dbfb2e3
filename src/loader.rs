//! Read-only access to workflow documents.

use std::sync::Arc;

use tracing::trace;

use crate::{Result, model::WorkflowModel, store::Store};

pub struct WorkflowLoader {
    store: Arc<Store>,
}

impl WorkflowLoader {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
        }
    }

    /// Loads `workflow_id` if it exists and belongs to `owner_user_id`.
    ///
    /// A document owned by someone else is reported as absent. The stored
    /// status is returned as is.
    pub fn load(
        &self,
        owner_user_id: &str,
        workflow_id: &str,
    ) -> Result<Option<WorkflowModel>> {
        trace!("loader::load({}/{})", owner_user_id, workflow_id);
        let Some(row) = self.store.workflows().find(workflow_id)? else {
            return Ok(None);
        };
        if row.owner_user_id != owner_user_id {
            return Ok(None);
        }

        let mut model = WorkflowModel::from_json(&row.data)?;
        if model.owner_user_id.is_empty() {
            model.owner_user_id = row.owner_user_id;
        }
        Ok(Some(model))
    }
}
