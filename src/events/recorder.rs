use std::sync::Arc;

use serde_json::Value;
use tracing::{trace, warn};

use crate::{
    HookflowError, Result,
    events::{EventType, ExecutionEvent},
    store::{Store, data},
    utils,
};

/// Append-only, poll friendly log of execution events.
pub struct Recorder {
    store: Arc<Store>,
}

impl Recorder {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
        }
    }

    /// Persists one event and returns its id.
    ///
    /// Persistence is best effort: a failing write is logged and reported as
    /// `None`, never as an error.
    pub fn append(
        &self,
        execution_id: &str,
        event_type: EventType,
        node_id: Option<&str>,
        edge_id: Option<&str>,
        data: Value,
    ) -> Option<i64> {
        let timestamp = utils::time::time_millis();
        let row = data::Event {
            id: 0,
            execution_id: execution_id.to_string(),
            event_type: event_type.as_ref().to_string(),
            node_id: node_id.map(str::to_string),
            edge_id: edge_id.map(str::to_string),
            data: data.to_string(),
            timestamp,
        };

        match self.store.events().append(&row) {
            Ok(id) => {
                trace!("recorder::append({}, {}) = {}", execution_id, event_type.as_ref(), id);
                Some(id)
            }
            Err(err) => {
                let err = HookflowError::EventPersist(format!("failed to persist {} event of execution {}: {}", event_type.as_ref(), execution_id, err));
                warn!("{}", err);
                None
            }
        }
    }

    /// Events of `execution_id` newer than `since_id`, ascending by id.
    pub fn list_since(
        &self,
        execution_id: &str,
        since_id: Option<i64>,
    ) -> Result<Vec<ExecutionEvent>> {
        self.store.events().list_since(execution_id, since_id)?.iter().map(ExecutionEvent::try_from).collect()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::json;

    use super::Recorder;
    use crate::{
        Result,
        events::EventType,
        store::{DbStore, EventLog, MemStore, Store, data},
    };

    fn recorder() -> Recorder {
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        Recorder::new(Arc::new(store))
    }

    #[test]
    fn test_polling_never_repeats_ids() {
        let recorder = recorder();
        recorder.append("e1", EventType::WorkflowStart, None, None, json!({"workflowId": "w1"}));
        recorder.append("e1", EventType::NodeStart, Some("t"), None, json!({}));

        let first = recorder.list_since("e1", None).unwrap();
        assert_eq!(first.len(), 2);
        assert!(first[0].id < first[1].id);
        assert_eq!(first[0].data, json!({"workflowId": "w1"}));

        recorder.append("e1", EventType::NodeEnd, Some("t"), None, json!({"success": true}));
        let last_seen = first.last().map(|e| e.id);
        let newer = recorder.list_since("e1", last_seen).unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].event_type, EventType::NodeEnd);
        assert!(newer.iter().all(|e| Some(e.id) > last_seen));
    }

    struct FailingLog;

    impl EventLog for FailingLog {
        fn append(
            &self,
            _: &data::Event,
        ) -> Result<i64> {
            Err(crate::HookflowError::Store("disk full".to_string()))
        }

        fn list_since(
            &self,
            _: &str,
            _: Option<i64>,
        ) -> Result<Vec<data::Event>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_write_failures_are_swallowed() {
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        store.register_events(Arc::new(FailingLog));
        let recorder = Recorder::new(Arc::new(store));
        assert_eq!(recorder.append("e1", EventType::NodeStart, Some("n"), None, json!({})), None);
    }
}
