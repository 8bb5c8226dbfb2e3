use std::{collections::HashMap, sync::RwLock};

use crate::{
    Result,
    store::{EventLog, data::Event},
};

#[derive(Debug, Default)]
struct EventRows {
    next_id: i64,
    by_execution: HashMap<String, Vec<Event>>,
}

/// Event log keeping every execution's events in append order.
#[derive(Debug, Default)]
pub struct MemEventLog {
    rows: RwLock<EventRows>,
}

impl MemEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLog for MemEventLog {
    fn append(
        &self,
        event: &Event,
    ) -> Result<i64> {
        // id assignment and insertion happen under one lock so ids follow append order
        let mut rows = self.rows.write().unwrap();
        rows.next_id += 1;
        let id = rows.next_id;

        let mut event = event.clone();
        event.id = id;
        rows.by_execution.entry(event.execution_id.clone()).or_default().push(event);
        Ok(id)
    }

    fn list_since(
        &self,
        execution_id: &str,
        since_id: Option<i64>,
    ) -> Result<Vec<Event>> {
        let rows = self.rows.read().unwrap();
        let since = since_id.unwrap_or(0);
        Ok(rows.by_execution.get(execution_id).map(|events| events.iter().filter(|e| e.id > since).cloned().collect()).unwrap_or_default())
    }
}

#[cfg(test)]
mod test {
    use super::MemEventLog;
    use crate::store::{EventLog, data::Event};

    fn event(execution_id: &str) -> Event {
        Event {
            execution_id: execution_id.to_string(),
            event_type: "node_start".to_string(),
            data: "{}".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_ids_increase_and_since_filters() {
        let log = MemEventLog::new();
        let a1 = log.append(&event("a")).unwrap();
        let b1 = log.append(&event("b")).unwrap();
        let a2 = log.append(&event("a")).unwrap();
        assert!(a1 < b1 && b1 < a2);

        let all = log.list_since("a", None).unwrap();
        assert_eq!(all.iter().map(|e| e.id).collect::<Vec<_>>(), vec![a1, a2]);

        let newer = log.list_since("a", Some(a1)).unwrap();
        assert_eq!(newer.iter().map(|e| e.id).collect::<Vec<_>>(), vec![a2]);
        assert!(log.list_since("missing", None).unwrap().is_empty());
    }
}
