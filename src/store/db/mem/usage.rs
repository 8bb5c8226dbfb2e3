use std::{collections::HashMap, sync::Mutex};

use crate::{
    Result,
    store::{UsageCounter, data::Usage},
};

#[derive(Debug, Default)]
pub struct MemUsage {
    counters: Mutex<HashMap<String, i64>>,
}

impl MemUsage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageCounter for MemUsage {
    fn increment(
        &self,
        user_id: &str,
        period: &str,
        n: i64,
    ) -> Result<i64> {
        let mut counters = self.counters.lock().unwrap();
        let counter = counters.entry(Usage::key(user_id, period)).or_insert(0);
        *counter += n;
        Ok(*counter)
    }

    fn get(
        &self,
        user_id: &str,
        period: &str,
    ) -> Result<i64> {
        Ok(self.counters.lock().unwrap().get(&Usage::key(user_id, period)).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread};

    use super::MemUsage;
    use crate::store::UsageCounter;

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let usage = Arc::new(MemUsage::new());
        let handles = (0..8)
            .map(|_| {
                let usage = usage.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        usage.increment("u1", "2024-02", 1).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(usage.get("u1", "2024-02").unwrap(), 800);
        assert_eq!(usage.get("u2", "2024-02").unwrap(), 0);
    }
}
