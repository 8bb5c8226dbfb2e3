use std::{cmp::Ordering, collections::HashMap, sync::RwLock};

use serde_json::Value;

use crate::{
    Result,
    store::{DbCollection, PageData, db::mem::DbDocument, query::Query},
};

/// In-memory collection keyed by document id.
#[derive(Debug)]
pub struct Collect<T> {
    name: String,
    rows: RwLock<HashMap<String, T>>,
}

impl<T> Collect<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> DbCollection for Collect<T>
where
    T: DbDocument + Clone + Send + Sync,
{
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        Ok(self.rows.read().unwrap().contains_key(id))
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Option<Self::Item>> {
        Ok(self.rows.read().unwrap().get(id).cloned())
    }

    fn query(
        &self,
        q: &Query,
    ) -> Result<PageData<Self::Item>> {
        let rows = self.rows.read().unwrap();

        let mut matched = Vec::new();
        for row in rows.values() {
            let doc = row.doc()?;
            if q.filters().iter().all(|(field, value)| doc.get(field) == Some(value)) {
                matched.push((doc, row.clone()));
            }
        }

        matched.sort_by(|(a, _), (b, _)| {
            for (field, rev) in q.order_by() {
                let ord = compare_values(a.get(field), b.get(field));
                let ord = if *rev {
                    ord.reverse()
                } else {
                    ord
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let count = matched.len();
        let rows = matched.into_iter().skip(q.offset()).take(q.limit()).map(|(_, row)| row).collect::<Vec<_>>();
        Ok(PageData {
            count,
            page_num: q.offset() / q.limit() + 1,
            page_count: count.div_ceil(q.limit()),
            page_size: q.limit(),
            rows,
        })
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        self.rows.write().unwrap().insert(data.id().to_string(), data.clone());
        Ok(true)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let mut rows = self.rows.write().unwrap();
        match rows.get_mut(data.id()) {
            Some(row) => {
                *row = data.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        Ok(self.rows.write().unwrap().remove(id).is_some())
    }
}

fn compare_values(
    a: Option<&Value>,
    b: Option<&Value>,
) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
