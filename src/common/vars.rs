//! Opaque key/value bag used for node configuration.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// JSON object with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vars {
    inner: Map<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value under `key` converted to `T`, or `None` when the key
    /// is absent or holds a value of another shape.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Option<T> {
        self.inner.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Returns a non-empty string value under `key`.
    pub fn get_str(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.inner.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn set<V: Into<Value>>(
        &mut self,
        key: &str,
        value: V,
    ) -> &mut Self {
        self.inner.insert(key.to_string(), value.into());
        self
    }
}

impl Deref for Vars {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Vars {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl From<Value> for Vars {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(inner) => Self {
                inner,
            },
            _ => Self::default(),
        }
    }
}

impl From<Vars> for Value {
    fn from(vars: Vars) -> Self {
        Value::Object(vars.inner)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::Vars;

    #[test]
    fn test_typed_access() {
        let vars = Vars::from(json!({"webhookId": "wh1", "hours": 12, "empty": ""}));
        assert_eq!(vars.get::<String>("webhookId"), Some("wh1".to_string()));
        assert_eq!(vars.get::<i64>("hours"), Some(12));
        assert_eq!(vars.get::<i64>("webhookId"), None);
        assert_eq!(vars.get_str("empty"), None);
        assert_eq!(vars.get_str("missing"), None);
    }

    #[test]
    fn test_non_object_is_empty() {
        assert!(Vars::from(json!([1, 2])).is_empty());
    }
}
