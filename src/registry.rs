//! Trigger registry.
//!
//! Maps `(kind, trigger id)` onto the owning user and workflow. Dispatch asks
//! the registry first, so an unknown trigger id is rejected without touching
//! the workflow document store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};
use tracing::trace;

use crate::{
    HookflowError, Result,
    common::MemCache,
    store::{Store, data},
    utils,
};

/// Maximum number of registrations kept in the lookup cache.
const REGISTRATION_CACHE_SIZE: usize = 10_000;

/// External event source bound to a workflow's entry node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerKind {
    Webhook,
    Chat,
    Form,
}

impl TriggerKind {
    /// Parses the plural path segment of the registry management routes.
    pub fn from_plural(s: &str) -> Option<Self> {
        match s {
            "webhooks" => Some(TriggerKind::Webhook),
            "chats" => Some(TriggerKind::Chat),
            "forms" => Some(TriggerKind::Form),
            _ => None,
        }
    }

    /// Node config key carrying the trigger id of this kind.
    pub fn config_key(&self) -> &'static str {
        match self {
            TriggerKind::Webhook => "webhookId",
            TriggerKind::Chat => "chatId",
            TriggerKind::Form => "formId",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegistrationStatus {
    #[default]
    Draft,
    Active,
}

impl RegistrationStatus {
    fn parse(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRegistration {
    pub id: String,
    pub kind: TriggerKind,
    pub owner_user_id: String,
    pub workflow_id: String,
    /// Only meaningful for webhooks. `None` accepts any method.
    pub method: Option<String>,
    pub status: RegistrationStatus,
}

impl TriggerRegistration {
    pub fn is_active(&self) -> bool {
        self.status == RegistrationStatus::Active
    }

    fn cache_key(
        kind: TriggerKind,
        id: &str,
    ) -> String {
        data::Registration::key(kind.as_ref(), id)
    }
}

impl TryFrom<&data::Registration> for TriggerRegistration {
    type Error = HookflowError;

    fn try_from(row: &data::Registration) -> Result<Self> {
        let kind = row.kind.parse::<TriggerKind>().map_err(|_| HookflowError::Store(format!("unknown trigger kind '{}' in registration {}", row.kind, row.id)))?;
        Ok(Self {
            id: row.trigger_id.clone(),
            kind,
            owner_user_id: row.owner_user_id.clone(),
            workflow_id: row.workflow_id.clone(),
            method: row.method.clone(),
            status: RegistrationStatus::parse(&row.status),
        })
    }
}

pub struct TriggerRegistry {
    store: Arc<Store>,
    cache: MemCache<String, TriggerRegistration>,
}

impl TriggerRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            cache: MemCache::new(REGISTRATION_CACHE_SIZE),
        }
    }

    /// Creates or overwrites the registration for `(reg.kind, reg.id)`.
    pub fn upsert(
        &self,
        reg: &TriggerRegistration,
    ) -> Result<TriggerRegistration> {
        trace!("registry::upsert({}:{})", reg.kind.as_ref(), reg.id);
        if reg.id.is_empty() || reg.owner_user_id.is_empty() || reg.workflow_id.is_empty() {
            return Err(HookflowError::BadRequest("id, userId and workflowId are required".to_string()));
        }

        let mut reg = reg.clone();
        reg.method = match reg.kind {
            TriggerKind::Webhook => reg.method.filter(|m| !m.is_empty()).map(|m| m.to_uppercase()),
            _ => None,
        };

        let now = utils::time::time_millis();
        let key = TriggerRegistration::cache_key(reg.kind, &reg.id);
        let registrations = self.store.registrations();
        let mut row = data::Registration {
            id: key.clone(),
            kind: reg.kind.as_ref().to_string(),
            trigger_id: reg.id.clone(),
            owner_user_id: reg.owner_user_id.clone(),
            workflow_id: reg.workflow_id.clone(),
            method: reg.method.clone(),
            status: reg.status.as_ref().to_string(),
            create_time: now,
            update_time: now,
        };
        match registrations.find(&key)? {
            Some(existing) => {
                row.create_time = existing.create_time;
                registrations.update(&row)?;
            }
            None => {
                registrations.create(&row)?;
            }
        }

        self.cache.set(key, reg.clone());
        Ok(reg)
    }

    pub fn get_by_id(
        &self,
        kind: TriggerKind,
        id: &str,
    ) -> Result<Option<TriggerRegistration>> {
        let key = TriggerRegistration::cache_key(kind, id);
        if let Some(reg) = self.cache.get(&key) {
            return Ok(Some(reg));
        }

        trace!("registry::get_by_id({}) cache miss", key);
        match self.store.registrations().find(&key)? {
            Some(row) => {
                let reg = TriggerRegistration::try_from(&row)?;
                self.cache.set(key, reg.clone());
                Ok(Some(reg))
            }
            None => Ok(None),
        }
    }

    /// Removes the registration, `false` when it did not exist.
    pub fn delete(
        &self,
        kind: TriggerKind,
        id: &str,
    ) -> Result<bool> {
        let key = TriggerRegistration::cache_key(kind, id);
        self.cache.remove(&key);
        self.store.registrations().delete(&key)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{RegistrationStatus, TriggerKind, TriggerRegistration, TriggerRegistry};
    use crate::store::{DbStore, MemStore, Store};

    fn registry() -> TriggerRegistry {
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        TriggerRegistry::new(Arc::new(store))
    }

    fn webhook(
        id: &str,
        status: RegistrationStatus,
    ) -> TriggerRegistration {
        TriggerRegistration {
            id: id.to_string(),
            kind: TriggerKind::Webhook,
            owner_user_id: "u1".to_string(),
            workflow_id: "w1".to_string(),
            method: Some("post".to_string()),
            status,
        }
    }

    #[test]
    fn test_upsert_then_get_returns_last_write() {
        let registry = registry();
        registry.upsert(&webhook("wh1", RegistrationStatus::Draft)).unwrap();
        registry.upsert(&webhook("wh1", RegistrationStatus::Active)).unwrap();

        let reg = registry.get_by_id(TriggerKind::Webhook, "wh1").unwrap().unwrap();
        assert_eq!(reg.status, RegistrationStatus::Active);
        assert_eq!(reg.method.as_deref(), Some("POST"));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let registry = registry();
        let first = registry.upsert(&webhook("wh1", RegistrationStatus::Active)).unwrap();
        let second = registry.upsert(&webhook("wh1", RegistrationStatus::Active)).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.get_by_id(TriggerKind::Webhook, "wh1").unwrap(), Some(first));
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let registry = registry();
        registry.upsert(&webhook("x", RegistrationStatus::Active)).unwrap();
        assert!(registry.get_by_id(TriggerKind::Chat, "x").unwrap().is_none());
    }

    #[test]
    fn test_delete_then_get_is_not_found() {
        let registry = registry();
        registry.upsert(&webhook("wh1", RegistrationStatus::Active)).unwrap();
        assert!(registry.delete(TriggerKind::Webhook, "wh1").unwrap());
        assert!(registry.get_by_id(TriggerKind::Webhook, "wh1").unwrap().is_none());
        assert!(!registry.delete(TriggerKind::Webhook, "wh1").unwrap());
    }

    #[test]
    fn test_method_dropped_for_chat() {
        let registry = registry();
        let mut reg = webhook("c1", RegistrationStatus::Active);
        reg.kind = TriggerKind::Chat;
        let stored = registry.upsert(&reg).unwrap();
        assert_eq!(stored.method, None);
    }

    #[test]
    fn test_missing_fields_rejected() {
        let registry = registry();
        let mut reg = webhook("wh1", RegistrationStatus::Active);
        reg.workflow_id.clear();
        assert!(registry.upsert(&reg).is_err());
    }

    #[test]
    fn test_plural_and_singular_kinds() {
        assert_eq!(TriggerKind::from_plural("forms"), Some(TriggerKind::Form));
        assert_eq!(TriggerKind::from_plural("form"), None);
        assert_eq!("chat".parse::<TriggerKind>().unwrap(), TriggerKind::Chat);
        assert_eq!(TriggerKind::Webhook.config_key(), "webhookId");
    }
}
