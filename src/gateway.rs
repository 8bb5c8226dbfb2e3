//! Credential and service gateway.
//!
//! Resolves caller identities and hands node logic scoped access to the
//! caller's own credentials and usage counters.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::{
    HookflowError, Result,
    store::{Store, data},
    utils,
};

/// Authenticated user on whose behalf a run executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub data: Value,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Resolves a bearer token, `None` for unknown or expired tokens.
    async fn authenticate(
        &self,
        bearer_token: &str,
    ) -> Result<Option<Identity>>;

    /// Looks up one of `identity`'s own credentials.
    ///
    /// Credentials of other users are reported as absent.
    async fn get_credential(
        &self,
        identity: &Identity,
        credential_id: &str,
    ) -> Result<Option<CredentialRecord>>;

    /// Atomically adds `n` to the identity's api calls of the current month
    /// and returns the new total.
    async fn increment_api_calls(
        &self,
        identity: &Identity,
        n: i64,
    ) -> Result<i64>;
}

/// Gateway backed by the local store.
pub struct StoreGateway {
    store: Arc<Store>,
}

impl StoreGateway {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
        }
    }

    /// Stores or replaces a credential of `owner_user_id`.
    pub fn put_credential(
        &self,
        owner_user_id: &str,
        credential: &CredentialRecord,
    ) -> Result<()> {
        let row = data::Credential {
            id: data::Credential::key(owner_user_id, &credential.id),
            credential_id: credential.id.clone(),
            owner_user_id: owner_user_id.to_string(),
            name: credential.name.clone(),
            kind: credential.kind.clone(),
            data: serde_json::to_string(&credential.data)?,
            update_time: utils::time::time_millis(),
        };
        let credentials = self.store.credentials();
        if !credentials.update(&row)? {
            credentials.create(&row)?;
        }
        Ok(())
    }

    /// Issues a bearer token for `user_id`. `expires_at` of 0 never expires.
    pub fn issue_token(
        &self,
        user_id: &str,
        expires_at: i64,
    ) -> Result<String> {
        let token = data::ApiToken {
            id: utils::longid(),
            user_id: user_id.to_string(),
            expires_at,
            create_time: utils::time::time_millis(),
        };
        self.store.tokens().create(&token)?;
        Ok(token.id)
    }

    pub fn api_calls(
        &self,
        identity: &Identity,
    ) -> Result<i64> {
        self.store.usage().get(&identity.user_id, &utils::time::month_period(utils::time::time_millis()))
    }
}

#[async_trait]
impl Gateway for StoreGateway {
    async fn authenticate(
        &self,
        bearer_token: &str,
    ) -> Result<Option<Identity>> {
        if bearer_token.is_empty() {
            return Ok(None);
        }
        let Some(token) = self.store.tokens().find(bearer_token)? else {
            return Ok(None);
        };
        if token.expires_at != 0 && token.expires_at <= utils::time::time_millis() {
            trace!("gateway::authenticate expired token of {}", token.user_id);
            return Ok(None);
        }
        Ok(Some(Identity::new(&token.user_id)))
    }

    async fn get_credential(
        &self,
        identity: &Identity,
        credential_id: &str,
    ) -> Result<Option<CredentialRecord>> {
        let key = data::Credential::key(&identity.user_id, credential_id);
        match self.store.credentials().find(&key)? {
            Some(row) if row.owner_user_id == identity.user_id => Ok(Some(CredentialRecord {
                id: row.credential_id,
                name: row.name,
                kind: row.kind,
                data: serde_json::from_str(&row.data)?,
            })),
            _ => Ok(None),
        }
    }

    async fn increment_api_calls(
        &self,
        identity: &Identity,
        n: i64,
    ) -> Result<i64> {
        let period = utils::time::month_period(utils::time::time_millis());
        self.store.usage().increment(&identity.user_id, &period, n)
    }
}

/// Capability bundle handed to node logic.
#[derive(Clone)]
pub struct Capabilities {
    identity: Option<Identity>,
    gateway: Arc<dyn Gateway>,
    http: reqwest::Client,
}

impl Capabilities {
    pub fn new(
        identity: Option<Identity>,
        gateway: Arc<dyn Gateway>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            identity,
            gateway,
            http,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Fetches a credential of the current identity.
    ///
    /// Fails with [`HookflowError::Unauthorized`] when the run has no identity.
    pub async fn credential(
        &self,
        credential_id: &str,
    ) -> Result<Option<CredentialRecord>> {
        let identity = self.identity.as_ref().ok_or_else(|| HookflowError::Unauthorized(format!("credential '{}' needs an authenticated user", credential_id)))?;
        self.gateway.get_credential(identity, credential_id).await
    }

    /// Counts one api call for the current identity, a no-op without one.
    pub async fn record_api_call(&self) -> Result<Option<i64>> {
        match &self.identity {
            Some(identity) => self.gateway.increment_api_calls(identity, 1).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::json;

    use super::{Capabilities, CredentialRecord, Gateway, Identity, StoreGateway};
    use crate::{
        HookflowError,
        store::{DbStore, MemStore, Store},
        utils,
    };

    fn gateway() -> Arc<StoreGateway> {
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        Arc::new(StoreGateway::new(Arc::new(store)))
    }

    fn credential(id: &str) -> CredentialRecord {
        CredentialRecord {
            id: id.to_string(),
            name: "Stripe".to_string(),
            kind: "api_key".to_string(),
            data: json!({"apiKey": "sk_test"}),
        }
    }

    #[tokio::test]
    async fn test_authenticate_tokens() {
        let gateway = gateway();
        let token = gateway.issue_token("u1", 0).unwrap();
        assert_eq!(gateway.authenticate(&token).await.unwrap(), Some(Identity::new("u1")));
        assert_eq!(gateway.authenticate("nope").await.unwrap(), None);
        assert_eq!(gateway.authenticate("").await.unwrap(), None);

        let expired = gateway.issue_token("u1", utils::time::time_millis() - 1000).unwrap();
        assert_eq!(gateway.authenticate(&expired).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_credentials_are_scoped_to_owner() {
        let gateway = gateway();
        gateway.put_credential("u1", &credential("stripe")).unwrap();

        let own = gateway.get_credential(&Identity::new("u1"), "stripe").await.unwrap();
        assert_eq!(own.unwrap().data, json!({"apiKey": "sk_test"}));

        let other = gateway.get_credential(&Identity::new("u2"), "stripe").await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_capabilities_without_identity() {
        let gateway = gateway();
        let caps = Capabilities::new(None, gateway.clone(), reqwest::Client::new());
        let err = caps.credential("stripe").await.unwrap_err();
        assert!(matches!(err, HookflowError::Unauthorized(_)));
        assert!(err.to_string().contains("not authorized"));
        assert_eq!(caps.record_api_call().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_api_call_increments_counter() {
        let gateway = gateway();
        let caps = Capabilities::new(Some(Identity::new("u1")), gateway.clone(), reqwest::Client::new());
        caps.record_api_call().await.unwrap();
        caps.record_api_call().await.unwrap();
        assert_eq!(gateway.api_calls(&Identity::new("u1")).unwrap(), 2);
    }
}
