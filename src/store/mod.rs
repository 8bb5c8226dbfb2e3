//! Storage layer for trigger registrations, workflow documents, execution
//! records and events, call history and the credential vault.
//!
//! Provides an abstraction over different storage backends:
//! - `MemStore`: in-memory storage for tests and single-process setups
//! - `PostgresStore`: PostgreSQL for production persistence

pub mod data;
mod db;
pub mod query;
mod store;

use std::error::Error;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};

use crate::{HookflowError, Result};

use query::*;

pub use db::{MemStore, PostgresStore};
pub use store::Store;

/// Maps database errors to HookflowError.
fn map_db_err(err: impl Error) -> HookflowError {
    HookflowError::Store(err.to_string())
}

/// Identifiers for different storage collections.
#[derive(Debug, Clone, AsRefStr, PartialEq, Hash, Eq, EnumIter)]
pub enum StoreIden {
    #[strum(serialize = "registrations")]
    Registrations,
    #[strum(serialize = "workflows")]
    Workflows,
    #[strum(serialize = "executions")]
    Executions,
    #[strum(serialize = "execution_events")]
    Events,
    #[strum(serialize = "calls")]
    Calls,
    #[strum(serialize = "credentials")]
    Credentials,
    #[strum(serialize = "api_tokens")]
    Tokens,
    #[strum(serialize = "usage")]
    Usage,
}

/// Paginated query result.
#[derive(Debug, Deserialize, Serialize)]
pub struct PageData<T> {
    /// Total number of matching records.
    pub count: usize,
    /// Current page number (1-based).
    pub page_num: usize,
    /// Total number of pages.
    pub page_count: usize,
    /// Number of records per page.
    pub page_size: usize,
    /// Records in the current page.
    pub rows: Vec<T>,
}

/// Trait for types that can identify their storage collection.
pub trait DbCollectionIden {
    fn iden() -> StoreIden;
}

/// Keyed document collection.
pub trait DbCollection: Send + Sync {
    type Item;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// Finds a record by ID, `None` when absent.
    fn find(
        &self,
        id: &str,
    ) -> Result<Option<Self::Item>>;

    /// Queries records with pagination and equality filters.
    fn query(
        &self,
        query: &Query,
    ) -> Result<PageData<Self::Item>>;

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Updates an existing record, `false` when nothing matched.
    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;
}

/// Append-only execution event log.
///
/// Ids are assigned by the log and strictly increase in append order, so
/// they also strictly increase per execution.
pub trait EventLog: Send + Sync {
    /// Appends the event, ignoring its `id`, and returns the assigned id.
    fn append(
        &self,
        event: &data::Event,
    ) -> Result<i64>;

    /// Events of one execution with an id greater than `since_id`, ascending.
    fn list_since(
        &self,
        execution_id: &str,
        since_id: Option<i64>,
    ) -> Result<Vec<data::Event>>;
}

/// Monthly api call counters.
///
/// `increment` must be atomic across concurrent runs of the same user.
pub trait UsageCounter: Send + Sync {
    /// Adds `n` to the counter and returns the new total.
    fn increment(
        &self,
        user_id: &str,
        period: &str,
        n: i64,
    ) -> Result<i64>;

    fn get(
        &self,
        user_id: &str,
        period: &str,
    ) -> Result<i64>;
}

/// Trait for database store initialization.
pub trait DbStore {
    /// Initializes the database and registers collections with the store.
    fn init(
        &self,
        s: &Store,
    ) -> Result<()>;
}
