use sqlx::{Error as DbError, postgres::PgRow};

use crate::Result;

mod collection;
mod database;
mod synclient;

pub use database::PostgresStore;

pub trait DbRow {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized;
}

/// Creates the table and indexes backing a collection.
pub trait DbInit {
    fn init(&self) -> Result<()>;
}
