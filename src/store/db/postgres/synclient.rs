use std::{future::Future, time::Duration};

use sqlx::{
    Database, Error, IntoArguments, PgPool, Postgres,
    postgres::{PgPoolOptions, PgRow},
};
use tokio::{runtime::Handle, task::block_in_place};

/// Blocking facade over a sqlx pool for the synchronous collection traits.
#[derive(Debug, Clone)]
pub struct SynClient {
    pool: PgPool,

    handle: Handle,
}

impl SynClient {
    pub fn connect(
        db_url: &str,
        handle: Handle,
    ) -> Result<Self, Error> {
        let pool = Self::run(&handle, async move { PgPoolOptions::new().acquire_timeout(Duration::from_secs(5)).max_connections(200).connect(db_url).await })?;

        Ok(Self {
            pool,
            handle,
        })
    }

    fn run<F: Future>(
        handle: &Handle,
        fut: F,
    ) -> F::Output {
        // inside a worker thread the runtime has to be told we are about to block
        if Handle::try_current().is_ok() {
            block_in_place(|| handle.block_on(fut))
        } else {
            handle.block_on(fut)
        }
    }

    pub fn query_one<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> Result<PgRow, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        Self::run(&self.handle, async move {
            let mut conn = self.pool.acquire().await?;

            sqlx::query_with(sql, params).fetch_one(&mut *conn).await
        })
    }

    /// Runs `lock_sql` and then `sql` in one transaction. Locks taken by
    /// `lock_sql` are held until the commit.
    pub fn query_one_locked<'q, L, A>(
        &self,
        lock_sql: &'q str,
        lock_params: L,
        sql: &'q str,
        params: A,
    ) -> Result<PgRow, Error>
    where
        L: IntoArguments<'q, Postgres> + 'q,
        A: IntoArguments<'q, Postgres> + 'q,
    {
        Self::run(&self.handle, async move {
            let mut tx = self.pool.begin().await?;

            sqlx::query_with(lock_sql, lock_params).execute(&mut *tx).await?;
            let row = sqlx::query_with(sql, params).fetch_one(&mut *tx).await?;
            tx.commit().await?;
            Ok(row)
        })
    }

    pub fn query<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> Result<Vec<PgRow>, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        Self::run(&self.handle, async move {
            let mut conn = self.pool.acquire().await?;

            sqlx::query_with(sql, params).fetch_all(&mut *conn).await
        })
    }

    pub fn execute<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> Result<<Postgres as Database>::QueryResult, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        Self::run(&self.handle, async move {
            let mut conn = self.pool.acquire().await?;

            sqlx::query_with(sql, params).execute(&mut *conn).await
        })
    }

    pub fn batch_execute(
        &self,
        sqls: &[String],
    ) -> Result<(), Error> {
        Self::run(&self.handle, async move {
            let mut tx = self.pool.begin().await?;

            for sql in sqls {
                sqlx::query(sql).execute(&mut *tx).await?;
            }
            tx.commit().await
        })
    }
}
