use sea_query::{ColumnDef, Expr as SeaExpr, Iden, OnConflict, PostgresQueryBuilder, Query as SeaQuery, Table};
use sea_query_binder::SqlxBinder;
use sqlx::Row;

use crate::{
    Result,
    store::{UsageCounter, data::Usage, db::postgres::DbInit, map_db_err},
};

use super::DbConnection;

#[derive(Debug)]
pub struct UsageCollection {
    conn: DbConnection,
}

#[derive(Iden, Clone, Copy)]
#[iden = "usage"]
enum CollectionIden {
    Table,

    Id,
    UserId,
    Period,
    ApiCalls,
}

impl UsageCounter for UsageCollection {
    fn increment(
        &self,
        user_id: &str,
        period: &str,
        n: i64,
    ) -> Result<i64> {
        // single upsert statement, concurrent increments serialize on the row
        let (sql, values) = SeaQuery::insert()
            .into_table(CollectionIden::Table)
            .columns([CollectionIden::Id, CollectionIden::UserId, CollectionIden::Period, CollectionIden::ApiCalls])
            .values([Usage::key(user_id, period).into(), user_id.into(), period.into(), n.into()])
            .map_err(map_db_err)?
            .on_conflict(
                OnConflict::column(CollectionIden::Id)
                    .value(CollectionIden::ApiCalls, SeaExpr::col((CollectionIden::Table, CollectionIden::ApiCalls)).add(n))
                    .to_owned(),
            )
            .returning_col(CollectionIden::ApiCalls)
            .build_sqlx(PostgresQueryBuilder);

        let row = self.conn.query_one(sql.as_str(), values).map_err(map_db_err)?;
        row.try_get::<i64, usize>(0).map_err(map_db_err)
    }

    fn get(
        &self,
        user_id: &str,
        period: &str,
    ) -> Result<i64> {
        let (sql, values) = SeaQuery::select()
            .column(CollectionIden::ApiCalls)
            .from(CollectionIden::Table)
            .and_where(SeaExpr::col(CollectionIden::Id).eq(Usage::key(user_id, period)))
            .build_sqlx(PostgresQueryBuilder);

        let rows = self.conn.query(&sql, values).map_err(map_db_err)?;
        match rows.first() {
            Some(row) => row.try_get::<i64, usize>(0).map_err(map_db_err),
            None => Ok(0),
        }
    }
}

impl DbInit for UsageCollection {
    fn init(&self) -> Result<()> {
        let sql = [Table::create()
            .table(CollectionIden::Table)
            .if_not_exists()
            .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
            .col(ColumnDef::new(CollectionIden::UserId).string().not_null())
            .col(ColumnDef::new(CollectionIden::Period).string().not_null())
            .col(ColumnDef::new(CollectionIden::ApiCalls).big_integer().not_null().default(0))
            .build(PostgresQueryBuilder)];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl UsageCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
