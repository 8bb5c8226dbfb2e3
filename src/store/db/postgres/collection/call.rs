use sea_query::{ColumnDef, Expr as SeaExpr, Iden, Index, PostgresQueryBuilder, Query as SeaQuery, Table};
use sea_query_binder::SqlxBinder;
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{
        DbCollection, PageData, data,
        db::postgres::{DbInit, DbRow},
        map_db_err, query,
    },
};

use super::{DbConnection, delete_in, exists_in, find_in, query_page};

#[derive(Debug)]
pub struct CallCollection {
    conn: DbConnection,
}

#[derive(Iden, Clone, Copy)]
#[iden = "calls"]
enum CollectionIden {
    Table,

    Id,
    Kind,
    TriggerId,
    Mode,
    Payload,
    Timestamp,
}

const COLUMNS: [CollectionIden; 6] =
    [CollectionIden::Id, CollectionIden::Kind, CollectionIden::TriggerId, CollectionIden::Mode, CollectionIden::Payload, CollectionIden::Timestamp];

impl DbCollection for CallCollection {
    type Item = data::Call;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        exists_in(&self.conn, CollectionIden::Table, CollectionIden::Id, id)
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Option<Self::Item>> {
        find_in(&self.conn, CollectionIden::Table, CollectionIden::Id, &COLUMNS, id)
    }

    fn query(
        &self,
        q: &query::Query,
    ) -> Result<PageData<Self::Item>> {
        query_page(&self.conn, CollectionIden::Table, CollectionIden::Id, &COLUMNS, q)
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let data = data.clone();
        let (sql, sql_values) = SeaQuery::insert()
            .into_table(CollectionIden::Table)
            .columns(COLUMNS)
            .values([data.id.into(), data.kind.into(), data.trigger_id.into(), data.mode.into(), data.payload.into(), data.timestamp.into()])
            .map_err(map_db_err)?
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let model = data.clone();
        let (sql, sql_values) = SeaQuery::update()
            .table(CollectionIden::Table)
            .values([(CollectionIden::Payload, model.payload.into()), (CollectionIden::Timestamp, model.timestamp.into())])
            .and_where(SeaExpr::col(CollectionIden::Id).eq(data.id.as_str()))
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        delete_in(&self.conn, CollectionIden::Table, CollectionIden::Id, id)
    }
}

impl DbRow for data::Call {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            trigger_id: row.try_get("trigger_id")?,
            mode: row.try_get("mode")?,
            payload: row.try_get("payload")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

impl DbInit for CallCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::Kind).string().not_null())
                .col(ColumnDef::new(CollectionIden::TriggerId).string().not_null())
                .col(ColumnDef::new(CollectionIden::Mode).string().not_null())
                .col(ColumnDef::new(CollectionIden::Payload).text().default("{}"))
                .col(ColumnDef::new(CollectionIden::Timestamp).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_calls_trigger")
                .if_not_exists()
                .table(CollectionIden::Table)
                .col(CollectionIden::Kind)
                .col(CollectionIden::TriggerId)
                .build(PostgresQueryBuilder),
        ];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl CallCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
