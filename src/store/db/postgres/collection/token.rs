use sea_query::{ColumnDef, Expr as SeaExpr, Iden, PostgresQueryBuilder, Query as SeaQuery, Table};
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
pub struct TokenCollection {
    conn: DbConnection,
}

#[derive(Iden, Clone, Copy)]
#[iden = "api_tokens"]
enum CollectionIden {
    Table,

    Id,
    UserId,
    ExpiresAt,
    CreateTime,
}

const COLUMNS: [CollectionIden; 4] = [CollectionIden::Id, CollectionIden::UserId, CollectionIden::ExpiresAt, CollectionIden::CreateTime];

impl DbCollection for TokenCollection {
    type Item = data::ApiToken;

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
            .values([data.id.into(), data.user_id.into(), data.expires_at.into(), data.create_time.into()])
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
            .values([(CollectionIden::UserId, model.user_id.into()), (CollectionIden::ExpiresAt, model.expires_at.into())])
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

impl DbRow for data::ApiToken {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            expires_at: row.try_get("expires_at")?,
            create_time: row.try_get("create_time")?,
        })
    }
}

impl DbInit for TokenCollection {
    fn init(&self) -> Result<()> {
        let sql = [Table::create()
            .table(CollectionIden::Table)
            .if_not_exists()
            .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
            .col(ColumnDef::new(CollectionIden::UserId).string().not_null())
            .col(ColumnDef::new(CollectionIden::ExpiresAt).big_integer().default(0))
            .col(ColumnDef::new(CollectionIden::CreateTime).big_integer().default(0))
            .build(PostgresQueryBuilder)];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl TokenCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
