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
pub struct CredentialCollection {
    conn: DbConnection,
}

#[derive(Iden, Clone, Copy)]
#[iden = "credentials"]
enum CollectionIden {
    Table,

    Id,
    CredentialId,
    OwnerUserId,
    Name,
    Kind,
    Data,
    UpdateTime,
}

const COLUMNS: [CollectionIden; 7] = [
    CollectionIden::Id,
    CollectionIden::CredentialId,
    CollectionIden::OwnerUserId,
    CollectionIden::Name,
    CollectionIden::Kind,
    CollectionIden::Data,
    CollectionIden::UpdateTime,
];

impl DbCollection for CredentialCollection {
    type Item = data::Credential;

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
            .values([
                data.id.into(),
                data.credential_id.into(),
                data.owner_user_id.into(),
                data.name.into(),
                data.kind.into(),
                data.data.into(),
                data.update_time.into(),
            ])
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
            .values([
                (CollectionIden::Name, model.name.into()),
                (CollectionIden::Kind, model.kind.into()),
                (CollectionIden::Data, model.data.into()),
                (CollectionIden::UpdateTime, model.update_time.into()),
            ])
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

impl DbRow for data::Credential {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.try_get("id")?,
            credential_id: row.try_get("credential_id")?,
            owner_user_id: row.try_get("owner_user_id")?,
            name: row.try_get("name")?,
            kind: row.try_get("kind")?,
            data: row.try_get("data")?,
            update_time: row.try_get("update_time")?,
        })
    }
}

impl DbInit for CredentialCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::CredentialId).string().not_null())
                .col(ColumnDef::new(CollectionIden::OwnerUserId).string().not_null())
                .col(ColumnDef::new(CollectionIden::Name).string().default(""))
                .col(ColumnDef::new(CollectionIden::Kind).string().default(""))
                .col(ColumnDef::new(CollectionIden::Data).text().not_null())
                .col(ColumnDef::new(CollectionIden::UpdateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_credentials_owner")
                .if_not_exists()
                .table(CollectionIden::Table)
                .col(CollectionIden::OwnerUserId)
                .build(PostgresQueryBuilder),
        ];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl CredentialCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
