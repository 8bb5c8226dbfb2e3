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
pub struct RegistrationCollection {
    conn: DbConnection,
}

#[derive(Iden, Clone, Copy)]
#[iden = "registrations"]
enum CollectionIden {
    Table,

    Id,
    Kind,
    TriggerId,
    OwnerUserId,
    WorkflowId,
    Method,
    Status,
    CreateTime,
    UpdateTime,
}

const COLUMNS: [CollectionIden; 9] = [
    CollectionIden::Id,
    CollectionIden::Kind,
    CollectionIden::TriggerId,
    CollectionIden::OwnerUserId,
    CollectionIden::WorkflowId,
    CollectionIden::Method,
    CollectionIden::Status,
    CollectionIden::CreateTime,
    CollectionIden::UpdateTime,
];

impl DbCollection for RegistrationCollection {
    type Item = data::Registration;

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
                data.kind.into(),
                data.trigger_id.into(),
                data.owner_user_id.into(),
                data.workflow_id.into(),
                data.method.into(),
                data.status.into(),
                data.create_time.into(),
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
                (CollectionIden::OwnerUserId, model.owner_user_id.into()),
                (CollectionIden::WorkflowId, model.workflow_id.into()),
                (CollectionIden::Method, model.method.into()),
                (CollectionIden::Status, model.status.into()),
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

impl DbRow for data::Registration {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            trigger_id: row.try_get("trigger_id")?,
            owner_user_id: row.try_get("owner_user_id")?,
            workflow_id: row.try_get("workflow_id")?,
            method: row.try_get("method")?,
            status: row.try_get("status")?,
            create_time: row.try_get("create_time")?,
            update_time: row.try_get("update_time")?,
        })
    }
}

impl DbInit for RegistrationCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::Kind).string().not_null())
                .col(ColumnDef::new(CollectionIden::TriggerId).string().not_null())
                .col(ColumnDef::new(CollectionIden::OwnerUserId).string().not_null())
                .col(ColumnDef::new(CollectionIden::WorkflowId).string().not_null())
                .col(ColumnDef::new(CollectionIden::Method).string())
                .col(ColumnDef::new(CollectionIden::Status).string().not_null().default("draft"))
                .col(ColumnDef::new(CollectionIden::CreateTime).big_integer().default(0))
                .col(ColumnDef::new(CollectionIden::UpdateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_registrations_workflow")
                .if_not_exists()
                .table(CollectionIden::Table)
                .col(CollectionIden::WorkflowId)
                .build(PostgresQueryBuilder),
        ];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl RegistrationCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
