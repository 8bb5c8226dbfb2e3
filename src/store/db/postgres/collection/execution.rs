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
pub struct ExecutionCollection {
    conn: DbConnection,
}

#[derive(Iden, Clone, Copy)]
#[iden = "executions"]
enum CollectionIden {
    Table,

    Id,
    WorkflowId,
    OwnerUserId,
    TriggerId,
    Mode,
    TriggerKind,
    TriggerPayload,
    Status,
    StartedAt,
    FinishedAt,
    Succeeded,
    Failed,
}

const COLUMNS: [CollectionIden; 12] = [
    CollectionIden::Id,
    CollectionIden::WorkflowId,
    CollectionIden::OwnerUserId,
    CollectionIden::TriggerId,
    CollectionIden::Mode,
    CollectionIden::TriggerKind,
    CollectionIden::TriggerPayload,
    CollectionIden::Status,
    CollectionIden::StartedAt,
    CollectionIden::FinishedAt,
    CollectionIden::Succeeded,
    CollectionIden::Failed,
];

impl DbCollection for ExecutionCollection {
    type Item = data::Execution;

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
                data.workflow_id.into(),
                data.owner_user_id.into(),
                data.trigger_id.into(),
                data.mode.into(),
                data.trigger_kind.into(),
                data.trigger_payload.into(),
                data.status.into(),
                data.started_at.into(),
                data.finished_at.into(),
                data.succeeded.into(),
                data.failed.into(),
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
                (CollectionIden::Status, model.status.into()),
                (CollectionIden::FinishedAt, model.finished_at.into()),
                (CollectionIden::Succeeded, model.succeeded.into()),
                (CollectionIden::Failed, model.failed.into()),
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

impl DbRow for data::Execution {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            owner_user_id: row.try_get("owner_user_id")?,
            trigger_id: row.try_get("trigger_id")?,
            mode: row.try_get("mode")?,
            trigger_kind: row.try_get("trigger_kind")?,
            trigger_payload: row.try_get("trigger_payload")?,
            status: row.try_get("status")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            succeeded: row.try_get("succeeded")?,
            failed: row.try_get("failed")?,
        })
    }
}

impl DbInit for ExecutionCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::WorkflowId).string().not_null())
                .col(ColumnDef::new(CollectionIden::OwnerUserId).string().not_null())
                .col(ColumnDef::new(CollectionIden::TriggerId).string())
                .col(ColumnDef::new(CollectionIden::Mode).string().not_null())
                .col(ColumnDef::new(CollectionIden::TriggerKind).string().not_null())
                .col(ColumnDef::new(CollectionIden::TriggerPayload).text().default("{}"))
                .col(ColumnDef::new(CollectionIden::Status).string().not_null())
                .col(ColumnDef::new(CollectionIden::StartedAt).big_integer().default(0))
                .col(ColumnDef::new(CollectionIden::FinishedAt).big_integer().default(0))
                .col(ColumnDef::new(CollectionIden::Succeeded).big_integer().default(0))
                .col(ColumnDef::new(CollectionIden::Failed).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_executions_workflow")
                .if_not_exists()
                .table(CollectionIden::Table)
                .col(CollectionIden::WorkflowId)
                .build(PostgresQueryBuilder),
        ];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl ExecutionCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
