use sea_query::{ColumnDef, Expr as SeaExpr, Func as SeaFunc, Iden, Index, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery, SelectStatement, Table};
use sea_query_binder::SqlxBinder;
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{
        EventLog, data,
        db::postgres::{DbInit, DbRow},
        map_db_err,
    },
};

use super::DbConnection;

/// Execution events.
///
/// Ids come from one global bigserial. Appends of the same execution are
/// serialized with a transaction scoped advisory lock, so a poller that has
/// seen id `n` of an execution never gets a later commit with an id below `n`.
#[derive(Debug)]
pub struct EventCollection {
    conn: DbConnection,
}

#[derive(Iden, Clone, Copy)]
#[iden = "execution_events"]
enum CollectionIden {
    Table,

    Id,
    ExecutionId,
    EventType,
    NodeId,
    EdgeId,
    Data,
    Timestamp,
}

#[derive(Iden)]
#[iden = "pg_advisory_xact_lock"]
struct AdvisoryXactLock;

#[derive(Iden)]
#[iden = "hashtext"]
struct HashText;

/// `SELECT pg_advisory_xact_lock(hashtext(execution_id))`
fn execution_lock(execution_id: &str) -> SelectStatement {
    SeaQuery::select().expr(SeaFunc::cust(AdvisoryXactLock).arg(SeaFunc::cust(HashText).arg(execution_id))).to_owned()
}

impl EventLog for EventCollection {
    fn append(
        &self,
        event: &data::Event,
    ) -> Result<i64> {
        let event = event.clone();
        let (lock_sql, lock_values) = execution_lock(&event.execution_id).build_sqlx(PostgresQueryBuilder);
        let (sql, values) = SeaQuery::insert()
            .into_table(CollectionIden::Table)
            .columns([
                CollectionIden::ExecutionId,
                CollectionIden::EventType,
                CollectionIden::NodeId,
                CollectionIden::EdgeId,
                CollectionIden::Data,
                CollectionIden::Timestamp,
            ])
            .values([
                event.execution_id.into(),
                event.event_type.into(),
                event.node_id.into(),
                event.edge_id.into(),
                event.data.into(),
                event.timestamp.into(),
            ])
            .map_err(map_db_err)?
            .returning_col(CollectionIden::Id)
            .build_sqlx(PostgresQueryBuilder);

        let row = self.conn.query_one_locked(lock_sql.as_str(), lock_values, sql.as_str(), values).map_err(map_db_err)?;
        row.try_get::<i64, usize>(0).map_err(map_db_err)
    }

    fn list_since(
        &self,
        execution_id: &str,
        since_id: Option<i64>,
    ) -> Result<Vec<data::Event>> {
        let (sql, values) = SeaQuery::select()
            .columns([
                CollectionIden::Id,
                CollectionIden::ExecutionId,
                CollectionIden::EventType,
                CollectionIden::NodeId,
                CollectionIden::EdgeId,
                CollectionIden::Data,
                CollectionIden::Timestamp,
            ])
            .from(CollectionIden::Table)
            .and_where(SeaExpr::col(CollectionIden::ExecutionId).eq(execution_id))
            .and_where(SeaExpr::col(CollectionIden::Id).gt(since_id.unwrap_or(0)))
            .order_by(CollectionIden::Id, SeaOrder::Asc)
            .build_sqlx(PostgresQueryBuilder);

        self.conn.query(&sql, values).map_err(map_db_err)?.iter().map(|row| data::Event::from_row(row).map_err(map_db_err)).collect()
    }
}

impl DbRow for data::Event {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.try_get("id")?,
            execution_id: row.try_get("execution_id")?,
            event_type: row.try_get("event_type")?,
            node_id: row.try_get("node_id")?,
            edge_id: row.try_get("edge_id")?,
            data: row.try_get("data")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

impl DbInit for EventCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).big_integer().not_null().auto_increment().primary_key())
                .col(ColumnDef::new(CollectionIden::ExecutionId).string().not_null())
                .col(ColumnDef::new(CollectionIden::EventType).string().not_null())
                .col(ColumnDef::new(CollectionIden::NodeId).string())
                .col(ColumnDef::new(CollectionIden::EdgeId).string())
                .col(ColumnDef::new(CollectionIden::Data).text().default("{}"))
                .col(ColumnDef::new(CollectionIden::Timestamp).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_execution_events_execution")
                .if_not_exists()
                .table(CollectionIden::Table)
                .col(CollectionIden::ExecutionId)
                .col(CollectionIden::Id)
                .build(PostgresQueryBuilder),
        ];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl EventCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
