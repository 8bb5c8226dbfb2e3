mod call;
mod credential;
mod event;
mod execution;
mod registration;
mod token;
mod usage;
mod workflow;

use std::sync::Arc;

use sea_query::{
    Alias as SeaAlias, Condition, Expr as SeaExpr, Func as SeaFunc, Iden, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery, SimpleExpr,
};
use sea_query_binder::SqlxBinder;
use serde_json::Value;
use sqlx::Row;

use crate::{
    Result,
    store::{PageData, db::postgres::DbRow, map_db_err, query::Query},
};

use super::synclient::SynClient;

pub use call::CallCollection;
pub use credential::CredentialCollection;
pub use event::EventCollection;
pub use execution::ExecutionCollection;
pub use registration::RegistrationCollection;
pub use token::TokenCollection;
pub use usage::UsageCollection;
pub use workflow::WorkflowCollection;

type DbConnection = Arc<SynClient>;

/// Turns the equality filters of a query into a sql condition.
fn into_query(q: &Query) -> Condition {
    let mut cond = Condition::all();
    for (field, value) in q.filters() {
        let col = SeaExpr::col(SeaAlias::new(field.as_str()));
        let expr: SimpleExpr = match value {
            Value::Null => col.is_null(),
            Value::Bool(b) => col.eq(*b),
            Value::Number(n) if n.is_i64() => col.eq(n.as_i64().unwrap_or_default()),
            Value::Number(n) => col.eq(n.as_f64().unwrap_or_default()),
            Value::String(s) => col.eq(s.as_str()),
            other => col.eq(other.to_string()),
        };
        cond = cond.add(expr);
    }
    cond
}

fn exists_in<I>(
    conn: &DbConnection,
    table: I,
    id_col: I,
    id: &str,
) -> Result<bool>
where
    I: Iden + Copy + 'static,
{
    let (sql, values) =
        SeaQuery::select().from(table).expr(SeaFunc::count(SeaExpr::col(id_col))).and_where(SeaExpr::col(id_col).eq(id)).build_sqlx(PostgresQueryBuilder);

    let count = conn.query_one(sql.as_str(), values).map(|row| row.get::<i64, usize>(0)).map_err(map_db_err)?;
    Ok(count > 0)
}

fn find_in<T, I>(
    conn: &DbConnection,
    table: I,
    id_col: I,
    columns: &[I],
    id: &str,
) -> Result<Option<T>>
where
    T: DbRow,
    I: Iden + Copy + 'static,
{
    let (sql, values) =
        SeaQuery::select().from(table).columns(columns.iter().copied()).and_where(SeaExpr::col(id_col).eq(id)).limit(1).build_sqlx(PostgresQueryBuilder);

    match conn.query(&sql, values).map_err(map_db_err)?.first() {
        Some(row) => Ok(Some(T::from_row(row).map_err(map_db_err)?)),
        None => Ok(None),
    }
}

fn query_page<T, I>(
    conn: &DbConnection,
    table: I,
    id_col: I,
    columns: &[I],
    q: &Query,
) -> Result<PageData<T>>
where
    T: DbRow,
    I: Iden + Copy + 'static,
{
    let filter = into_query(q);

    let mut count_query = SeaQuery::select();
    count_query.from(table).expr(SeaFunc::count(SeaExpr::col(id_col)));

    let mut query = SeaQuery::select();
    query.columns(columns.iter().copied()).from(table);

    if !filter.is_empty() {
        count_query.cond_where(filter.clone());
        query.cond_where(filter);
    }

    for (order, rev) in q.order_by().iter() {
        query.order_by(
            SeaAlias::new(order.as_str()),
            if *rev {
                SeaOrder::Desc
            } else {
                SeaOrder::Asc
            },
        );
    }
    let (sql, values) = query.limit(q.limit() as u64).offset(q.offset() as u64).build_sqlx(PostgresQueryBuilder);

    let (count_sql, count_values) = count_query.build_sqlx(PostgresQueryBuilder);
    let count = conn.query_one(count_sql.as_str(), count_values).map_err(map_db_err)?.get::<i64, usize>(0) as usize;
    let rows = conn.query(&sql, values).map_err(map_db_err)?.iter().map(T::from_row).collect::<std::result::Result<Vec<_>, _>>().map_err(map_db_err)?;

    Ok(PageData {
        count,
        page_size: q.limit(),
        page_num: q.offset() / q.limit() + 1,
        page_count: count.div_ceil(q.limit()),
        rows,
    })
}

fn delete_in<I>(
    conn: &DbConnection,
    table: I,
    id_col: I,
    id: &str,
) -> Result<bool>
where
    I: Iden + Copy + 'static,
{
    let (sql, values) = SeaQuery::delete().from_table(table).and_where(SeaExpr::col(id_col).eq(id)).build_sqlx(PostgresQueryBuilder);

    let result = conn.execute(sql.as_str(), values).map_err(map_db_err)?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod test {
    use sea_query::{Iden, PostgresQueryBuilder, Query as SeaQuery};

    use super::into_query;
    use crate::store::query::Query;

    #[derive(Iden, Clone, Copy)]
    #[iden = "calls"]
    enum CallIden {
        Table,
        Id,
    }

    #[test]
    fn test_filters_become_conditions() {
        let q = Query::new().with_filter("kind", "webhook").with_filter("timestamp", 5);
        let sql = SeaQuery::select().column(CallIden::Id).from(CallIden::Table).cond_where(into_query(&q)).to_string(PostgresQueryBuilder);
        assert_eq!(sql, r#"SELECT "id" FROM "calls" WHERE "kind" = 'webhook' AND "timestamp" = 5"#);
    }
}
