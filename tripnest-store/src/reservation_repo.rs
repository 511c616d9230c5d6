use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, error};
use tripnest_core::repository::{Filter, Query, RecordStore, Row, StoreError, RESERVATIONS};

/// Reservation columns and the Postgres type each bound value is cast to.
const RESERVATION_COLUMNS: &[(&str, &str)] = &[
    ("id", "uuid"),
    ("user_id", "text"),
    ("destination_id", "text"),
    ("start_date", "timestamptz"),
    ("end_date", "timestamptz"),
    ("number_of_people", "integer"),
    ("total_price", "numeric"),
    ("status", "text"),
    ("payment_reference", "text"),
    ("created_at", "timestamptz"),
];

const EXCLUSION_VIOLATION: &str = "23P01";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

/// Statement text plus its positional binds. Every bind is sent as text and
/// cast server-side, so one bind type covers all columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Option<String>>,
}

impl Statement {
    fn new() -> Self {
        Self {
            sql: String::new(),
            binds: Vec::new(),
        }
    }

    fn bind(&mut self, value: &Value, pg_type: &str) -> String {
        self.binds.push(text_value(value));
        format!("${}::{}", self.binds.len(), pg_type)
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn check_table(table: &str) -> Result<(), StoreError> {
    if table != RESERVATIONS {
        return Err(StoreError::Unsupported(format!("table {}", table)));
    }
    Ok(())
}

fn column_type(table: &str, column: &str) -> Result<&'static str, StoreError> {
    check_table(table)?;
    RESERVATION_COLUMNS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, pg_type)| *pg_type)
        .ok_or_else(|| StoreError::Unsupported(format!("column {}.{}", table, column)))
}

fn where_clause(statement: &mut Statement, table: &str, filters: &[Filter]) -> Result<String, StoreError> {
    let mut clauses = Vec::with_capacity(filters.len());
    for filter in filters {
        let pg_type = column_type(table, &filter.column)?;
        let clause = match (&filter.value, pg_type) {
            (Value::Null, _) => format!("r.{} IS NULL", filter.column),
            // Compare ids as text so a malformed id is simply not found
            (value, "uuid") => format!("r.{}::text = {}", filter.column, statement.bind(value, "text")),
            (value, pg_type) => format!("r.{} = {}", filter.column, statement.bind(value, pg_type)),
        };
        clauses.push(clause);
    }

    if clauses.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", clauses.join(" AND ")))
    }
}

fn sorted(row: &Row) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = row.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

pub fn select_sql(query: &Query) -> Result<Statement, StoreError> {
    check_table(&query.table)?;
    let mut statement = Statement::new();
    let where_sql = where_clause(&mut statement, &query.table, &query.filters)?;

    let mut sql = format!("SELECT to_jsonb(r.*) FROM {} AS r{}", query.table, where_sql);
    if let Some(order) = &query.order {
        column_type(&query.table, &order.column)?;
        let direction = if order.descending { "DESC" } else { "ASC" };
        sql.push_str(&format!(" ORDER BY r.{} {}", order.column, direction));
    }

    statement.sql = sql;
    Ok(statement)
}

pub fn insert_sql(table: &str, row: &Row) -> Result<Statement, StoreError> {
    check_table(table)?;
    if row.is_empty() {
        return Err(StoreError::Malformed("insert without columns".into()));
    }

    let mut statement = Statement::new();
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (column, value) in sorted(row) {
        let pg_type = column_type(table, column)?;
        columns.push(column.as_str());
        values.push(statement.bind(value, pg_type));
    }

    statement.sql = format!(
        "INSERT INTO {} AS r ({}) VALUES ({}) RETURNING to_jsonb(r.*)",
        table,
        columns.join(", "),
        values.join(", ")
    );
    Ok(statement)
}

pub fn update_sql(table: &str, filters: &[Filter], patch: &Row) -> Result<Statement, StoreError> {
    check_table(table)?;
    if patch.is_empty() {
        return Err(StoreError::Malformed("update without columns".into()));
    }

    let mut statement = Statement::new();
    let mut assignments = Vec::with_capacity(patch.len());
    for (column, value) in sorted(patch) {
        let pg_type = column_type(table, column)?;
        assignments.push(format!("{} = {}", column, statement.bind(value, pg_type)));
    }
    let where_sql = where_clause(&mut statement, table, filters)?;

    statement.sql = format!(
        "UPDATE {} AS r SET {}{} RETURNING to_jsonb(r.*)",
        table,
        assignments.join(", "),
        where_sql
    );
    Ok(statement)
}

/// `RecordStore` over the `reservations` table in Postgres.
pub struct PgRecordStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgRecordStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn fetch(&self, statement: Statement) -> Result<Vec<Row>, StoreError> {
        debug!("Executing {}", statement.sql);
        let mut query = sqlx::query_scalar::<_, Value>(&statement.sql);
        for bind in statement.binds {
            query = query.bind(bind);
        }

        let values = tokio::time::timeout(self.timeout, query.fetch_all(&self.pool))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
            .map_err(map_db_error)?;

        values
            .into_iter()
            .map(|value| match value {
                Value::Object(row) => Ok(row),
                other => Err(StoreError::Malformed(format!("expected row object, got {}", other))),
            })
            .collect()
    }
}

fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(EXCLUSION_VIOLATION) => return StoreError::Overlap(db.message().to_string()),
            Some(INVALID_TEXT_REPRESENTATION) => return StoreError::Malformed(db.message().to_string()),
            _ => {}
        }
    }
    error!("Postgres error: {}", err);
    StoreError::Unavailable(err.to_string())
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn query(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.fetch(select_sql(query)?).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        self.fetch(insert_sql(table, &row)?)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Malformed("insert returned no row".into()))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>, StoreError> {
        self.fetch(update_sql(table, filters, &patch)?).await
    }
}
