use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::warn;
use tripnest_core::repository::{Filter, Order, Query, RecordStore, Row, StoreError};
use uuid::Uuid;

/// In-process store for tests and local runs.
///
/// Behaves like the hosted store: assigns `id` and `created_at` on insert
/// and returns full rows from writes. `fail_next` makes the next calls fail
/// as if the backend were down.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    failures: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, calls: usize) {
        self.failures.store(calls, Ordering::SeqCst);
    }

    fn injected_failure(&self) -> Result<(), StoreError> {
        let tripped = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            warn!("Injected store failure");
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

fn compare(a: &Value, b: &Value) -> CmpOrdering {
    match (a, b) {
        (Value::Null, Value::Null) => CmpOrdering::Equal,
        (Value::Null, _) => CmpOrdering::Less,
        (_, Value::Null) => CmpOrdering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal)
        }
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn sort_rows(rows: &mut Vec<Row>, order: &Order) {
    let key = |row: &Row| row.get(&order.column).cloned().unwrap_or(Value::Null);
    if order.descending {
        // later inserts win ties
        rows.reverse();
        rows.sort_by(|a, b| compare(&key(b), &key(a)));
    } else {
        rows.sort_by(|a, b| compare(&key(a), &key(b)));
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(row))
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn query(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.injected_failure()?;

        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            sort_rows(&mut rows, order);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, StoreError> {
        self.injected_failure()?;

        if !row.get("id").is_some_and(Value::is_string) {
            row.insert("id".into(), Uuid::new_v4().to_string().into());
        }
        if !row.get("created_at").is_some_and(Value::is_string) {
            row.insert(
                "created_at".into(),
                Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true).into(),
            );
        }

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.iter().any(|existing| existing.get("id") == row.get("id")) {
            return Err(StoreError::Unavailable(format!(
                "duplicate key {}",
                row.get("id").cloned().unwrap_or(Value::Null)
            )));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>, StoreError> {
        self.injected_failure()?;

        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| matches_all(row, filters)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }
}
