use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// A persisted row as a keyed field map.
pub type Row = serde_json::Map<String, Value>;

pub const RESERVATIONS: &str = "reservations";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Unavailable(String),

    #[error("Store returned malformed data: {0}")]
    Malformed(String),

    #[error("Store rejected overlapping reservation: {0}")]
    Overlap(String),

    #[error("Store request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unsupported store operation: {0}")]
    Unsupported(String),
}

/// Equality filter on a single column
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column).unwrap_or(&Value::Null) == &self.value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// Filtered, optionally ordered read against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::equals(column, value));
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending: true,
        });
        self
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending: false,
        });
        self
    }
}

/// Capability interface over the hosted relational store.
///
/// Any backend that can do equality-filtered reads, keyed inserts and
/// filtered patches satisfies it. Rows are never deleted.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Insert a row; the store assigns `id` and `created_at` when absent.
    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError>;

    /// Apply `patch` to every row matching all `filters`, returning the
    /// updated rows (empty when nothing matched).
    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>, StoreError>;
}
