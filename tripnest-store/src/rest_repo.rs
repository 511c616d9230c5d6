use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};
use tripnest_core::repository::{Filter, Query, RecordStore, Row, StoreError};
use tripnest_shared::pii::Masked;

const EXCLUSION_VIOLATION: &str = "23P01";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

/// `RecordStore` over a hosted backend-as-a-service REST endpoint
/// (`{base}/rest/v1/{table}` with `column=eq.value` filters).
#[derive(Clone)]
pub struct RestRecordStore {
    client: Client,
    base_url: String,
    api_key: Masked<String>,
    timeout: Duration,
}

impl RestRecordStore {
    pub fn new(base_url: impl Into<String>, api_key: Masked<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.api_key.expose())
            .bearer_auth(self.api_key.expose())
            .header("Prefer", "return=representation")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<Row>, StoreError> {
        let response = self.authorized(request).send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(self.timeout)
            } else {
                StoreError::Unavailable(e.to_string())
            }
        })?;

        read_rows(response).await
    }
}

/// PostgREST query parameters for equality filters and ordering.
pub fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| {
            let condition = match &f.value {
                Value::Null => "is.null".to_string(),
                Value::String(s) => format!("eq.{}", s),
                other => format!("eq.{}", other),
            };
            (f.column.clone(), condition)
        })
        .collect()
}

fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(&query.filters));
    if let Some(order) = &query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    params
}

async fn read_rows(response: Response) -> Result<Vec<Row>, StoreError> {
    let status = response.status();
    if status.is_success() {
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        return rows_from(body);
    }

    let body = response.text().await.unwrap_or_default();
    let code = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("code").and_then(Value::as_str).map(str::to_string));

    match (status, code.as_deref()) {
        (StatusCode::CONFLICT, Some(EXCLUSION_VIOLATION)) => Err(StoreError::Overlap(body)),
        // A filter value that does not parse as the column type matches nothing,
        // same as the text comparison the Postgres adapter uses for ids
        (StatusCode::BAD_REQUEST, Some(INVALID_TEXT_REPRESENTATION)) => {
            debug!("Filter value rejected by store: {}", body);
            Ok(Vec::new())
        }
        _ => {
            error!("Store responded {}: {}", status, body);
            Err(StoreError::Unavailable(format!("{}: {}", status.as_u16(), body)))
        }
    }
}

fn rows_from(body: Value) -> Result<Vec<Row>, StoreError> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(StoreError::Malformed(format!("expected row object, got {}", other))),
            })
            .collect(),
        Value::Object(row) => Ok(vec![row]),
        other => Err(StoreError::Malformed(format!("expected row array, got {}", other))),
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn query(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        debug!("GET {} {:?}", query.table, query.filters);
        let request = self
            .client
            .get(self.table_url(&query.table))
            .query(&query_params(query));
        self.send(request).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        let request = self.client.post(self.table_url(table)).json(&row);
        self.send(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Malformed("insert returned no row".into()))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>, StoreError> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&filter_params(filters))
            .json(&patch);
        self.send(request).await
    }
}
