use super::{Filter, Query, RecordStore, Row, Table};
use crate::config::StoreConfig;
use crate::errors::StoreError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Hosted table backend speaking the PostgREST dialect
/// (`/rest/v1/<table>?column=op.value`).
pub struct RestStore {
    client: Client,
    config: StoreConfig,
}

impl RestStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.config.endpoint, table.name())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.access_key)
            .header("Authorization", format!("Bearer {}", self.config.access_key))
    }
}

/// Renders a filter as a PostgREST query pair.
fn filter_param(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(column, value) => (column.to_string(), format!("eq.{}", scalar(value))),
        Filter::Gte(column, value) => (column.to_string(), format!("gte.{}", scalar(value))),
        Filter::NotNull(column) => (column.to_string(), "not.is.null".to_string()),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(filter_param).collect()
}

async fn checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RecordStore for RestStore {
    fn kind(&self) -> &'static str {
        "rest"
    }

    async fn query(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(&query.filters));

        let response = self
            .authorized(self.client.get(self.table_url(table)))
            .query(&params)
            .send()
            .await?;
        let rows = checked(response).await?.json::<Vec<Row>>().await?;
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError> {
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&vec![row])
            .send()
            .await?;
        let mut rows = checked(response).await?.json::<Vec<Row>>().await?;
        rows.pop().ok_or(StoreError::InvalidRow {
            table: table.name(),
            message: "insert returned no rows".to_string(),
        })
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<usize, StoreError> {
        let response = self
            .authorized(self.client.patch(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&filter_params(filters))
            .json(&patch)
            .send()
            .await?;
        let rows = checked(response).await?.json::<Vec<Row>>().await?;
        Ok(rows.len())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize, StoreError> {
        let response = self
            .authorized(self.client.delete(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&filter_params(filters))
            .send()
            .await?;
        let rows = checked(response).await?.json::<Vec<Row>>().await?;
        Ok(rows.len())
    }
}
