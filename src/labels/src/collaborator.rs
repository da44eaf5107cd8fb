use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde_json::{Map, Value};
use types::Filter;

/// One result row of a raw query, keyed by column alias.
pub type Row = Map<String, Value>;

#[async_trait]
pub trait RepositoryLookup: Send + Sync {
    /// `Ok(None)` when no collection of that name exists.
    async fn get_repository(&self, name: &str) -> anyhow::Result<Option<Arc<dyn Repository>>>;
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Sum of `field` over the records matching `filter`. `None` when there
    /// is nothing to sum.
    async fn sum(&self, field: &str, filter: &Filter) -> anyhow::Result<Option<Value>>;
}

#[async_trait]
pub trait RawQuery: Send + Sync {
    /// Runs a read-only statement.
    async fn select(&self, statement: &str) -> anyhow::Result<Vec<Row>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub params: Option<Map<String, Value>>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub data: Value,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends one request. A non-2xx response is still `Ok`; only failures to
    /// get a response at all are errors.
    async fn request(&self, request: HttpRequest) -> anyhow::Result<HttpResponse>;
}
