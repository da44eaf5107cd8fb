use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;
use types::Filter;

use crate::{
    HttpRequest, HttpResponse, HttpTransport, LabelContext, RawQuery, Repository,
    RepositoryLookup, Row,
};

/// Field name to sum, or to the error message the sum fails with.
pub type Sums = HashMap<String, Result<Option<Value>, String>>;

#[derive(Default)]
pub struct MockRepositories {
    pub collections: HashMap<String, Arc<MockRepository>>,
    pub fail_lookup: bool,
}

impl MockRepositories {
    pub fn with(name: &str, sums: Sums) -> Self {
        let mut collections = HashMap::new();
        collections.insert(
            name.to_owned(),
            Arc::new(MockRepository {
                sums,
                calls: Mutex::new(vec![]),
            }),
        );
        Self {
            collections,
            fail_lookup: false,
        }
    }
}

#[async_trait]
impl RepositoryLookup for MockRepositories {
    async fn get_repository(&self, name: &str) -> anyhow::Result<Option<Arc<dyn Repository>>> {
        if self.fail_lookup {
            bail!("database is locked");
        }
        Ok(self
            .collections
            .get(name)
            .map(|repository| repository.clone() as Arc<dyn Repository>))
    }
}

pub struct MockRepository {
    pub sums: Sums,
    pub calls: Mutex<Vec<(String, Filter)>>,
}

#[async_trait]
impl Repository for MockRepository {
    async fn sum(&self, field: &str, filter: &Filter) -> anyhow::Result<Option<Value>> {
        self.calls
            .lock()
            .unwrap()
            .push((field.to_owned(), filter.clone()));
        match self.sums.get(field) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(e)) => Err(anyhow!(e.clone())),
            None => bail!("no such column: {}", field),
        }
    }
}

/// Statement to rows, or to the error message the statement fails with.
#[derive(Default)]
pub struct MockRawQuery {
    pub results: HashMap<String, Result<Vec<Row>, String>>,
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl RawQuery for MockRawQuery {
    async fn select(&self, statement: &str) -> anyhow::Result<Vec<Row>> {
        self.calls.lock().unwrap().push(statement.to_owned());
        match self.results.get(statement) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(e)) => Err(anyhow!(e.clone())),
            None => bail!("syntax error near {}", statement),
        }
    }
}

pub struct MockHttp {
    pub response: Result<HttpResponse, String>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttp {
    pub fn ok(status: u16, status_text: &str, data: Value) -> Self {
        Self {
            response: Ok(HttpResponse {
                status,
                status_text: status_text.to_owned(),
                data,
            }),
            requests: Mutex::new(vec![]),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_owned()),
            requests: Mutex::new(vec![]),
        }
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockHttp {
    async fn request(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        self.response.clone().map_err(|e| anyhow!(e))
    }
}

pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

pub fn context(
    repositories: MockRepositories,
    raw_query: Option<MockRawQuery>,
    http: MockHttp,
) -> LabelContext {
    LabelContext {
        repositories: Arc::new(repositories),
        raw_query: raw_query.map(|raw_query| Arc::new(raw_query) as Arc<dyn RawQuery>),
        http: Arc::new(http),
    }
}
