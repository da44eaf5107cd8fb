//! Label executor: turns a [`Configuration`] into the labels shown above a
//! collection view.

use std::sync::Arc;

use common::error::{LabelsError, LabelsResult};
use tracing::info;
use types::{Configuration, FetchLabelsReq, Filter, Labels};

mod api;
pub mod collaborator;
mod fallback;
mod sql;
mod sum;
#[cfg(test)]
mod testing;
pub mod transport;
mod value;

pub use collaborator::{
    HttpRequest, HttpResponse, HttpTransport, RawQuery, Repository, RepositoryLookup, Row,
};
pub use value::stringify_value;

/// The collaborators an execution runs against. Shared by every request.
#[derive(Clone)]
pub struct LabelContext {
    pub repositories: Arc<dyn RepositoryLookup>,
    /// `None` when the backend cannot run raw statements.
    pub raw_query: Option<Arc<dyn RawQuery>>,
    pub http: Arc<dyn HttpTransport>,
}

/// Executes the configuration carried by a fetch request.
pub async fn fetch(ctx: &LabelContext, req: FetchLabelsReq) -> LabelsResult<Labels> {
    let configuration = match req.configuration {
        Some(configuration) if !configuration.is_null() => configuration,
        _ => return Err(LabelsError::BadRequest("config is required".to_owned())),
    };
    let configuration = Configuration::from_value(&configuration)?;
    execute(ctx, &req.collection_name, &req.filter, &configuration).await
}

pub async fn execute(
    ctx: &LabelContext,
    collection_name: &str,
    filter: &Filter,
    configuration: &Configuration,
) -> LabelsResult<Labels> {
    info!(
        "fetching {} labels for {}",
        configuration.typ(),
        collection_name
    );
    match configuration {
        Configuration::Sum(conf) => {
            sum::execute(ctx.repositories.as_ref(), collection_name, filter, conf)
                .await
                .map(Labels::Resolved)
        }
        Configuration::Sql(conf) => sql::execute(ctx.raw_query.as_deref(), conf)
            .await
            .map(Labels::Resolved),
        Configuration::Api(conf) => api::execute(ctx.http.as_ref(), conf)
            .await
            .map(Labels::Passthrough),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use types::LabelResult;

    use super::*;
    use crate::testing::{context, row, MockHttp, MockRawQuery, MockRepositories, Sums};

    fn request(configuration: serde_json::Value) -> FetchLabelsReq {
        serde_json::from_value(json!({
            "collectionName": "orders",
            "filter": { "status": { "$eq": "paid" } },
            "configuration": configuration,
        }))
        .unwrap()
    }

    fn empty_context() -> LabelContext {
        context(
            MockRepositories::default(),
            None,
            MockHttp::ok(200, "OK", json!(null)),
        )
    }

    #[tokio::test]
    async fn sum_end_to_end() {
        let sums = Sums::from([("amount".to_owned(), Ok(Some(json!(42))))]);
        let ctx = context(
            MockRepositories::with("orders", sums),
            None,
            MockHttp::ok(200, "OK", json!(null)),
        );
        let labels = fetch(
            &ctx,
            request(json!({
                "type": "sum",
                "fields": [{ "field": "amount", "label": "Total", "color": "blue" }]
            })),
        )
        .await
        .unwrap();
        assert_eq!(
            labels,
            Labels::Resolved(vec![LabelResult {
                label: "Total".to_owned(),
                value: "42".to_owned(),
                color: Some("blue".to_owned()),
            }])
        );
        assert_eq!(
            serde_json::to_value(&labels).unwrap(),
            json!([{ "label": "Total", "value": "42", "color": "blue" }])
        );
    }

    #[tokio::test]
    async fn sql_end_to_end() {
        let mut raw_query = MockRawQuery::default();
        raw_query.results.insert(
            "select sum(amount) as sum from orders".to_owned(),
            Ok(vec![row(&[("sum", json!(10.25))])]),
        );
        let ctx = context(
            MockRepositories::default(),
            Some(raw_query),
            MockHttp::ok(200, "OK", json!(null)),
        );
        let labels = fetch(
            &ctx,
            request(json!({
                "type": "sql",
                "fields": [{ "field": "amount", "value": "select sum(amount) as sum from orders" }]
            })),
        )
        .await
        .unwrap();
        assert_eq!(
            serde_json::to_value(&labels).unwrap(),
            json!([{ "label": "amount", "value": "10.25" }])
        );
    }

    #[tokio::test]
    async fn api_end_to_end() {
        let payload = json!({ "success": true, "data": [{ "field": "x", "label": "X", "value": "1" }] });
        let ctx = context(
            MockRepositories::default(),
            None,
            MockHttp::ok(200, "OK", payload),
        );
        let labels = fetch(
            &ctx,
            request(json!({ "type": "api", "data": { "url": "https://api.example.com/labels" } })),
        )
        .await
        .unwrap();
        assert_eq!(
            labels,
            Labels::Passthrough(json!([{ "field": "x", "label": "X", "value": "1" }]))
        );
    }

    #[tokio::test]
    async fn missing_configuration() {
        let err = fetch(&empty_context(), request(json!(null)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_string(), "config is required");

        let req: FetchLabelsReq = serde_json::from_value(json!({ "repo": "orders" })).unwrap();
        let err = fetch(&empty_context(), req).await.unwrap_err();
        assert_eq!(err.to_string(), "config is required");
    }

    #[tokio::test]
    async fn invalid_configuration_is_a_bad_request() {
        let cases = [
            (json!({ "type": "graph" }), "type must be sum, sql or api"),
            (json!({ "type": "sum" }), "fields array is required for sum type"),
            (json!({ "type": "sql", "fields": "x" }), "fields array is required for sql type"),
            (json!({ "type": "api", "data": {} }), "url is required for api type"),
        ];
        for (configuration, message) in cases {
            let err = fetch(&empty_context(), request(configuration))
                .await
                .unwrap_err();
            assert_eq!(err.status(), 400);
            assert_eq!(err.to_string(), message);
        }
    }
}
