use axum::{extract::State, routing::post, Json, Router};
use common::error::LabelsError;
use resolver::ScriptError;
use tracing::debug;
use types::{ExtractSumReq, FetchLabelsReq, Labels, ResolveLabelsReq, SumConf};

use crate::{AppResult, AppState, AppSuccess};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/custom_labels-fetch", post(fetch))
        .route("/custom_labels-resolve", post(resolve))
        .route("/custom_labels-render", post(render))
        .route("/custom_labels-extract", post(extract))
}

async fn fetch(
    State(state): State<AppState>,
    Json(req): Json<FetchLabelsReq>,
) -> AppResult<AppSuccess<Labels>> {
    let labels = labels::fetch(&state.labels, req).await?;
    Ok(AppSuccess::data(labels))
}

/// Resolves a configuration function, then executes what it returns.
async fn resolve(
    State(state): State<AppState>,
    Json(req): Json<ResolveLabelsReq>,
) -> AppResult<AppSuccess<Labels>> {
    let limits = state.limits;
    let collection_name = req.collection_name.clone();
    let filter = req.filter.clone();
    let source = req.config_function;

    // 解释执行是同步且 CPU 密集的
    let configuration = tokio::task::spawn_blocking(move || {
        let handle = resolver::parse(&source, &limits).ok_or_else(|| {
            LabelsError::BadRequest("Invalid configuration function".to_owned())
        })?;
        handle
            .invoke(&collection_name, &filter)
            .map_err(|e| match e {
                ScriptError::InvalidConfiguration(e) => e.into(),
                e => LabelsError::BadRequest(format!(
                    "Failed to execute configuration function: {}",
                    e
                )),
            })
    })
    .await
    .map_err(|e| LabelsError::Internal(e.to_string()))??;

    let Some(configuration) = configuration else {
        debug!("configuration function returned nothing for {}", req.collection_name);
        return Ok(AppSuccess::data(Labels::empty()));
    };
    let labels =
        labels::execute(&state.labels, &req.collection_name, &req.filter, &configuration).await?;
    Ok(AppSuccess::data(labels))
}

async fn render(Json(conf): Json<SumConf>) -> AppResult<AppSuccess<String>> {
    let source = resolver::render_sum_function(&conf)
        .map_err(|e| LabelsError::Internal(e.to_string()))?;
    Ok(AppSuccess::data(source))
}

async fn extract(
    State(state): State<AppState>,
    Json(req): Json<ExtractSumReq>,
) -> AppResult<AppSuccess<Option<SumConf>>> {
    let limits = state.limits;
    let conf = tokio::task::spawn_blocking(move || {
        resolver::extract_sum_conf(&req.config_function, &limits)
    })
    .await
    .map_err(|e| LabelsError::Internal(e.to_string()))?;
    Ok(AppSuccess::data(conf))
}
