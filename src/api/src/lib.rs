use std::result;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use common::{config::ScriptLimits, error::LabelsError};
use labels::LabelContext;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

mod custom_labels;

pub(crate) type AppResult<T, E = AppError> = result::Result<T, E>;

#[derive(Serialize, Debug)]
pub(crate) struct AppSuccess<T> {
    data: T,
}

impl<T> AppSuccess<T> {
    pub fn data(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for AppSuccess<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Serialize, Debug)]
pub(crate) struct AppError {
    code: u16,
    message: String,
}

impl From<LabelsError> for AppError {
    fn from(e: LabelsError) -> Self {
        Self {
            code: e.status(),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub labels: LabelContext,
    pub limits: ScriptLimits,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .nest("/api/collections", custom_labels::routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start(port: u16, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, routes(state)).await?;
    Ok(())
}
