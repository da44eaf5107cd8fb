use std::{env, path::Path, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use api::{start, AppState};
use common::config::Config;
use labels::{
    transport::ReqwestTransport, LabelContext, RawQuery, Repository, RepositoryLookup,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Stands in for the database when none is configured.
struct NoStorage;

#[async_trait::async_trait]
impl RepositoryLookup for NoStorage {
    async fn get_repository(&self, _name: &str) -> Result<Option<Arc<dyn Repository>>> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = env::var("LABELS_CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
    let found = Path::new(&path).exists();
    let config = match found {
        true => Config::load(&path)?,
        false => Config::parse("")?,
    };

    let level = Level::from_str(&config.log_level)
        .with_context(|| format!("invalid log_level {}", config.log_level))?;
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    if !found {
        warn!("{} not found, using defaults", path);
    }

    let (repositories, raw_query): (Arc<dyn RepositoryLookup>, Option<Arc<dyn RawQuery>>) =
        match &config.storage {
            Some(storage_config) => {
                let database = Arc::new(storage::connect(storage_config).await?);
                let repositories: Arc<dyn RepositoryLookup> = database.clone();
                let raw_query: Arc<dyn RawQuery> = database;
                (repositories, Some(raw_query))
            }
            None => {
                warn!("no storage configured, sum and sql labels are unavailable");
                (Arc::new(NoStorage) as Arc<dyn RepositoryLookup>, None)
            }
        };

    let state = AppState {
        labels: LabelContext {
            repositories,
            raw_query,
            http: Arc::new(ReqwestTransport::new()?),
        },
        limits: config.script,
    };

    info!("server start");
    start(config.port, state).await
}
