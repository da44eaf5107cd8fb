use common::error::{LabelsError, LabelsResult};
use tracing::{debug, warn};
use types::{Filter, LabelResult, SumConf};

use crate::{fallback::settle, value::stringify_value, RepositoryLookup};

pub(crate) async fn execute(
    repositories: &dyn RepositoryLookup,
    collection_name: &str,
    filter: &Filter,
    conf: &SumConf,
) -> LabelsResult<Vec<LabelResult>> {
    let repository = match repositories.get_repository(collection_name).await {
        Ok(Some(repository)) => repository,
        Ok(None) => {
            return Err(LabelsError::BadRequest(format!(
                "Repository {} not found",
                collection_name
            )))
        }
        Err(e) => {
            return Err(LabelsError::Internal(format!(
                "Sum aggregation failed: {}",
                e
            )))
        }
    };

    let mut results = Vec::with_capacity(conf.fields.len());
    for spec in &conf.fields {
        let Some(field) = spec.field_name() else {
            warn!("sum field without a field name on {} skipped", collection_name);
            continue;
        };
        let label = spec.display_label(field);
        debug!("summing {}.{}", collection_name, field);

        let attempt = repository.sum(field, filter).await.map(|sum| LabelResult {
            label: label.clone(),
            value: sum
                .as_ref()
                .and_then(stringify_value)
                .unwrap_or_else(|| "0".to_owned()),
            color: spec.color.clone(),
        });
        results.push(settle(field, attempt, || LabelResult {
            label,
            value: "0".to_owned(),
            color: spec.color.clone(),
        }));
    }
    Ok(results)
}
