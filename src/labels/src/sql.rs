use common::error::{LabelsError, LabelsResult};
use tracing::{debug, warn};
use types::{LabelResult, SqlConf};

use crate::{fallback::settle, value::stringify_value, RawQuery, Row};

/// Column aliases a statement may use for its result, in priority order.
const VALUE_ALIASES: [&str; 6] = ["sum", "count", "avg", "max", "min", "total"];

pub(crate) async fn execute(
    raw_query: Option<&dyn RawQuery>,
    conf: &SqlConf,
) -> LabelsResult<Vec<LabelResult>> {
    let Some(raw_query) = raw_query else {
        return Err(LabelsError::Internal(
            "SQL query failed: raw queries are not available".to_owned(),
        ));
    };

    let mut results = Vec::with_capacity(conf.fields.len());
    for spec in &conf.fields {
        let Some(statement) = spec.statement() else {
            warn!("sql field {:?} without a statement skipped", spec.field);
            continue;
        };
        let label = spec.display_label();
        debug!("running statement for {}", label);

        let attempt = raw_query.select(statement).await.map(|rows| LabelResult {
            label: label.clone(),
            value: row_value(&rows),
            color: spec.color.clone(),
        });
        let name = spec.field.as_deref().unwrap_or(statement);
        results.push(settle(name, attempt, || LabelResult {
            label: label.clone(),
            value: "-".to_owned(),
            color: spec.color.clone(),
        }));
    }
    Ok(results)
}

/// Picks the label value out of the first row.
pub(crate) fn row_value(rows: &[Row]) -> String {
    let Some(row) = rows.first() else {
        return "-".to_owned();
    };
    VALUE_ALIASES
        .iter()
        .find_map(|alias| row.get(*alias).and_then(stringify_value))
        .unwrap_or_else(|| "0".to_owned())
}
