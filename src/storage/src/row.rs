use anyhow::{bail, Result};
use serde_json::{Map, Value};
use sqlx::{any::AnyRow, Column as _, Row as _};

pub(crate) fn decode_row(row: &AnyRow) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for column in row.columns() {
        map.insert(column.name().to_owned(), decode_column(row, column.ordinal())?);
    }
    Ok(map)
}

/// Decodes one column into JSON, whatever type the driver reports.
pub(crate) fn decode_column(row: &AnyRow, index: usize) -> Result<Value> {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return Ok(value.map(Value::from).unwrap_or(Value::Null));
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return Ok(value.map(Value::from).unwrap_or(Value::Null));
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return Ok(value.map(Value::String).unwrap_or(Value::Null));
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return Ok(value.map(Value::Bool).unwrap_or(Value::Null));
    }
    if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Ok(value
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null));
    }
    bail!("column {} has an unsupported type", index)
}
