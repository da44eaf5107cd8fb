use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Configuration {
    Sum(SumConf),
    Sql(SqlConf),
    Api(ApiConf),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct SumConf {
    pub fields: Vec<FieldSpec>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct FieldSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct SqlConf {
    pub fields: Vec<SqlFieldSpec>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct SqlFieldSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    // 查询语句
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ApiConf {
    pub data: ApiRequestConf,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ApiRequestConf {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationType {
    Sum,
    Sql,
    Api,
}

impl fmt::Display for ConfigurationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationType::Sum => write!(f, "sum"),
            ConfigurationType::Sql => write!(f, "sql"),
            ConfigurationType::Api => write!(f, "api"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigurationError {
    #[error("type must be sum, sql or api")]
    UnknownType,
    #[error("fields array is required for {0} type")]
    FieldsRequired(ConfigurationType),
    #[error("fields array is malformed for {0} type: {1}")]
    MalformedFields(ConfigurationType, String),
    #[error("url is required for api type")]
    UrlRequired,
    #[error("data is malformed for api type: {0}")]
    MalformedApiData(String),
}

impl Configuration {
    pub fn typ(&self) -> ConfigurationType {
        match self {
            Configuration::Sum(_) => ConfigurationType::Sum,
            Configuration::Sql(_) => ConfigurationType::Sql,
            Configuration::Api(_) => ConfigurationType::Api,
        }
    }

    /// Structural conversion from an untyped value. The `type` tag picks the
    /// shape and the shape's own requirements decide the error.
    pub fn from_value(value: &Value) -> Result<Self, ConfigurationError> {
        match value.get("type").and_then(Value::as_str) {
            Some("sum") => {
                let fields = fields_array(value, ConfigurationType::Sum)?;
                Ok(Configuration::Sum(SumConf { fields }))
            }
            Some("sql") => {
                let fields = fields_array(value, ConfigurationType::Sql)?;
                Ok(Configuration::Sql(SqlConf { fields }))
            }
            Some("api") => {
                let data = value.get("data").unwrap_or(&Value::Null);
                match data.get("url").and_then(Value::as_str) {
                    Some(url) if !url.is_empty() => {}
                    _ => return Err(ConfigurationError::UrlRequired),
                }
                let data: ApiRequestConf = serde_json::from_value(data.clone())
                    .map_err(|e| ConfigurationError::MalformedApiData(e.to_string()))?;
                Ok(Configuration::Api(ApiConf { data }))
            }
            _ => Err(ConfigurationError::UnknownType),
        }
    }
}

fn fields_array<T: serde::de::DeserializeOwned>(
    value: &Value,
    typ: ConfigurationType,
) -> Result<Vec<T>, ConfigurationError> {
    match value.get("fields") {
        Some(fields @ Value::Array(_)) => serde_json::from_value(fields.clone())
            .map_err(|e| ConfigurationError::MalformedFields(typ, e.to_string())),
        _ => Err(ConfigurationError::FieldsRequired(typ)),
    }
}

// 空字符串视为缺失
pub(crate) fn present(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

impl FieldSpec {
    pub fn field_name(&self) -> Option<&str> {
        present(&self.field)
    }

    pub fn display_label(&self, field: &str) -> String {
        match present(&self.label) {
            Some(label) => label.to_owned(),
            None => format!("{}-summary", field),
        }
    }
}

impl SqlFieldSpec {
    pub fn statement(&self) -> Option<&str> {
        present(&self.value)
    }

    pub fn display_label(&self) -> String {
        present(&self.label)
            .or(present(&self.field))
            .unwrap_or_default()
            .to_owned()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sum_round_trips_through_tag() {
        let value = json!({
            "type": "sum",
            "fields": [{ "field": "amount", "label": "Total", "color": "blue" }]
        });
        let conf = Configuration::from_value(&value).unwrap();
        assert_eq!(conf.typ(), ConfigurationType::Sum);
        assert_eq!(serde_json::to_value(&conf).unwrap(), value);
    }

    #[test]
    fn empty_fields_are_accepted() {
        let conf = Configuration::from_value(&json!({ "type": "sum", "fields": [] })).unwrap();
        assert_eq!(conf, Configuration::Sum(SumConf::default()));
    }

    #[test]
    fn unknown_or_missing_type() {
        for value in [
            json!({ "type": "graphql" }),
            json!({ "fields": [] }),
            json!({ "type": 3 }),
            json!(null),
        ] {
            assert_eq!(
                Configuration::from_value(&value),
                Err(ConfigurationError::UnknownType)
            );
        }
        assert_eq!(
            ConfigurationError::UnknownType.to_string(),
            "type must be sum, sql or api"
        );
    }

    #[test]
    fn fields_must_be_an_array() {
        let err = Configuration::from_value(&json!({ "type": "sum", "fields": {} })).unwrap_err();
        assert_eq!(err.to_string(), "fields array is required for sum type");

        let err = Configuration::from_value(&json!({ "type": "sql" })).unwrap_err();
        assert_eq!(err.to_string(), "fields array is required for sql type");

        let err =
            Configuration::from_value(&json!({ "type": "sum", "fields": [42] })).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MalformedFields(ConfigurationType::Sum, _)
        ));
    }

    #[test]
    fn api_requires_url() {
        for value in [
            json!({ "type": "api" }),
            json!({ "type": "api", "data": {} }),
            json!({ "type": "api", "data": { "url": "" } }),
        ] {
            assert_eq!(
                Configuration::from_value(&value),
                Err(ConfigurationError::UrlRequired)
            );
        }

        let conf = Configuration::from_value(&json!({
            "type": "api",
            "data": {
                "url": "https://api.example.com/d",
                "method": "POST",
                "query": { "collection": "orders" },
                "headers": { "X-Token": "t" }
            }
        }))
        .unwrap();
        match conf {
            Configuration::Api(ApiConf { data }) => {
                assert_eq!(data.url, "https://api.example.com/d");
                assert_eq!(data.method.as_deref(), Some("POST"));
                assert_eq!(data.headers.unwrap()["X-Token"], "t");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn labels_fall_back_like_the_host() {
        let spec = FieldSpec {
            field: Some("amount".to_owned()),
            label: Some(String::new()),
            color: None,
        };
        assert_eq!(spec.field_name(), Some("amount"));
        assert_eq!(spec.display_label("amount"), "amount-summary");

        let sql = SqlFieldSpec {
            field: Some("id".to_owned()),
            value: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(sql.statement(), None);
        assert_eq!(sql.display_label(), "id");
    }
}
