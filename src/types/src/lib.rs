use serde::{Deserialize, Serialize};

pub mod configuration;
pub mod labels;

pub use configuration::{
    ApiConf, ApiRequestConf, Configuration, ConfigurationError, ConfigurationType, FieldSpec,
    SqlConf, SqlFieldSpec, SumConf,
};
pub use labels::{LabelResult, Labels};

/// The active view filter. Never interpreted by the engine, only handed to
/// collaborators and configuration functions. `null` reads as `{}`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub struct Filter(pub serde_json::Value);

impl Default for Filter {
    fn default() -> Self {
        Filter(serde_json::Value::Object(serde_json::Map::new()))
    }
}

impl Filter {
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Filter {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Filter::default(),
            value => Filter(value),
        }
    }
}

impl From<Filter> for serde_json::Value {
    fn from(filter: Filter) -> Self {
        filter.0
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FetchLabelsReq {
    #[serde(alias = "repo")]
    pub collection_name: String,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default, alias = "config")]
    pub configuration: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResolveLabelsReq {
    #[serde(alias = "repo")]
    pub collection_name: String,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub config_function: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExtractSumReq {
    #[serde(default)]
    pub config_function: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn fetch_req_accepts_host_aliases() {
        let req: FetchLabelsReq = serde_json::from_value(json!({
            "repo": "orders",
            "filter": { "$and": [] },
            "config": { "type": "sum", "fields": [] }
        }))
        .unwrap();
        assert_eq!(req.collection_name, "orders");
        assert_eq!(req.filter, Filter(json!({ "$and": [] })));
        assert!(req.configuration.is_some());
    }

    #[test]
    fn missing_filter_defaults_to_empty_object() {
        let req: FetchLabelsReq =
            serde_json::from_value(json!({ "collectionName": "orders" })).unwrap();
        assert_eq!(req.filter, Filter(json!({})));
        assert!(req.configuration.is_none());
    }

    #[test]
    fn null_filter_is_empty() {
        let req: FetchLabelsReq = serde_json::from_value(json!({
            "collectionName": "orders",
            "filter": null
        }))
        .unwrap();
        assert_eq!(req.filter, Filter(json!({})));

        let req: ResolveLabelsReq = serde_json::from_value(json!({
            "repo": "orders",
            "filter": null,
            "configFunction": "return null"
        }))
        .unwrap();
        assert_eq!(req.filter, Filter::default());
        assert_eq!(serde_json::to_value(&req.filter).unwrap(), json!({}));
    }
}
