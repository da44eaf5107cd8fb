use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LabelResult {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Output of one execution. Remote APIs already speak the label contract, so
/// their payload is handed back untouched instead of being reshaped.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Labels {
    Resolved(Vec<LabelResult>),
    Passthrough(serde_json::Value),
}

impl Labels {
    pub fn empty() -> Self {
        Labels::Resolved(vec![])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_without_wrapper() {
        let labels = Labels::Resolved(vec![LabelResult {
            label: "Total".to_owned(),
            value: "42".to_owned(),
            color: None,
        }]);
        assert_eq!(
            serde_json::to_value(&labels).unwrap(),
            json!([{ "label": "Total", "value": "42" }])
        );

        let passthrough = Labels::Passthrough(json!([{ "field": "x", "value": 1 }]));
        assert_eq!(
            serde_json::to_value(&passthrough).unwrap(),
            json!([{ "field": "x", "value": 1 }])
        );
    }
}
