use common::config::ScriptLimits;
use tracing::debug;
use types::{Configuration, Filter, SumConf};

/// Renders the function source behind the basic aggregation form.
pub fn render_sum_function(conf: &SumConf) -> serde_json::Result<String> {
    let body = serde_json::to_string_pretty(&Configuration::Sum(conf.clone()))?;
    Ok(format!(
        "(repo, filter) => {{\n  return {};\n}}",
        body.replace('\n', "\n  ")
    ))
}

/// Reads a sum configuration back out of a function source, so the form can
/// be prefilled. Anything that is not a sum configuration yields `None`.
pub fn extract_sum_conf(source: &str, limits: &ScriptLimits) -> Option<SumConf> {
    let handle = crate::parse(source, limits)?;
    match handle.invoke("test", &Filter::default()) {
        Ok(Some(Configuration::Sum(conf))) => Some(conf),
        Ok(_) => None,
        Err(e) => {
            debug!("configuration function is not a basic aggregation: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use types::FieldSpec;

    use super::*;

    fn conf() -> SumConf {
        SumConf {
            fields: vec![FieldSpec {
                field: Some("amount".to_owned()),
                label: Some("Total".to_owned()),
                color: Some("blue".to_owned()),
            }],
        }
    }

    #[test]
    fn render_layout() {
        let source = render_sum_function(&SumConf::default()).unwrap();
        assert_eq!(
            source,
            "(repo, filter) => {\n  return {\n    \"type\": \"sum\",\n    \"fields\": []\n  };\n}"
        );
    }

    #[test]
    fn rendered_function_extracts_back() {
        let limits = ScriptLimits::default();
        let source = render_sum_function(&conf()).unwrap();
        assert_eq!(extract_sum_conf(&source, &limits), Some(conf()));
    }

    #[test]
    fn extract_rejects_other_configurations() {
        let limits = ScriptLimits::default();
        assert_eq!(
            extract_sum_conf("return { type: 'api', data: { url: 'http://x' } }", &limits),
            None
        );
        assert_eq!(extract_sum_conf("return null", &limits), None);
        assert_eq!(extract_sum_conf("(repo => {", &limits), None);
        assert_eq!(extract_sum_conf("", &limits), None);
        assert_eq!(extract_sum_conf("throw 'no'", &limits), None);
    }
}
