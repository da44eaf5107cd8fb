use serde_json::Value;

/// Renders a collaborator value as label text. Numbers print the way the UI
/// prints them (`42`, not `42.0`); `null` has no text.
pub fn stringify_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
            _ => n.to_string(),
        }),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(stringify_value(&json!(42)).as_deref(), Some("42"));
        assert_eq!(stringify_value(&json!(42.0)).as_deref(), Some("42"));
        assert_eq!(stringify_value(&json!(-0.5)).as_deref(), Some("-0.5"));
        assert_eq!(stringify_value(&json!(1234.56)).as_deref(), Some("1234.56"));
    }

    #[test]
    fn other_values() {
        assert_eq!(stringify_value(&json!(null)), None);
        assert_eq!(stringify_value(&json!("12.50")).as_deref(), Some("12.50"));
        assert_eq!(stringify_value(&json!(true)).as_deref(), Some("true"));
        assert_eq!(stringify_value(&json!([1, 2])).as_deref(), Some("[1,2]"));
    }
}
