use tracing::error;
use types::LabelResult;

/// Settles one field attempt into its result, or into the fallback entry
/// after logging why the field failed.
pub(crate) fn settle(
    field: &str,
    attempt: anyhow::Result<LabelResult>,
    fallback: impl FnOnce() -> LabelResult,
) -> LabelResult {
    match attempt {
        Ok(result) => result,
        Err(e) => {
            error!("label field {} failed: {:#}", field, e);
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    fn result(value: &str) -> LabelResult {
        LabelResult {
            label: "Total".to_owned(),
            value: value.to_owned(),
            color: None,
        }
    }

    #[test]
    fn success_wins() {
        assert_eq!(settle("amount", Ok(result("42")), || result("0")), result("42"));
    }

    #[test]
    fn failure_falls_back() {
        let attempt = Err(anyhow!("column missing").context("sum"));
        assert_eq!(settle("amount", attempt, || result("0")), result("0"));
    }
}
