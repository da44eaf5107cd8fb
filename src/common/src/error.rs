use std::result;

use types::ConfigurationError;

pub type LabelsResult<T, E = LabelsError> = result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum LabelsError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("{0}")]
    Internal(String),
}

impl From<ConfigurationError> for LabelsError {
    fn from(e: ConfigurationError) -> Self {
        LabelsError::BadRequest(e.to_string())
    }
}

impl LabelsError {
    pub fn status(&self) -> u16 {
        match self {
            LabelsError::BadRequest(_) => 400,
            LabelsError::Upstream { status, .. } => *status,
            LabelsError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(LabelsError::BadRequest("x".to_owned()).status(), 400);
        assert_eq!(LabelsError::Internal("x".to_owned()).status(), 500);
        let err = LabelsError::Upstream {
            status: 404,
            message: "Remote API request failed: Not Found".to_owned(),
        };
        assert_eq!(err.status(), 404);
        assert_eq!(err.to_string(), "Remote API request failed: Not Found");
    }

    #[test]
    fn configuration_errors_are_bad_requests() {
        let err: LabelsError = ConfigurationError::UrlRequired.into();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_string(), "url is required for api type");
    }
}
