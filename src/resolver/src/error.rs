use types::ConfigurationError;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScriptError {
    #[error("configuration function is empty")]
    Empty,
    #[error("syntax error at position {pos}: {message}")]
    Syntax { message: String, pos: usize },
    #[error("configuration function must be a function expression")]
    NotCallable,
    #[error("{0}")]
    Runtime(String),
    #[error("limit exceeded: {0}")]
    Limit(String),
    #[error("{0}")]
    InvalidConfiguration(#[from] ConfigurationError),
}

pub type ScriptResult<T> = Result<T, ScriptError>;

pub(crate) fn runtime<T>(message: impl Into<String>) -> ScriptResult<T> {
    Err(ScriptError::Runtime(message.into()))
}
