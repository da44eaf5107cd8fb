//! Configuration resolver.
//!
//! A custom label configuration can be stored as the text of a function.
//! [`parse`] turns that text into a [`FunctionHandle`] and
//! [`FunctionHandle::invoke`] calls it with the collection name and the
//! active filter to obtain a [`Configuration`].
//!
//! Functions run in a small interpreter for a JavaScript-like subset. It has
//! no access to files, the network, the environment, clocks or the host
//! process, and every run is bounded by [`ScriptLimits`]: source length,
//! parser nesting, evaluation steps, call depth and string/array length.
//! Configuration functions are written by trusted operators; the interpreter
//! bounds their resources and gives no stronger isolation guarantee.

use std::sync::Arc;

use common::config::ScriptLimits;
use script::{parse_function_body, parse_function_expression, FunctionDef, Interpreter};
use tracing::error;
use types::{Configuration, Filter};

mod basic;
mod error;
mod script;

pub use basic::{extract_sum_conf, render_sum_function};
pub use error::{ScriptError, ScriptResult};

/// Parameters of a function given as a bare body.
const BODY_PARAMS: [&str; 2] = ["repo", "filter"];

/// A parsed configuration function. Holds the syntax tree and the limits
/// every call runs under; each call gets a fresh interpreter.
#[derive(Debug, Clone)]
pub struct FunctionHandle {
    function: Arc<FunctionDef>,
    limits: ScriptLimits,
}

impl FunctionHandle {
    /// Calls the function and returns its result as JSON. `undefined` is
    /// returned as `null`.
    pub fn call(
        &self,
        collection_name: &str,
        filter: &Filter,
    ) -> ScriptResult<serde_json::Value> {
        let mut interpreter = Interpreter::new(&self.limits);
        interpreter.run(
            self.function.clone(),
            &[
                serde_json::Value::String(collection_name.to_owned()),
                filter.as_value().clone(),
            ],
        )
    }

    /// Calls the function and converts the result. `Ok(None)` means the
    /// function returned no configuration.
    pub fn invoke(
        &self,
        collection_name: &str,
        filter: &Filter,
    ) -> ScriptResult<Option<Configuration>> {
        let value = self.call(collection_name, filter)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(Configuration::from_value(&value)?))
    }
}

/// Whether `source` is a complete function expression rather than a body.
pub fn is_function_expression(source: &str) -> bool {
    source.contains("=>") || source.contains("function")
}

pub fn compile(source: &str, limits: &ScriptLimits) -> ScriptResult<FunctionHandle> {
    let source = source.trim();
    if source.is_empty() {
        return Err(ScriptError::Empty);
    }
    if source.chars().count() > limits.max_source_len {
        return Err(ScriptError::Limit(format!(
            "source longer than {}",
            limits.max_source_len
        )));
    }

    let function = if is_function_expression(source) {
        parse_function_expression(source, limits.max_nesting)?
    } else {
        parse_function_body(source, &BODY_PARAMS, limits.max_nesting)?
    };
    Ok(FunctionHandle {
        function: Arc::new(function),
        limits: *limits,
    })
}

/// Like [`compile`], but failures are logged and reported as `None`.
pub fn parse(source: &str, limits: &ScriptLimits) -> Option<FunctionHandle> {
    match compile(source, limits) {
        Ok(handle) => Some(handle),
        Err(ScriptError::Empty) => None,
        Err(e) => {
            error!("Error parsing configuration function: {}", e);
            None
        }
    }
}
