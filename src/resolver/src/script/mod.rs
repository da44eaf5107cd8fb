mod ast;
mod builtins;
mod interp;
mod lexer;
mod parser;
mod value;

pub(crate) use ast::FunctionDef;
pub(crate) use interp::Interpreter;
pub(crate) use parser::{parse_function_body, parse_function_expression};
