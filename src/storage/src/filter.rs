use anyhow::{bail, Result};
use serde_json::Value;

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// A WHERE clause with `?` placeholders and the values bound to them, in
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub clause: String,
    pub params: Vec<Param>,
}

/// Compiles a view filter into a predicate. `None` when the filter does not
/// restrict anything.
///
/// Supported: `$and`, `$or`, and per field `$eq`, `$ne`, `$gt`, `$gte`,
/// `$lt`, `$lte`, `$in`, `$notIn`, `$includes`, `$notIncludes`, `$empty`,
/// `$notEmpty`. A bare field value means `$eq`.
pub fn compile(filter: &Value) -> Result<Option<Predicate>> {
    let mut compiler = Compiler { params: vec![] };
    Ok(compiler.group(filter)?.map(|clause| Predicate {
        clause,
        params: compiler.params,
    }))
}

/// Validates a column or table name and quotes it.
pub fn quote_identifier(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid || name.len() > 64 {
        bail!("invalid identifier {:?}", name);
    }
    Ok(format!("`{}`", name))
}

struct Compiler {
    params: Vec<Param>,
}

impl Compiler {
    fn group(&mut self, filter: &Value) -> Result<Option<String>> {
        let map = match filter {
            Value::Null => return Ok(None),
            Value::Object(map) => map,
            other => bail!("filter must be an object, got {}", other),
        };
        let mut parts = vec![];
        for (key, value) in map {
            let part = match key.as_str() {
                "$and" => self.combine(value, "AND")?,
                "$or" => self.combine(value, "OR")?,
                op if op.starts_with('$') => bail!("unsupported filter operator {}", op),
                field => self.field(field, value)?,
            };
            parts.extend(part);
        }
        Ok(join(parts, "AND"))
    }

    fn combine(&mut self, value: &Value, joiner: &str) -> Result<Option<String>> {
        let Value::Array(items) = value else {
            bail!("${} expects an array of filters", joiner.to_lowercase());
        };
        let mut parts = vec![];
        for item in items {
            parts.extend(self.group(item)?);
        }
        Ok(join(parts, joiner))
    }

    fn field(&mut self, field: &str, condition: &Value) -> Result<Option<String>> {
        let column = quote_identifier(field)?;
        match condition {
            Value::Object(ops) => {
                let mut parts = vec![];
                for (op, operand) in ops {
                    parts.push(self.operator(&column, op, operand)?);
                }
                Ok(join(parts, "AND"))
            }
            value => self.operator(&column, "$eq", value).map(Some),
        }
    }

    fn operator(&mut self, column: &str, op: &str, operand: &Value) -> Result<String> {
        let clause = match op {
            "$eq" if operand.is_null() => format!("{} IS NULL", column),
            "$ne" if operand.is_null() => format!("{} IS NOT NULL", column),
            "$eq" => self.compare(column, "=", operand)?,
            "$ne" => format!(
                "({} OR {} IS NULL)",
                self.compare(column, "<>", operand)?,
                column
            ),
            "$gt" => self.compare(column, ">", operand)?,
            "$gte" => self.compare(column, ">=", operand)?,
            "$lt" => self.compare(column, "<", operand)?,
            "$lte" => self.compare(column, "<=", operand)?,
            "$in" => self.list(column, "IN", operand)?.unwrap_or_else(|| "1 = 0".to_owned()),
            "$notIn" => self
                .list(column, "NOT IN", operand)?
                .unwrap_or_else(|| "1 = 1".to_owned()),
            "$includes" => self.like(column, "LIKE", operand)?,
            "$notIncludes" => self.like(column, "NOT LIKE", operand)?,
            "$empty" => format!("({} IS NULL OR {} = '')", column, column),
            "$notEmpty" => format!("({} IS NOT NULL AND {} <> '')", column, column),
            other => bail!("unsupported filter operator {}", other),
        };
        Ok(clause)
    }

    fn compare(&mut self, column: &str, sign: &str, operand: &Value) -> Result<String> {
        self.params.push(scalar(operand)?);
        Ok(format!("{} {} ?", column, sign))
    }

    fn list(&mut self, column: &str, keyword: &str, operand: &Value) -> Result<Option<String>> {
        let items = match operand {
            Value::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        if items.is_empty() {
            return Ok(None);
        }
        for item in items {
            self.params.push(scalar(item)?);
        }
        let placeholders = vec!["?"; items.len()].join(", ");
        Ok(Some(format!("{} {} ({})", column, keyword, placeholders)))
    }

    fn like(&mut self, column: &str, keyword: &str, operand: &Value) -> Result<String> {
        let text = match scalar(operand)? {
            Param::Text(text) => text,
            Param::Int(i) => i.to_string(),
            Param::Float(f) => f.to_string(),
            Param::Bool(b) => b.to_string(),
        };
        let escaped = text
            .replace('!', "!!")
            .replace('%', "!%")
            .replace('_', "!_");
        self.params.push(Param::Text(format!("%{}%", escaped)));
        Ok(format!("{} {} ? ESCAPE '!'", column, keyword))
    }
}

fn scalar(value: &Value) -> Result<Param> {
    Ok(match value {
        Value::Bool(b) => Param::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Param::Int(i),
            None => Param::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Param::Text(s.clone()),
        other => bail!("unsupported filter value {}", other),
    })
}

fn join(mut parts: Vec<String>, joiner: &str) -> Option<String> {
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("({})", parts.join(&format!(" {} ", joiner)))),
    }
}
