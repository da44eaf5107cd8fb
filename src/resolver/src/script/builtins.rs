use std::collections::BTreeMap;

use tracing::{debug, error, info, warn};

use super::{
    interp::{Interpreter, CELL},
    value::{format_number, Value},
};
use crate::error::{runtime, ScriptError, ScriptResult};

/// Host functions visible to scripts. Nothing here touches the filesystem,
/// the network, the clock or the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    ConsoleLog,
    ConsoleInfo,
    ConsoleWarn,
    ConsoleError,
    JsonStringify,
    JsonParse,
    ObjectKeys,
    ObjectValues,
    ObjectEntries,
    ObjectAssign,
    ArrayIsArray,
    MathRound,
    MathFloor,
    MathCeil,
    MathAbs,
    MathMax,
    MathMin,
    String,
    Number,
    Boolean,
    ParseInt,
    ParseFloat,
}

impl Interpreter<'_> {
    pub(super) fn install_globals(&mut self) {
        let namespaces: [(&str, Vec<(&str, Value)>); 5] = [
            (
                "console",
                vec![
                    ("log", Value::Builtin(Builtin::ConsoleLog)),
                    ("debug", Value::Builtin(Builtin::ConsoleLog)),
                    ("info", Value::Builtin(Builtin::ConsoleInfo)),
                    ("warn", Value::Builtin(Builtin::ConsoleWarn)),
                    ("error", Value::Builtin(Builtin::ConsoleError)),
                ],
            ),
            (
                "JSON",
                vec![
                    ("stringify", Value::Builtin(Builtin::JsonStringify)),
                    ("parse", Value::Builtin(Builtin::JsonParse)),
                ],
            ),
            (
                "Object",
                vec![
                    ("keys", Value::Builtin(Builtin::ObjectKeys)),
                    ("values", Value::Builtin(Builtin::ObjectValues)),
                    ("entries", Value::Builtin(Builtin::ObjectEntries)),
                    ("assign", Value::Builtin(Builtin::ObjectAssign)),
                ],
            ),
            ("Array", vec![("isArray", Value::Builtin(Builtin::ArrayIsArray))]),
            (
                "Math",
                vec![
                    ("round", Value::Builtin(Builtin::MathRound)),
                    ("floor", Value::Builtin(Builtin::MathFloor)),
                    ("ceil", Value::Builtin(Builtin::MathCeil)),
                    ("abs", Value::Builtin(Builtin::MathAbs)),
                    ("max", Value::Builtin(Builtin::MathMax)),
                    ("min", Value::Builtin(Builtin::MathMin)),
                    ("PI", Value::Number(std::f64::consts::PI)),
                ],
            ),
        ];
        for (name, members) in namespaces {
            let entries = members
                .into_iter()
                .map(|(key, value)| (key.to_owned(), value))
                .collect();
            let object = self.heap.alloc_object(entries);
            self.define_global(name, object);
        }

        for (name, builtin) in [
            ("String", Builtin::String),
            ("Number", Builtin::Number),
            ("Boolean", Builtin::Boolean),
            ("parseInt", Builtin::ParseInt),
            ("parseFloat", Builtin::ParseFloat),
        ] {
            self.define_global(name, Value::Builtin(builtin));
        }
        self.define_global("undefined", Value::Undefined);
        self.define_global("NaN", Value::Number(f64::NAN));
        self.define_global("Infinity", Value::Number(f64::INFINITY));
    }

    pub(super) fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
        let value = match builtin {
            Builtin::ConsoleLog => {
                debug!(target: "label_script", "{}", self.console_line(&args));
                Value::Undefined
            }
            Builtin::ConsoleInfo => {
                info!(target: "label_script", "{}", self.console_line(&args));
                Value::Undefined
            }
            Builtin::ConsoleWarn => {
                warn!(target: "label_script", "{}", self.console_line(&args));
                Value::Undefined
            }
            Builtin::ConsoleError => {
                error!(target: "label_script", "{}", self.console_line(&args));
                Value::Undefined
            }
            Builtin::JsonStringify => {
                let value = arg(0);
                if matches!(value, Value::Undefined | Value::Function(_) | Value::Builtin(_)) {
                    return Ok(Value::Undefined);
                }
                let json = self.to_json(&value)?;
                let pretty = self.to_number(&arg(2)) > 0.0
                    || matches!(arg(2), Value::String(ref s) if !s.is_empty());
                let s = if pretty {
                    serde_json::to_string_pretty(&json)
                } else {
                    serde_json::to_string(&json)
                }
                .map_err(|e| ScriptError::Runtime(e.to_string()))?;
                self.new_string(s)?
            }
            Builtin::JsonParse => {
                let text = self.to_display(&arg(0));
                let json: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| ScriptError::Runtime(format!("JSON.parse: {}", e)))?;
                self.from_json(&json)?
            }
            Builtin::ObjectKeys => {
                let keys = self
                    .own_entries(&arg(0))?
                    .into_keys()
                    .map(|key| Value::String(key.into()))
                    .collect();
                self.new_array(keys)?
            }
            Builtin::ObjectValues => {
                let values = self.own_entries(&arg(0))?.into_values().collect();
                self.new_array(values)?
            }
            Builtin::ObjectEntries => {
                let mut pairs = Vec::new();
                for (key, value) in self.own_entries(&arg(0))? {
                    pairs.push(self.new_array(vec![Value::String(key.into()), value])?);
                }
                self.new_array(pairs)?
            }
            Builtin::ObjectAssign => {
                let target = arg(0);
                let Value::Object(id) = target else {
                    return runtime("Object.assign target must be an object");
                };
                for source in args.iter().skip(1) {
                    let entries = self.own_entries(source)?;
                    self.check_len(self.heap.object(id).len() + entries.len())?;
                    self.heap.object_mut(id).extend(entries);
                }
                target
            }
            Builtin::ArrayIsArray => Value::Bool(matches!(arg(0), Value::Array(_))),
            Builtin::MathRound => Value::Number((self.to_number(&arg(0)) + 0.5).floor()),
            Builtin::MathFloor => Value::Number(self.to_number(&arg(0)).floor()),
            Builtin::MathCeil => Value::Number(self.to_number(&arg(0)).ceil()),
            Builtin::MathAbs => Value::Number(self.to_number(&arg(0)).abs()),
            Builtin::MathMax => {
                Value::Number(self.fold_numbers(&args, f64::NEG_INFINITY, f64::max))
            }
            Builtin::MathMin => Value::Number(self.fold_numbers(&args, f64::INFINITY, f64::min)),
            Builtin::String => match args.first() {
                Some(value) => {
                    let s = self.display(value)?;
                    self.new_string(s)?
                }
                None => Value::String("".into()),
            },
            Builtin::Number => match args.first() {
                Some(value) => Value::Number(self.to_number(value)),
                None => Value::Number(0.0),
            },
            Builtin::Boolean => Value::Bool(arg(0).truthy()),
            Builtin::ParseInt => {
                let radix = match arg(1) {
                    Value::Undefined => None,
                    radix => Some(self.to_number(&radix) as u32),
                };
                Value::Number(parse_int(&self.to_display(&arg(0)), radix))
            }
            Builtin::ParseFloat => Value::Number(parse_float(&self.to_display(&arg(0)))),
        };
        Ok(value)
    }

    /// Methods on strings, arrays and numbers. `None` when `name` is not a
    /// known method of the receiver.
    pub(super) fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> ScriptResult<Option<Value>> {
        match receiver {
            Value::String(s) => self.string_method(s, name, args),
            Value::Array(_) => self.array_method(receiver, name, args),
            Value::Number(n) => Ok(match name {
                "toFixed" => {
                    let digits = args.first().map(|d| self.to_number(d)).unwrap_or(0.0);
                    let digits = if digits.is_nan() {
                        0
                    } else {
                        digits.clamp(0.0, 100.0) as usize
                    };
                    Some(Value::String(format!("{:.*}", digits, n).into()))
                }
                "toString" => Some(Value::String(format_number(*n).into())),
                _ => None,
            }),
            _ => Ok(None),
        }
    }

    fn string_method(
        &mut self,
        s: &str,
        name: &str,
        args: &[Value],
    ) -> ScriptResult<Option<Value>> {
        let text_arg = |i: usize| args.get(i).map(|v| self.to_display(v)).unwrap_or_default();
        let value = match name {
            "includes" => Value::Bool(s.contains(&text_arg(0))),
            "startsWith" => Value::Bool(s.starts_with(&text_arg(0))),
            "endsWith" => Value::Bool(s.ends_with(&text_arg(0))),
            "indexOf" => {
                let needle = text_arg(0);
                Value::Number(match s.find(&needle) {
                    Some(byte) => s[..byte].chars().count() as f64,
                    None => -1.0,
                })
            }
            "toUpperCase" => self.new_string(s.to_uppercase())?,
            "toLowerCase" => self.new_string(s.to_lowercase())?,
            "trim" => self.new_string(s.trim().to_owned())?,
            "toString" => self.new_string(s.to_owned())?,
            "replace" => {
                let (from, to) = (text_arg(0), text_arg(1));
                self.new_string(s.replacen(&from, &to, 1))?
            }
            "slice" => {
                let chars: Vec<char> = s.chars().collect();
                let (start, end) = self.slice_bounds(chars.len(), args);
                self.new_string(chars[start..end].iter().collect())?
            }
            "split" => {
                let parts: Vec<Value> = match args.first() {
                    None | Some(Value::Undefined) => vec![Value::String(s.into())],
                    Some(separator) => {
                        let separator = self.to_display(separator);
                        if separator.is_empty() {
                            s.chars().map(|c| Value::String(c.to_string().into())).collect()
                        } else {
                            s.split(separator.as_str())
                                .map(|part| Value::String(part.into()))
                                .collect()
                        }
                    }
                };
                self.charge(s.len())?;
                self.new_array(parts)?
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn array_method(
        &mut self,
        array: &Value,
        name: &str,
        args: &[Value],
    ) -> ScriptResult<Option<Value>> {
        let Value::Array(id) = *array else {
            return Ok(None);
        };
        let value = match name {
            "push" => {
                let len = self.heap.array(id).len() + args.len();
                self.check_len(len)?;
                self.charge(CELL * args.len())?;
                self.heap.array_mut(id).extend(args.iter().cloned());
                Value::Number(len as f64)
            }
            "join" => {
                let separator = match args.first() {
                    None | Some(Value::Undefined) => ",".to_owned(),
                    Some(separator) => self.to_display(separator),
                };
                let joined = self.join(id, &separator)?;
                self.new_string(joined)?
            }
            "includes" => {
                let needle = args.first().cloned().unwrap_or(Value::Undefined);
                Value::Bool(self.heap.array(id).iter().any(|item| same_value_zero(item, &needle)))
            }
            "indexOf" => {
                let needle = args.first().cloned().unwrap_or(Value::Undefined);
                let position = self.heap.array(id).iter().position(|item| item.strict_eq(&needle));
                Value::Number(position.map(|p| p as f64).unwrap_or(-1.0))
            }
            "slice" => {
                let items = self.heap.array(id);
                let (start, end) = self.slice_bounds(items.len(), args);
                let items = items[start..end].to_vec();
                self.new_array(items)?
            }
            "concat" => {
                let len = args.iter().fold(self.heap.array(id).len(), |len, arg| match arg {
                    Value::Array(other) => len + self.heap.array(*other).len(),
                    _ => len + 1,
                });
                self.check_len(len)?;
                let mut items = self.heap.array(id).clone();
                for arg in args {
                    match arg {
                        Value::Array(other) => {
                            items.extend(self.heap.array(*other).iter().cloned())
                        }
                        other => items.push(other.clone()),
                    }
                }
                self.new_array(items)?
            }
            "map" | "filter" | "forEach" | "some" | "every" | "find" | "findIndex" => {
                let callback = args.first().cloned().unwrap_or(Value::Undefined);
                let items = self.iterate(array)?;
                return self.iterate_with(items, name, &callback).map(Some);
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn iterate_with(
        &mut self,
        items: Vec<Value>,
        name: &str,
        callback: &Value,
    ) -> ScriptResult<Value> {
        let label = format!("{} callback", name);
        let mut collected = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            self.tick()?;
            let result = self.call(callback, vec![item.clone(), Value::Number(i as f64)], &label)?;
            match name {
                "map" => collected.push(result),
                "filter" if result.truthy() => collected.push(item),
                "some" if result.truthy() => return Ok(Value::Bool(true)),
                "every" if !result.truthy() => return Ok(Value::Bool(false)),
                "find" if result.truthy() => return Ok(item),
                "findIndex" if result.truthy() => return Ok(Value::Number(i as f64)),
                _ => {}
            }
        }
        Ok(match name {
            "map" | "filter" => self.new_array(collected)?,
            "some" => Value::Bool(false),
            "every" => Value::Bool(true),
            "findIndex" => Value::Number(-1.0),
            _ => Value::Undefined,
        })
    }

    fn slice_bounds(&self, len: usize, args: &[Value]) -> (usize, usize) {
        let bound = |value: Option<&Value>, default: usize| match value {
            None | Some(Value::Undefined) => default,
            Some(value) => relative_index(self.to_number(value), len),
        };
        let start = bound(args.first(), 0);
        let end = bound(args.get(1), len);
        (start.min(end), end)
    }

    fn own_entries(&mut self, value: &Value) -> ScriptResult<BTreeMap<String, Value>> {
        let entries: BTreeMap<String, Value> = match value {
            Value::Object(id) => self.heap.object(*id).clone(),
            Value::Array(id) => self
                .heap
                .array(*id)
                .iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), item.clone()))
                .collect(),
            Value::String(s) => s
                .chars()
                .enumerate()
                .map(|(i, c)| (i.to_string(), Value::String(c.to_string().into())))
                .collect(),
            _ => BTreeMap::new(),
        };
        self.charge(CELL * entries.len())?;
        Ok(entries)
    }

    fn fold_numbers(&self, args: &[Value], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
        let mut acc = init;
        for arg in args {
            let n = self.to_number(arg);
            if n.is_nan() {
                return f64::NAN;
            }
            acc = pick(acc, n);
        }
        acc
    }

    fn console_line(&self, args: &[Value]) -> String {
        args.iter()
            .map(|arg| match arg {
                Value::Array(_) | Value::Object(_) => self
                    .to_json(arg)
                    .map(|json| json.to_string())
                    .unwrap_or_else(|_| self.to_display(arg)),
                other => self.to_display(other),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_eq(b),
    }
}

fn relative_index(value: f64, len: usize) -> usize {
    let len = len as f64;
    let index = if value.is_nan() {
        0.0
    } else if value < 0.0 {
        (len + value.trunc()).max(0.0)
    } else {
        value.trunc().min(len)
    };
    index as usize
}

fn parse_int(s: &str, radix: Option<u32>) -> f64 {
    let s = s.trim_start();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let radix = match radix {
        Some(0) => None,
        radix => radix,
    };
    let has_hex_prefix = s.starts_with("0x") || s.starts_with("0X");
    let (radix, digits) = match radix {
        Some(16) | None if has_hex_prefix => (16, &s[2..]),
        None => (10, s),
        Some(radix) if (2..=36).contains(&radix) => (radix, s),
        Some(_) => return f64::NAN,
    };

    let mut value = 0.0;
    let mut seen = false;
    for c in digits.chars() {
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        value = value * radix as f64 + digit as f64;
        seen = true;
    }
    match (seen, negative) {
        (false, _) => f64::NAN,
        (true, true) => -value,
        (true, false) => value,
    }
}

fn parse_float(s: &str) -> f64 {
    let s = s.trim_start();
    let body = s.strip_prefix(['-', '+']).unwrap_or(s);
    if body.starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let bytes = s.as_bytes();
    let mut end = s.len() - body.len();
    let digits_from = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if !s[digits_from..end].bytes().any(|b| b.is_ascii_digit()) {
        return f64::NAN;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        let exp_digits = exp;
        while exp < bytes.len() && bytes[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > exp_digits {
            end = exp;
        }
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_prefixes() {
        assert_eq!(parse_int("  42px", None), 42.0);
        assert_eq!(parse_int("-0x1f", None), -31.0);
        assert_eq!(parse_int("101", Some(2)), 5.0);
        assert_eq!(parse_int("ff", Some(16)), 255.0);
        assert!(parse_int("px", None).is_nan());
        assert!(parse_int("1", Some(40)).is_nan());
    }

    #[test]
    fn parse_float_prefixes() {
        assert_eq!(parse_float("3.25abc"), 3.25);
        assert_eq!(parse_float("-.5"), -0.5);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("2e"), 2.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float(".").is_nan());
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn relative_indices() {
        assert_eq!(relative_index(-1.0, 5), 4);
        assert_eq!(relative_index(-10.0, 5), 0);
        assert_eq!(relative_index(10.0, 5), 5);
        assert_eq!(relative_index(f64::NAN, 5), 0);
    }
}
