//! Встроенные функции, доступные скрипту.

use std::io::Write;

use super::value::{Fault, FaultKind, OpResult, Value};

/// Единственные имена, которые скрипт может вызывать.
pub const WHITELIST: &[&str] = &["print", "int", "float", "str", "bool", "range"];

/// Вызвать встроенную функцию. `print` пишет в `out`.
pub fn call(name: &str, args: Vec<Value>, out: &mut dyn Write) -> OpResult {
    match name {
        "print" => print(&args, out),
        "int" => convert(name, args, to_int, Value::Int(0)),
        "float" => convert(name, args, to_float, Value::Float(0.0)),
        "str" => convert(name, args, |v| Ok(Value::Str(v.to_string())), Value::Str(String::new())),
        "bool" => convert(name, args, |v| Ok(Value::Bool(v.truthy())), Value::Bool(false)),
        "range" => range(&args),
        other => Err(Fault::new(
            FaultKind::NameError,
            format!("name '{}' is not defined", other),
        )),
    }
}

fn print(args: &[Value], out: &mut dyn Write) -> OpResult {
    let line = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(out, "{}", line)
        .map_err(|e| Fault::new(FaultKind::ValueError, format!("output error: {}", e)))?;
    Ok(Value::None)
}

/// `range(stop)`, `range(start, stop)`, `range(start, stop, step)`.
fn range(args: &[Value]) -> OpResult {
    let ints = args.iter().map(range_arg).collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        [] => {
            return Err(Fault::new(
                FaultKind::TypeError,
                "range expected at least 1 argument, got 0",
            ))
        }
        _ => {
            return Err(Fault::new(
                FaultKind::TypeError,
                format!("range expected at most 3 arguments, got {}", args.len()),
            ))
        }
    };
    if step == 0 {
        return Err(Fault::new(
            FaultKind::ValueError,
            "range() arg 3 must not be zero",
        ));
    }
    Ok(Value::Range { start, stop, step })
}

fn range_arg(value: &Value) -> Result<i64, Fault> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(Fault::new(
            FaultKind::TypeError,
            format!(
                "'{}' object cannot be interpreted as an integer",
                other.type_name()
            ),
        )),
    }
}

/// Функция-конвертер с нулём или одним аргументом.
fn convert(
    name: &str,
    args: Vec<Value>,
    f: impl Fn(&Value) -> OpResult,
    default: Value,
) -> OpResult {
    match args.as_slice() {
        [] => Ok(default),
        [value] => f(value),
        _ => Err(Fault::new(
            FaultKind::TypeError,
            format!("{}() takes at most 1 argument ({} given)", name, args.len()),
        )),
    }
}

fn to_int(value: &Value) -> OpResult {
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(x) => {
            if x.is_nan() {
                return Err(Fault::new(
                    FaultKind::ValueError,
                    "cannot convert float NaN to integer",
                ));
            }
            if x.is_infinite() {
                return Err(Fault::new(
                    FaultKind::OverflowError,
                    "cannot convert float infinity to integer",
                ));
            }
            let truncated = x.trunc();
            if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(Fault::new(FaultKind::OverflowError, "integer overflow"));
            }
            Ok(Value::Int(truncated as i64))
        }
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                Fault::new(
                    FaultKind::ValueError,
                    format!("invalid literal for int() with base 10: '{}'", s),
                )
            }),
        Value::Range { .. } | Value::None => Err(Fault::new(
            FaultKind::TypeError,
            format!(
                "int() argument must be a string or a number, not '{}'",
                value.type_name()
            ),
        )),
    }
}

fn to_float(value: &Value) -> OpResult {
    match value {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Float(x) => Ok(Value::Float(*x)),
        Value::Str(s) => {
            let text = s.trim();
            let lower = text.to_ascii_lowercase();
            let special = match lower.trim_start_matches(['+', '-']) {
                "inf" | "infinity" => Some(f64::INFINITY),
                "nan" => Some(f64::NAN),
                _ => None,
            };
            if let Some(x) = special {
                let x = if lower.starts_with('-') { -x } else { x };
                return Ok(Value::Float(x));
            }
            text.parse::<f64>().map(Value::Float).map_err(|_| {
                Fault::new(
                    FaultKind::ValueError,
                    format!("could not convert string to float: '{}'", s),
                )
            })
        }
        Value::Range { .. } | Value::None => Err(Fault::new(
            FaultKind::TypeError,
            format!(
                "float() argument must be a string or a real number, not '{}'",
                value.type_name()
            ),
        )),
    }
}
