//! Значения целевого скрипта и операции над ними.
//!
//! Семантика повторяет Python для используемого подмножества: истинное
//! деление, деление с округлением вниз, остаток со знаком делителя,
//! `True`/`False` при печати. Целые - 64-битные, переполнение является
//! ошибкой выполнения.

use std::cmp::Ordering;
use std::fmt;

/// Значение во время выполнения.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// Результат `range(...)`: ленивая арифметическая прогрессия.
    Range {
        start: i64,
        stop: i64,
        step: i64,
    },
    None,
}

/// Категория ошибки выполнения (имя исключения Python).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    TypeError,
    ValueError,
    ZeroDivisionError,
    OverflowError,
    NameError,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::TypeError => "TypeError",
            FaultKind::ValueError => "ValueError",
            FaultKind::ZeroDivisionError => "ZeroDivisionError",
            FaultKind::OverflowError => "OverflowError",
            FaultKind::NameError => "NameError",
        };
        f.write_str(name)
    }
}

/// Ошибка операции без привязки к строке.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn overflow() -> Self {
        Fault::new(FaultKind::OverflowError, "integer overflow")
    }
}

pub type OpResult = Result<Value, Fault>;

/// Числовое представление операнда (`bool` ведёт себя как `int`).
#[derive(Debug, Clone, Copy)]
enum Num {
    I(i64),
    F(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::I(n) => n as f64,
            Num::F(x) => x,
        }
    }
}

impl Value {
    /// Имя типа, как его печатает Python.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bool(_) => "bool",
            Value::Range { .. } => "range",
            Value::None => "NoneType",
        }
    }

    /// Истинность значения.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Range { .. } => self.range_len() > 0,
            Value::None => false,
        }
    }

    /// Число элементов диапазона; для прочих значений 0.
    pub fn range_len(&self) -> i128 {
        let Value::Range { start, stop, step } = *self else {
            return 0;
        };
        let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
        if step > 0 && start < stop {
            (stop - start - 1) / step + 1
        } else if step < 0 && start > stop {
            (start - stop - 1) / -step + 1
        } else {
            0
        }
    }

    fn num(&self) -> Option<Num> {
        match self {
            Value::Int(n) => Some(Num::I(*n)),
            Value::Bool(b) => Some(Num::I(i64::from(*b))),
            Value::Float(x) => Some(Num::F(*x)),
            Value::Str(_) | Value::Range { .. } | Value::None => None,
        }
    }

    fn operands(&self, other: &Value, symbol: &str) -> Result<(Num, Num), Fault> {
        match (self.num(), other.num()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(Fault::new(
                FaultKind::TypeError,
                format!(
                    "unsupported operand type(s) for {}: '{}' and '{}'",
                    symbol,
                    self.type_name(),
                    other.type_name()
                ),
            )),
        }
    }

    pub fn add(&self, other: &Value) -> OpResult {
        if let (Value::Str(a), Value::Str(b)) = (self, other) {
            return Ok(Value::Str(format!("{}{}", a, b)));
        }
        match self.operands(other, "+")? {
            (Num::I(a), Num::I(b)) => a.checked_add(b).map(Value::Int).ok_or_else(Fault::overflow),
            (a, b) => Ok(Value::Float(a.as_f64() + b.as_f64())),
        }
    }

    pub fn sub(&self, other: &Value) -> OpResult {
        match self.operands(other, "-")? {
            (Num::I(a), Num::I(b)) => a.checked_sub(b).map(Value::Int).ok_or_else(Fault::overflow),
            (a, b) => Ok(Value::Float(a.as_f64() - b.as_f64())),
        }
    }

    pub fn mul(&self, other: &Value) -> OpResult {
        match self.operands(other, "*")? {
            (Num::I(a), Num::I(b)) => a.checked_mul(b).map(Value::Int).ok_or_else(Fault::overflow),
            (a, b) => Ok(Value::Float(a.as_f64() * b.as_f64())),
        }
    }

    /// Истинное деление: результат всегда `float`.
    pub fn div(&self, other: &Value) -> OpResult {
        let (a, b) = self.operands(other, "/")?;
        let divisor = b.as_f64();
        if divisor == 0.0 {
            return Err(Fault::new(FaultKind::ZeroDivisionError, "division by zero"));
        }
        Ok(Value::Float(a.as_f64() / divisor))
    }

    /// Деление с округлением к минус бесконечности.
    pub fn floor_div(&self, other: &Value) -> OpResult {
        match self.operands(other, "//")? {
            (Num::I(_), Num::I(0)) => Err(Fault::new(
                FaultKind::ZeroDivisionError,
                "integer division or modulo by zero",
            )),
            (Num::I(a), Num::I(b)) => {
                let q = a.checked_div(b).ok_or_else(Fault::overflow)?;
                let adjust = a % b != 0 && ((a < 0) != (b < 0));
                Ok(Value::Int(if adjust { q - 1 } else { q }))
            }
            (a, b) => {
                let divisor = b.as_f64();
                if divisor == 0.0 {
                    return Err(Fault::new(
                        FaultKind::ZeroDivisionError,
                        "float floor division by zero",
                    ));
                }
                Ok(Value::Float((a.as_f64() / divisor).floor()))
            }
        }
    }

    /// Остаток со знаком делителя.
    pub fn rem(&self, other: &Value) -> OpResult {
        match self.operands(other, "%")? {
            (Num::I(_), Num::I(0)) => Err(Fault::new(
                FaultKind::ZeroDivisionError,
                "integer modulo by zero",
            )),
            (Num::I(a), Num::I(b)) => {
                // i64::MIN % -1 переполняется в Rust, в Python это 0
                let r = a.checked_rem(b).unwrap_or(0);
                let adjust = r != 0 && ((r < 0) != (b < 0));
                Ok(Value::Int(if adjust { r + b } else { r }))
            }
            (a, b) => {
                let divisor = b.as_f64();
                if divisor == 0.0 {
                    return Err(Fault::new(FaultKind::ZeroDivisionError, "float modulo"));
                }
                let r = a.as_f64() % divisor;
                let adjust = r != 0.0 && ((r < 0.0) != (divisor < 0.0));
                Ok(Value::Float(if adjust { r + divisor } else { r }))
            }
        }
    }

    pub fn neg(&self) -> OpResult {
        match self.num() {
            Some(Num::I(n)) => n.checked_neg().map(Value::Int).ok_or_else(Fault::overflow),
            Some(Num::F(x)) => Ok(Value::Float(-x)),
            None => Err(Fault::new(
                FaultKind::TypeError,
                format!("bad operand type for unary -: '{}'", self.type_name()),
            )),
        }
    }

    pub fn pos(&self) -> OpResult {
        match self.num() {
            Some(Num::I(n)) => Ok(Value::Int(n)),
            Some(Num::F(x)) => Ok(Value::Float(x)),
            None => Err(Fault::new(
                FaultKind::TypeError,
                format!("bad operand type for unary +: '{}'", self.type_name()),
            )),
        }
    }

    /// Равенство по правилам Python: разные типы просто не равны.
    pub fn py_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::None, Value::None) => true,
            (
                Value::Range {
                    start: a, step: sa, ..
                },
                Value::Range {
                    start: b, step: sb, ..
                },
            ) => {
                // Диапазоны равны как последовательности
                let len = self.range_len();
                len == other.range_len() && (len == 0 || (a == b && (len == 1 || sa == sb)))
            }
            _ => match (self.num(), other.num()) {
                (Some(Num::I(a)), Some(Num::I(b))) => a == b,
                (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                _ => false,
            },
        }
    }

    /// Упорядочивание; `None` в результате - несравнимые `NaN`.
    pub fn py_cmp(&self, other: &Value, symbol: &str) -> Result<Option<Ordering>, Fault> {
        if let (Value::Str(a), Value::Str(b)) = (self, other) {
            return Ok(Some(a.cmp(b)));
        }
        match (self.num(), other.num()) {
            (Some(Num::I(a)), Some(Num::I(b))) => Ok(Some(a.cmp(&b))),
            (Some(a), Some(b)) => Ok(a.as_f64().partial_cmp(&b.as_f64())),
            _ => Err(Fault::new(
                FaultKind::TypeError,
                format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    symbol,
                    self.type_name(),
                    other.type_name()
                ),
            )),
        }
    }
}

/// Печатное представление (`str()` в Python).
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(s),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Range {
                start,
                stop,
                step: 1,
            } => write!(f, "range({}, {})", start, stop),
            Value::Range { start, stop, step } => write!(f, "range({}, {}, {})", start, stop, step),
            Value::None => f.write_str("None"),
        }
    }
}

/// Форматирование `float` как `repr()` в Python.
///
/// Кратчайшая запись, однозначно восстанавливающая число; экспоненциальная
/// форма при показателе меньше -4 или не меньше 16.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", x);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..16).contains(&exponent) {
        let plain = x.to_string();
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float_like_python() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-0.0), "-0.0");
        assert_eq!(format_float(3.14), "3.14");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(123456789012345.6), "123456789012345.6");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(10.0 / 3.0), "3.3333333333333335");
    }

    #[test]
    fn test_true_division_and_floor_modulo() {
        assert_eq!(Value::Int(7).div(&Value::Int(2)), Ok(Value::Float(3.5)));
        assert_eq!(Value::Int(-7).rem(&Value::Int(3)), Ok(Value::Int(2)));
        assert_eq!(Value::Int(7).rem(&Value::Int(-3)), Ok(Value::Int(-2)));
        assert_eq!(Value::Int(-7).floor_div(&Value::Int(2)), Ok(Value::Int(-4)));
        assert_eq!(Value::Float(-7.5).rem(&Value::Int(2)), Ok(Value::Float(0.5)));
        assert_eq!(Value::Int(i64::MIN).rem(&Value::Int(-1)), Ok(Value::Int(0)));
    }

    #[test]
    fn test_division_by_zero() {
        let err = Value::Int(5).div(&Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, FaultKind::ZeroDivisionError);
        assert_eq!(err.message, "division by zero");
        assert!(Value::Int(5).rem(&Value::Int(0)).is_err());
    }

    #[test]
    fn test_integer_overflow_is_fault() {
        let err = Value::Int(i64::MAX).add(&Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, FaultKind::OverflowError);
        assert!(Value::Int(i64::MIN).neg().is_err());
    }

    #[test]
    fn test_mixed_arithmetic_widens() {
        assert_eq!(Value::Int(1).add(&Value::Float(0.5)), Ok(Value::Float(1.5)));
        assert_eq!(Value::Bool(true).add(&Value::Int(1)), Ok(Value::Int(2)));
        assert_eq!(
            Value::Str("a".into()).add(&Value::Str("b".into())),
            Ok(Value::Str("ab".into()))
        );
        assert!(Value::Str("a".into()).add(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)));
        assert!(!Value::Int(1).py_eq(&Value::Str("1".into())));
        assert_eq!(
            Value::Str("a".into()).py_cmp(&Value::Str("b".into()), "<"),
            Ok(Some(Ordering::Less))
        );
        assert!(Value::Int(1).py_cmp(&Value::Str("b".into()), "<").is_err());
    }

    #[test]
    fn test_range_length_and_equality() {
        let range = |start, stop, step| Value::Range { start, stop, step };
        assert_eq!(range(0, 10, 3).range_len(), 4);
        assert_eq!(range(5, 0, -2).range_len(), 3);
        assert_eq!(range(3, 3, 1).range_len(), 0);
        assert!(!range(3, 3, 1).truthy());
        assert!(range(0, 5, 2).py_eq(&range(0, 6, 2)));
        assert!(range(0, 0, 1).py_eq(&range(4, 1, 1)));
        assert!(!range(0, 5, 1).py_eq(&range(0, 5, 2)));
        assert!(!range(0, 1, 1).py_eq(&Value::Int(0)));
        assert_eq!(range(i64::MIN, i64::MAX, 1).range_len(), u64::MAX as i128);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Float(5.0).to_string(), "5.0");
        assert_eq!(Value::None.to_string(), "None");
        let range = Value::Range {
            start: 0,
            stop: 3,
            step: 1,
        };
        assert_eq!(range.to_string(), "range(0, 3)");
        let range = Value::Range {
            start: 10,
            stop: 0,
            step: -2,
        };
        assert_eq!(range.to_string(), "range(10, 0, -2)");
    }
}
