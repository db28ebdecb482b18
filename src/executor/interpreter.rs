//! Интерпретатор разобранного скрипта.
//!
//! Пространство имён плоское и содержит только переменные скрипта; вызовы
//! уходят в [`builtins`](super::builtins). Флаг отмены проверяется на каждой
//! итерации цикла.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use super::builtins;
use super::parser::{BinOp, CmpOp, Script, ScriptExpr, ScriptStmt, UnOp};
use super::value::{Fault, FaultKind, Value};
use super::ScriptError;

// 64KB red zone, 1MB stack growth
const RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

/// Результат выполнения блока.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
}

/// Интерпретатор скрипта с выводом в `W`.
pub struct Interpreter<W: Write> {
    globals: HashMap<String, Value>,
    out: W,
    cancel: Arc<AtomicBool>,
}

impl<W: Write> Interpreter<W> {
    pub fn new(out: W, cancel: Arc<AtomicBool>) -> Self {
        Self {
            globals: HashMap::new(),
            out,
            cancel,
        }
    }

    /// Выполнить скрипт целиком.
    pub fn run(&mut self, script: &Script) -> Result<(), ScriptError> {
        self.exec_block(&script.body)?;
        self.out
            .flush()
            .map_err(|e| ScriptError::runtime(0, Fault::new(FaultKind::ValueError, e.to_string())))
    }

    /// Значение глобальной переменной.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn exec_block(&mut self, body: &[ScriptStmt]) -> Result<Flow, ScriptError> {
        for stmt in body {
            if self.exec_stmt(stmt)? == Flow::Break {
                return Ok(Flow::Break);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &ScriptStmt) -> Result<Flow, ScriptError> {
        match stmt {
            ScriptStmt::Assign {
                target,
                value,
                line,
            } => {
                let value = self.eval(value, *line)?;
                self.globals.insert(target.clone(), value);
                Ok(Flow::Normal)
            }
            ScriptStmt::If {
                cond,
                body,
                orelse,
                line,
            } => {
                if self.eval(cond, *line)?.truthy() {
                    self.exec_block(body)
                } else {
                    self.exec_block(orelse)
                }
            }
            ScriptStmt::While { cond, body, line } => {
                loop {
                    if self.cancel.load(AtomicOrdering::Relaxed) {
                        return Err(ScriptError::Cancelled);
                    }
                    if !self.eval(cond, *line)?.truthy() {
                        break;
                    }
                    if self.exec_block(body)? == Flow::Break {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            ScriptStmt::Break { .. } => Ok(Flow::Break),
            ScriptStmt::Pass { .. } => Ok(Flow::Normal),
            ScriptStmt::Expr { expr, line } => {
                self.eval(expr, *line)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn eval(&mut self, expr: &ScriptExpr, line: usize) -> Result<Value, ScriptError> {
        let fault = move |f: Fault| ScriptError::runtime(line, f);
        match expr {
            ScriptExpr::Int(n) => Ok(Value::Int(*n)),
            ScriptExpr::Float(x) => Ok(Value::Float(*x)),
            ScriptExpr::Str(s) => Ok(Value::Str(s.clone())),
            ScriptExpr::Bool(b) => Ok(Value::Bool(*b)),
            ScriptExpr::NoneLit => Ok(Value::None),
            ScriptExpr::Name(name) => self.globals.get(name).cloned().ok_or_else(|| {
                fault(Fault::new(
                    FaultKind::NameError,
                    format!("name '{}' is not defined", name),
                ))
            }),
            ScriptExpr::Unary { op, expr } => {
                let value = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.eval(expr, line))?;
                match op {
                    UnOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnOp::Neg => value.neg().map_err(fault),
                    UnOp::Pos => value.pos().map_err(fault),
                }
            }
            ScriptExpr::Binary { op, left, right } => {
                let (l, r) = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || {
                    Ok::<_, ScriptError>((self.eval(left, line)?, self.eval(right, line)?))
                })?;
                let result = match op {
                    BinOp::Add => l.add(&r),
                    BinOp::Sub => l.sub(&r),
                    BinOp::Mul => l.mul(&r),
                    BinOp::Div => l.div(&r),
                    BinOp::FloorDiv => l.floor_div(&r),
                    BinOp::Mod => l.rem(&r),
                };
                result.map_err(fault)
            }
            ScriptExpr::Compare { first, rest } => {
                let mut left = self.eval(first, line)?;
                for (op, right) in rest {
                    let right = self.eval(right, line)?;
                    if !compare(*op, &left, &right).map_err(fault)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            ScriptExpr::And(left, right) => {
                let l = self.eval(left, line)?;
                if !l.truthy() {
                    return Ok(l);
                }
                self.eval(right, line)
            }
            ScriptExpr::Or(left, right) => {
                let l = self.eval(left, line)?;
                if l.truthy() {
                    return Ok(l);
                }
                self.eval(right, line)
            }
            ScriptExpr::Call { func, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, line))
                    .collect::<Result<Vec<_>, _>>()?;
                builtins::call(func, args, &mut self.out).map_err(fault)
            }
        }
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, Fault> {
    let ordering = match op {
        CmpOp::Eq => return Ok(left.py_eq(right)),
        CmpOp::Ne => return Ok(!left.py_eq(right)),
        _ => left.py_cmp(right, op.symbol())?,
    };
    // NaN ни с чем не сравнимо
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::Le => ordering.is_le(),
        CmpOp::Ge => ordering.is_ge(),
        CmpOp::Eq => ordering.is_eq(),
        CmpOp::Ne => ordering.is_ne(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::parser::parse_script;

    fn run(source: &str) -> Result<String, ScriptError> {
        let script = parse_script(source)?;
        let mut interp = Interpreter::new(Vec::new(), Arc::new(AtomicBool::new(false)));
        interp.run(&script)?;
        Ok(String::from_utf8(interp.into_output()).unwrap())
    }

    #[test]
    fn test_run_for_loop_shape() {
        let source = "v_i = 1\nt0 = 3\nwhile True:\n    t1 = v_i > t0\n    if t1:\n        break\n    print(v_i)\n    v_i = v_i + 1\n";
        assert_eq!(run(source).unwrap(), "1\n2\n3\n");
    }

    #[test]
    fn test_python_semantics() {
        let source = "print(7 / 2, 7 // 2, -7 % 3, 2 * 1.5)\nprint(1 < 2 < 3, True and 0, \"a\" + \"b\")\n";
        assert_eq!(run(source).unwrap(), "3.5 3 2 3.0\nTrue 0 ab\n");
    }

    #[test]
    fn test_if_else() {
        assert_eq!(
            run("x = 5\nif x > 3:\n    print(\"big\")\nelse:\n    print(\"small\")\n").unwrap(),
            "big\n"
        );
    }

    #[test]
    fn test_runtime_error_has_line() {
        let err = run("x = 1\ny = 0\nprint(x / y)\n").unwrap_err();
        match err {
            ScriptError::Runtime { line, kind, .. } => {
                assert_eq!(line, 3);
                assert_eq!(kind, FaultKind::ZeroDivisionError);
            }
            other => panic!("Expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_undefined_name() {
        let err = run("print(y)\n").unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Runtime {
                kind: FaultKind::NameError,
                ..
            }
        ));
    }

    #[test]
    fn test_cancel_flag_stops_loop() {
        let script = parse_script("while True:\n    pass\n").unwrap();
        let mut interp = Interpreter::new(Vec::new(), Arc::new(AtomicBool::new(true)));
        assert!(matches!(interp.run(&script), Err(ScriptError::Cancelled)));
    }

    #[test]
    fn test_globals_visible_after_run() {
        let script = parse_script("v_a = 2\nv_b = v_a * 21\n").unwrap();
        let mut interp = Interpreter::new(Vec::new(), Arc::new(AtomicBool::new(false)));
        interp.run(&script).unwrap();
        assert_eq!(interp.global("v_b"), Some(&Value::Int(42)));
    }
}
