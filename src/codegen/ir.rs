//! Промежуточное представление: трёхадресный код.
//!
//! Последовательность инструкций плоская; вложенность задаётся глубиной
//! каждой инструкции и маркерами блоков (`If`, `Else`, `Loop`, `End`).
//! Текстовая форма (`Display`) используется для `--emit tac`.

use std::fmt;

use crate::ast::{BinaryOp, Literal, UnaryOp};

/// Место, в которое можно записать значение.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Place {
    /// Пользовательская переменная.
    Var(String),
    /// Временная переменная `tN`.
    Temp(usize),
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Var(name) => f.write_str(name),
            Place::Temp(id) => write!(f, "t{}", id),
        }
    }
}

/// Операнд инструкции: место или константа.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Place(Place),
    Const(Literal),
}

impl Operand {
    pub fn var(name: impl Into<String>) -> Self {
        Operand::Place(Place::Var(name.into()))
    }

    pub fn temp(id: usize) -> Self {
        Operand::Place(Place::Temp(id))
    }

    pub fn as_place(&self) -> Option<&Place> {
        match self {
            Operand::Place(place) => Some(place),
            Operand::Const(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Place(place) => write!(f, "{}", place),
            Operand::Const(literal) => write!(f, "{}", literal),
        }
    }
}

/// Правая часть присваивания.
#[derive(Debug, Clone, PartialEq)]
pub enum Rvalue {
    Copy(Operand),
    Binary {
        op: BinaryOp,
        left: Operand,
        right: Operand,
    },
    Unary {
        op: UnaryOp,
        operand: Operand,
    },
}

impl Rvalue {
    /// Операнды, которые читает выражение.
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Rvalue::Copy(operand) => vec![operand],
            Rvalue::Binary { left, right, .. } => vec![left, right],
            Rvalue::Unary { operand, .. } => vec![operand],
        }
    }

    /// Может ли вычисление упасть во время выполнения: деление или остаток
    /// на операнд, который не является ненулевой константой.
    pub fn may_fault(&self) -> bool {
        match self {
            Rvalue::Binary {
                op: BinaryOp::Div | BinaryOp::Mod,
                right,
                ..
            } => {
                let nonzero_constant = match right {
                    Operand::Const(Literal::Entero(n)) => *n != 0,
                    Operand::Const(Literal::Decimal(f)) => *f != 0.0,
                    _ => false,
                };
                !nonzero_constant
            }
            _ => false,
        }
    }
}

impl fmt::Display for Rvalue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rvalue::Copy(operand) => write!(f, "{}", operand),
            Rvalue::Binary { op, left, right } => write!(f, "{} {} {}", left, op, right),
            Rvalue::Unary {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "NOT {}", operand),
            Rvalue::Unary {
                op: UnaryOp::Neg,
                operand,
            } => write!(f, "-{}", operand),
        }
    }
}

/// Операция одной инструкции.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// `dest = value`
    Assign { dest: Place, value: Rvalue },
    /// Начало условного блока.
    If(Operand),
    /// Граница между ветвями.
    Else,
    /// Начало бесконечного цикла; выход только через `Break`.
    Loop,
    Break,
    /// Пустая инструкция для пустых блоков.
    Pass,
    Print(Vec<Operand>),
    /// Конец блока `If`/`Loop`.
    End,
}

impl Op {
    /// Открывает ли операция новый уровень вложенности.
    pub fn opens_block(&self) -> bool {
        matches!(self, Op::If(_) | Op::Else | Op::Loop)
    }

    /// Операнды, которые читает операция.
    pub fn reads(&self) -> Vec<&Operand> {
        match self {
            Op::Assign { value, .. } => value.operands(),
            Op::If(cond) => vec![cond],
            Op::Print(args) => args.iter().collect(),
            Op::Else | Op::Loop | Op::Break | Op::Pass | Op::End => Vec::new(),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Assign { dest, value } => write!(f, "{} = {}", dest, value),
            Op::If(cond) => write!(f, "if {} goto block", cond),
            Op::Else => f.write_str("else"),
            Op::Loop => f.write_str("loop"),
            Op::Break => f.write_str("break"),
            Op::Pass => f.write_str("pass"),
            Op::Print(args) => {
                f.write_str("print")?;
                for (i, arg) in args.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{}{}", sep, arg)?;
                }
                Ok(())
            }
            Op::End => f.write_str("end"),
        }
    }
}

/// Инструкция: операция, глубина вложенности и исходная строка.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub depth: usize,
    pub op: Op,
    pub line: usize,
}

impl Instr {
    pub fn new(depth: usize, op: Op, line: usize) -> Self {
        Self { depth, op, line }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:width$}{}", "", self.op, width = self.depth * 4)
    }
}

/// Отрендерить последовательность инструкций в текст, по строке на инструкцию.
pub fn listing(code: &[Instr]) -> String {
    let mut out = String::new();
    for instr in code {
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    out
}
