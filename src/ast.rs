//! Абстрактное синтаксическое дерево.
//!
//! Дерево строится парсером снизу вверх и после этого не меняется.
//! Единственное исключение - тип бинарного узла, который семантический
//! анализатор записывает один раз (`OnceCell`).

use std::cell::OnceCell;
use std::fmt;
use std::mem;

use crate::types::DataType;

/// Корень программы.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub line: usize,
}

/// Инструкция.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `entero x = 5;`
    VarDecl {
        ty: DataType,
        name: String,
        init: Option<Expr>,
        line: usize,
    },
    /// `constante x = 5;`
    ConstDecl {
        name: String,
        init: Expr,
        line: usize,
    },
    /// `x = expr;`
    Assign {
        name: String,
        expr: Expr,
        line: usize,
    },
    /// `si (c) entonces ... sino ... fin_si`
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
        line: usize,
    },
    /// `mientras (c) hacer ... fin_mientras`
    While {
        cond: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    /// `repetir ... hasta_que (c)`
    DoUntil {
        body: Vec<Stmt>,
        cond: Expr,
        line: usize,
    },
    /// `para i desde a hasta b con_paso s hacer ... fin_para`
    For {
        var: String,
        from: Expr,
        to: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
        line: usize,
    },
    /// `mostrar(a, b, ...);`
    Print { exprs: Vec<Expr>, line: usize },
    /// Узел, синтезированный при восстановлении после синтаксической ошибки.
    Error { message: String, line: usize },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::VarDecl { line, .. }
            | Stmt::ConstDecl { line, .. }
            | Stmt::Assign { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::DoUntil { line, .. }
            | Stmt::For { line, .. }
            | Stmt::Print { line, .. }
            | Stmt::Error { line, .. } => *line,
        }
    }
}

/// Выражение.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: usize,
        /// Тип, вычисленный семантическим анализатором (`None` внутри - тип неизвестен).
        ty: OnceCell<Option<DataType>>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        line: usize,
    },
    Literal { value: Literal, line: usize },
    Identifier { name: String, line: usize },
}

impl Expr {
    /// Создать бинарный узел без вычисленного типа.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr, line: usize) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            line,
            ty: OnceCell::new(),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr, line: usize) -> Self {
        Expr::Unary {
            op,
            expr: Box::new(expr),
            line,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Expr::Binary { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Literal { line, .. }
            | Expr::Identifier { line, .. } => *line,
        }
    }

    /// Целочисленная константа, если выражение - литерал `n` или `-n`
    /// (с любым числом минусов).
    pub fn as_int_constant(&self) -> Option<i64> {
        let (negations, inner) = self.strip_negations();
        let Expr::Literal {
            value: Literal::Entero(n),
            ..
        } = inner
        else {
            return None;
        };
        if negations % 2 == 0 {
            Some(*n)
        } else {
            n.checked_neg()
        }
    }

    /// Является ли выражение числовым литералом, равным нулю (`0`, `-0`, `-0.0`).
    pub fn is_literal_zero(&self) -> bool {
        match self.strip_negations().1 {
            Expr::Literal {
                value: Literal::Entero(0),
                ..
            } => true,
            Expr::Literal {
                value: Literal::Decimal(f),
                ..
            } => *f == 0.0,
            _ => false,
        }
    }

    /// Снять унарные минусы: (число минусов, внутреннее выражение).
    fn strip_negations(&self) -> (usize, &Expr) {
        let mut negations = 0;
        let mut current = self;
        while let Expr::Unary {
            op: UnaryOp::Neg,
            expr,
            ..
        } = current
        {
            negations += 1;
            current = &**expr;
        }
        (negations, current)
    }

    /// Вынуть прямых потомков, оставив на их месте листья.
    fn take_children(&mut self, out: &mut Vec<Expr>) {
        match self {
            Expr::Binary { left, right, .. } => {
                out.push(mem::replace(&mut **left, Expr::hole()));
                out.push(mem::replace(&mut **right, Expr::hole()));
            }
            Expr::Unary { expr, .. } => out.push(mem::replace(&mut **expr, Expr::hole())),
            Expr::Literal { .. } | Expr::Identifier { .. } => {}
        }
    }

    fn hole() -> Self {
        Expr::Literal {
            value: Literal::Booleano(false),
            line: 0,
        }
    }
}

// Длинные цепочки операторов дают дерево глубиной в сотни тысяч узлов;
// рекурсивное освобождение переполнило бы стек.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut expr) = pending.pop() {
            expr.take_children(&mut pending);
        }
    }
}

/// Литеральное значение; тип литерала определяется вариантом.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Entero(i64),
    Decimal(f64),
    Cadena(String),
    Booleano(bool),
}

impl Literal {
    pub fn data_type(&self) -> DataType {
        match self {
            Literal::Entero(_) => DataType::Entero,
            Literal::Decimal(_) => DataType::Decimal,
            Literal::Cadena(_) => DataType::Cadena,
            Literal::Booleano(_) => DataType::Booleano,
        }
    }

    /// Нулевое значение типа (для объявлений без инициализатора).
    pub fn zero_of(ty: DataType) -> Self {
        match ty {
            DataType::Entero => Literal::Entero(0),
            DataType::Decimal => Literal::Decimal(0.0),
            DataType::Cadena => Literal::Cadena(String::new()),
            DataType::Booleano => Literal::Booleano(false),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Entero(n) => write!(f, "{}", n),
            Literal::Decimal(x) => write!(f, "{:?}", x),
            Literal::Cadena(s) => write!(f, "\"{}\"", s),
            Literal::Booleano(true) => f.write_str("verdadero"),
            Literal::Booleano(false) => f.write_str("falso"),
        }
    }
}

/// Бинарный оператор.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

/// Класс оператора для проверки типов.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Arithmetic,
    Logical,
    Relational,
    Equality,
}

impl BinaryOp {
    pub fn class(self) -> OpClass {
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                OpClass::Arithmetic
            }
            BinaryOp::And | BinaryOp::Or => OpClass::Logical,
            BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => OpClass::Relational,
            BinaryOp::Eq | BinaryOp::Ne => OpClass::Equality,
        }
    }

    /// Написание оператора в исходном языке.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Унарный оператор.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => f.write_str("NOT"),
            UnaryOp::Neg => f.write_str("-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Expr {
        Expr::Literal {
            value: Literal::Entero(n),
            line: 1,
        }
    }

    #[test]
    fn test_int_constant_through_negation() {
        assert_eq!(int(7).as_int_constant(), Some(7));
        assert_eq!(
            Expr::unary(UnaryOp::Neg, int(3), 1).as_int_constant(),
            Some(-3)
        );
        let ident = Expr::Identifier {
            name: "x".into(),
            line: 1,
        };
        assert_eq!(ident.as_int_constant(), None);
    }

    #[test]
    fn test_literal_zero() {
        assert!(int(0).is_literal_zero());
        assert!(Expr::Literal {
            value: Literal::Decimal(0.0),
            line: 1
        }
        .is_literal_zero());
        assert!(!int(2).is_literal_zero());

        let neg_zero = Expr::unary(UnaryOp::Neg, int(0), 1);
        assert!(neg_zero.is_literal_zero());
        let neg_decimal_zero = Expr::unary(
            UnaryOp::Neg,
            Expr::Literal {
                value: Literal::Decimal(0.0),
                line: 1,
            },
            1,
        );
        assert!(neg_decimal_zero.is_literal_zero());
        assert!(!Expr::unary(UnaryOp::Not, int(0), 1).is_literal_zero());
    }

    #[test]
    fn test_double_negation_constant() {
        let expr = Expr::unary(UnaryOp::Neg, Expr::unary(UnaryOp::Neg, int(4), 1), 1);
        assert_eq!(expr.as_int_constant(), Some(4));
    }

    #[test]
    fn test_drop_of_deep_chain() {
        let mut expr = int(1);
        for _ in 0..200_000 {
            expr = Expr::binary(BinaryOp::Add, expr, int(1), 1);
        }
        drop(expr);
    }

    #[test]
    fn test_binary_type_is_write_once() {
        let expr = Expr::binary(BinaryOp::Add, int(1), int(2), 1);
        match &expr {
            Expr::Binary { ty, .. } => {
                assert!(ty.set(Some(DataType::Entero)).is_ok());
                assert!(ty.set(Some(DataType::Decimal)).is_err());
                assert_eq!(ty.get(), Some(&Some(DataType::Entero)));
            }
            _ => panic!("Expected Binary"),
        }
    }

    #[test]
    fn test_operator_classes() {
        assert_eq!(BinaryOp::Mod.class(), OpClass::Arithmetic);
        assert_eq!(BinaryOp::Or.class(), OpClass::Logical);
        assert_eq!(BinaryOp::Ge.class(), OpClass::Relational);
        assert_eq!(BinaryOp::Ne.class(), OpClass::Equality);
    }
}
