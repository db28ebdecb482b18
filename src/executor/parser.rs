//! Статический разбор целевого скрипта и проверка белого списка.
//!
//! Скрипт разбирается целиком до запуска: синтаксическая ошибка или вызов
//! функции вне белого списка отклоняют его без выполнения.

use super::builtins::WHITELIST;
use super::lexer::{tokenize, Spanned, Tok};
use super::ScriptError;

// 64KB red zone, 1MB stack growth
const RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

/// Бинарный оператор скрипта.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

/// Оператор сравнения.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
    Pos,
}

/// Выражение скрипта.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptExpr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    NoneLit,
    Name(String),
    Unary {
        op: UnOp,
        expr: Box<ScriptExpr>,
    },
    Binary {
        op: BinOp,
        left: Box<ScriptExpr>,
        right: Box<ScriptExpr>,
    },
    /// Цепочка сравнений `a < b <= c`.
    Compare {
        first: Box<ScriptExpr>,
        rest: Vec<(CmpOp, ScriptExpr)>,
    },
    And(Box<ScriptExpr>, Box<ScriptExpr>),
    Or(Box<ScriptExpr>, Box<ScriptExpr>),
    Call {
        func: String,
        args: Vec<ScriptExpr>,
    },
}

/// Инструкция скрипта.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStmt {
    Assign {
        target: String,
        value: ScriptExpr,
        line: usize,
    },
    If {
        cond: ScriptExpr,
        body: Vec<ScriptStmt>,
        orelse: Vec<ScriptStmt>,
        line: usize,
    },
    While {
        cond: ScriptExpr,
        body: Vec<ScriptStmt>,
        line: usize,
    },
    Break {
        line: usize,
    },
    Pass {
        line: usize,
    },
    Expr {
        expr: ScriptExpr,
        line: usize,
    },
}

impl ScriptStmt {
    pub fn line(&self) -> usize {
        match self {
            ScriptStmt::Assign { line, .. }
            | ScriptStmt::If { line, .. }
            | ScriptStmt::While { line, .. }
            | ScriptStmt::Break { line }
            | ScriptStmt::Pass { line }
            | ScriptStmt::Expr { line, .. } => *line,
        }
    }
}

/// Разобранный скрипт.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub body: Vec<ScriptStmt>,
}

/// Разобрать скрипт и проверить белый список.
pub fn parse_script(source: &str) -> Result<Script, ScriptError> {
    let tokens = tokenize(source)?;
    let script = ScriptParser::new(tokens).parse()?;
    check_whitelist(&script)?;
    Ok(script)
}

/// Отклонить вызов любой функции вне белого списка.
pub fn check_whitelist(script: &Script) -> Result<(), ScriptError> {
    fn check_expr(expr: &ScriptExpr, line: usize) -> Result<(), ScriptError> {
        match expr {
            ScriptExpr::Call { func, args } => {
                if !WHITELIST.contains(&func.as_str()) {
                    return Err(ScriptError::Forbidden {
                        name: func.clone(),
                        line,
                    });
                }
                args.iter().try_for_each(|arg| check_expr(arg, line))
            }
            ScriptExpr::Unary { expr, .. } => check_expr(expr, line),
            ScriptExpr::Binary { left, right, .. }
            | ScriptExpr::And(left, right)
            | ScriptExpr::Or(left, right) => {
                check_expr(left, line)?;
                check_expr(right, line)
            }
            ScriptExpr::Compare { first, rest } => {
                check_expr(first, line)?;
                rest.iter().try_for_each(|(_, e)| check_expr(e, line))
            }
            ScriptExpr::Int(_)
            | ScriptExpr::Float(_)
            | ScriptExpr::Str(_)
            | ScriptExpr::Bool(_)
            | ScriptExpr::NoneLit
            | ScriptExpr::Name(_) => Ok(()),
        }
    }

    fn check_block(body: &[ScriptStmt]) -> Result<(), ScriptError> {
        for stmt in body {
            match stmt {
                ScriptStmt::Assign { value, line, .. } => check_expr(value, *line)?,
                ScriptStmt::Expr { expr, line } => check_expr(expr, *line)?,
                ScriptStmt::If {
                    cond,
                    body,
                    orelse,
                    line,
                } => {
                    check_expr(cond, *line)?;
                    check_block(body)?;
                    check_block(orelse)?;
                }
                ScriptStmt::While { cond, body, line } => {
                    check_expr(cond, *line)?;
                    check_block(body)?;
                }
                ScriptStmt::Break { .. } | ScriptStmt::Pass { .. } => {}
            }
        }
        Ok(())
    }

    check_block(&script.body)
}

/// Парсер рекурсивного спуска для скрипта.
struct ScriptParser {
    tokens: Vec<Spanned>,
    pos: usize,
    loop_depth: usize,
}

impl ScriptParser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            loop_depth: 0,
        }
    }

    fn parse(mut self) -> Result<Script, ScriptError> {
        let mut body = Vec::new();
        while !self.check(&Tok::Eof) {
            body.push(self.statement()?);
        }
        Ok(Script { body })
    }

    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.pos)
            .map(|s| &s.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(0)
    }

    fn check(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.check(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), ScriptError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {:?}", what, self.peek())))
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::syntax(self.line(), message)
    }

    fn statement(&mut self) -> Result<ScriptStmt, ScriptError> {
        let line = self.line();
        match self.peek() {
            Tok::If => self.if_stmt(),
            Tok::While => {
                self.advance();
                let cond = self.expression()?;
                self.loop_depth += 1;
                let body = self.suite();
                self.loop_depth -= 1;
                Ok(ScriptStmt::While { cond, body: body?, line })
            }
            _ => {
                let stmt = self.simple_statement()?;
                self.expect(Tok::Newline, "end of line")?;
                Ok(stmt)
            }
        }
    }

    fn if_stmt(&mut self) -> Result<ScriptStmt, ScriptError> {
        let line = self.line();
        self.advance();
        let cond = self.expression()?;
        let body = self.suite()?;
        let orelse = if self.eat(&Tok::Else) {
            self.suite()?
        } else {
            Vec::new()
        };
        Ok(ScriptStmt::If {
            cond,
            body,
            orelse,
            line,
        })
    }

    /// `':' NEWLINE INDENT stmt+ DEDENT` или `':' simple_stmt NEWLINE`.
    fn suite(&mut self) -> Result<Vec<ScriptStmt>, ScriptError> {
        self.expect(Tok::Colon, "':'")?;
        if !self.eat(&Tok::Newline) {
            let stmt = self.simple_statement()?;
            self.expect(Tok::Newline, "end of line")?;
            return Ok(vec![stmt]);
        }
        self.expect(Tok::Indent, "an indented block")?;
        let mut body = Vec::new();
        while !self.eat(&Tok::Dedent) {
            if self.check(&Tok::Eof) {
                return Err(self.error("unexpected end of script inside a block"));
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn simple_statement(&mut self) -> Result<ScriptStmt, ScriptError> {
        let line = self.line();
        match self.peek().clone() {
            Tok::Break => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(ScriptError::syntax(line, "'break' outside loop"));
                }
                Ok(ScriptStmt::Break { line })
            }
            Tok::Pass => {
                self.advance();
                Ok(ScriptStmt::Pass { line })
            }
            Tok::Name(name)
                if self
                    .tokens
                    .get(self.pos + 1)
                    .is_some_and(|next| next.tok == Tok::Assign) =>
            {
                self.advance();
                self.advance();
                let value = self.expression()?;
                Ok(ScriptStmt::Assign {
                    target: name,
                    value,
                    line,
                })
            }
            _ => {
                let expr = self.expression()?;
                Ok(ScriptStmt::Expr { expr, line })
            }
        }
    }

    // Приоритет как в Python: or, and, not, сравнения, + -, * / // %, унарные.

    fn expression(&mut self) -> Result<ScriptExpr, ScriptError> {
        let mut left = self.and_expr()?;
        while self.eat(&Tok::Or) {
            let right = self.and_expr()?;
            left = ScriptExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<ScriptExpr, ScriptError> {
        let mut left = self.not_expr()?;
        while self.eat(&Tok::And) {
            let right = self.not_expr()?;
            left = ScriptExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<ScriptExpr, ScriptError> {
        if self.eat(&Tok::Not) {
            let expr = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.not_expr())?;
            return Ok(ScriptExpr::Unary {
                op: UnOp::Not,
                expr: Box::new(expr),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<ScriptExpr, ScriptError> {
        let first = self.arith()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Tok::EqEq => CmpOp::Eq,
                Tok::NotEq => CmpOp::Ne,
                Tok::Lt => CmpOp::Lt,
                Tok::Gt => CmpOp::Gt,
                Tok::LtEq => CmpOp::Le,
                Tok::GtEq => CmpOp::Ge,
                _ => break,
            };
            self.advance();
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(ScriptExpr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn arith(&mut self) -> Result<ScriptExpr, ScriptError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = ScriptExpr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> Result<ScriptExpr, ScriptError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::DoubleSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.factor()?;
            left = ScriptExpr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn factor(&mut self) -> Result<ScriptExpr, ScriptError> {
        let op = match self.peek() {
            Tok::Minus => UnOp::Neg,
            Tok::Plus => UnOp::Pos,
            _ => return self.atom(),
        };
        self.advance();
        let expr = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.factor())?;
        Ok(ScriptExpr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn atom(&mut self) -> Result<ScriptExpr, ScriptError> {
        match self.advance() {
            Tok::Int(n) => Ok(ScriptExpr::Int(n)),
            Tok::Float(x) => Ok(ScriptExpr::Float(x)),
            Tok::Str(s) => Ok(ScriptExpr::Str(s)),
            Tok::True => Ok(ScriptExpr::Bool(true)),
            Tok::False => Ok(ScriptExpr::Bool(false)),
            Tok::NoneLit => Ok(ScriptExpr::NoneLit),
            Tok::Name(name) => {
                if !self.eat(&Tok::LParen) {
                    return Ok(ScriptExpr::Name(name));
                }
                let mut args = Vec::new();
                if !self.check(&Tok::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.eat(&Tok::Comma) || self.check(&Tok::RParen) {
                            break;
                        }
                    }
                }
                self.expect(Tok::RParen, "')'")?;
                Ok(ScriptExpr::Call { func: name, args })
            }
            Tok::LParen => {
                let inner = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.expression())?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            other => {
                // Токен уже потреблён; строка ошибки - строка этого токена.
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("invalid syntax near {:?}", other)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generated_shape() {
        let source = "v_i = 1\nt0 = 3\nwhile True:\n    t1 = v_i > t0\n    if t1:\n        break\n    print(v_i)\n    v_i = v_i + 1\n";
        let script = parse_script(source).unwrap();
        assert_eq!(script.body.len(), 3);
        match &script.body[2] {
            ScriptStmt::While { body, line, .. } => {
                assert_eq!(*line, 3);
                assert_eq!(body.len(), 4);
                assert!(matches!(body[1], ScriptStmt::If { .. }));
            }
            other => panic!("Expected While, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_if_else() {
        let script = parse_script("if x:\n    pass\nelse:\n    y = 1\n").unwrap();
        match &script.body[0] {
            ScriptStmt::If { orelse, .. } => assert_eq!(orelse.len(), 1),
            other => panic!("Expected If, got {:?}", other),
        }
    }

    #[test]
    fn test_python_precedence() {
        let script = parse_script("x = not 1 + 2 * 3 < 4 and y\n").unwrap();
        match &script.body[0] {
            ScriptStmt::Assign { value, .. } => match value {
                ScriptExpr::And(left, _) => {
                    assert!(matches!(**left, ScriptExpr::Unary { op: UnOp::Not, .. }));
                }
                other => panic!("Expected And, got {:?}", other),
            },
            other => panic!("Expected Assign, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_call_outside_whitelist() {
        let err = parse_script("x = 1\nopen(\"f\")\n").unwrap_err();
        assert!(matches!(err, ScriptError::Forbidden { ref name, line: 2 } if name == "open"));

        let err = parse_script("print(__import__(\"os\"))\n").unwrap_err();
        assert!(matches!(err, ScriptError::Forbidden { .. }));
    }

    #[test]
    fn test_whitelisted_calls_are_accepted() {
        assert!(parse_script("print(int(\"3\"), float(1), str(2), bool(0))\n").is_ok());
        assert!(parse_script("r = range(1, 10, 2)\nprint(r)\n").is_ok());
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_script("x = \n").is_err());
        assert!(parse_script("if x\n    pass\n").is_err());
        assert!(parse_script("break\n").is_err());
        assert!(parse_script("while True:\nprint(1)\n").is_err());
        assert!(parse_script("print(1) print(2)\n").is_err());
    }

    #[test]
    fn test_break_inside_nested_if_is_allowed() {
        assert!(parse_script("while True:\n    if True:\n        break\n").is_ok());
    }

    #[test]
    fn test_empty_script() {
        assert_eq!(parse_script("").unwrap(), Script::default());
    }
}
