//! Парсер рекурсивного спуска с восстановлением после ошибок.
//!
//! Ошибка внутри инструкции не прерывает разбор: парсер пишет диагностику,
//! пропускает токены до точки синхронизации и вставляет узел
//! [`Stmt::Error`].

use super::error::ParseError;
use super::token::{Token, TokenKind};
use crate::ast::{BinaryOp, Expr, Literal, Program, Stmt, UnaryOp};
use crate::diagnostics::{Diagnostics, Phase};
use crate::types::DataType;

// 64KB red zone, 1MB stack growth
const RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

/// Парсер исходного языка.
pub struct Parser<'d> {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Parser<'d> {
    /// Создать новый парсер. Если поток не заканчивается `Eof`, он добавляется.
    pub fn new(mut tokens: Vec<Token>, diagnostics: &'d mut Diagnostics) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let line = tokens.last().map(|t| t.line).unwrap_or(1);
            tokens.push(Token::new(TokenKind::Eof, "", line));
        }
        Self {
            tokens,
            pos: 0,
            diagnostics,
        }
    }

    /// Разобрать программу целиком.
    ///
    /// `inicio ... fin` ограничивают программу; без `inicio` программа -
    /// просто последовательность инструкций до конца файла.
    pub fn parse_program(&mut self) -> Program {
        let line = self.peek().line;
        let delimited = self.eat(TokenKind::Inicio);

        let mut statements = Vec::new();
        while !self.check(TokenKind::Eof) && !(delimited && self.check(TokenKind::Fin)) {
            statements.push(self.statement());
        }

        if delimited {
            if self.eat(TokenKind::Fin) {
                if !self.check(TokenKind::Eof) {
                    let token = self.peek().clone();
                    self.report(&ParseError::TrailingTokens {
                        line: token.line,
                        found: token.describe(),
                    });
                }
            } else {
                let eof_line = self.peek().line;
                self.report(&ParseError::MissingFin {
                    line: eof_line,
                    opened: line,
                });
            }
        }

        log::debug!("parser produced {} top-level statements", statements.len());
        Program { statements, line }
    }

    // === Инструкции ===

    /// Разобрать одну инструкцию; при ошибке - восстановиться.
    fn statement(&mut self) -> Stmt {
        let start = self.pos;
        match self.try_statement() {
            Ok(stmt) => stmt,
            Err(err) => {
                self.report(&err);
                self.synchronize(start);
                Stmt::Error {
                    message: err.to_string(),
                    line: err.line(),
                }
            }
        }
    }

    fn try_statement(&mut self) -> Result<Stmt, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Type(ty) => self.var_decl(ty),
            TokenKind::Constante => self.const_decl(),
            TokenKind::Identificador => self.assignment(),
            TokenKind::Si => self.if_stmt(),
            TokenKind::Mientras => self.while_stmt(),
            TokenKind::Repetir => self.do_until(),
            TokenKind::Para => self.for_stmt(),
            TokenKind::Mostrar => self.print_stmt(),
            _ => Err(ParseError::UnexpectedStatement {
                line: token.line,
                found: token.describe(),
            }),
        }
    }

    /// Панический режим: пропустить токены до `;` (включительно) или до
    /// ключевого слова, закрывающего блок или начинающего инструкцию.
    /// Хотя бы один токен всегда потребляется.
    fn synchronize(&mut self, start: usize) {
        loop {
            let kind = self.peek_kind();
            if kind == TokenKind::Eof {
                return;
            }
            if kind == TokenKind::Semicolon {
                self.advance();
                return;
            }
            if self.pos > start && (kind.closes_block() || kind.starts_statement()) {
                return;
            }
            self.advance();
        }
    }

    /// Тело блока: инструкции до любого закрывающего ключевого слова.
    fn block(&mut self) -> Vec<Stmt> {
        let mut body = Vec::new();
        while !self.peek_kind().closes_block() {
            body.push(self.statement());
        }
        body
    }

    fn close_block(
        &mut self,
        construct: &'static str,
        opened: usize,
        closer: TokenKind,
    ) -> Result<(), ParseError> {
        if self.eat(closer) {
            return Ok(());
        }
        let found = self.peek();
        Err(ParseError::UnclosedBlock {
            line: opened,
            construct,
            closer,
            found: found.describe(),
            found_line: found.line,
        })
    }

    fn var_decl(&mut self, ty: DataType) -> Result<Stmt, ParseError> {
        let line = self.advance().line;
        let name = self.expect(TokenKind::Identificador)?.lexeme;
        let init = if self.eat(TokenKind::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::VarDecl {
            ty,
            name,
            init,
            line,
        })
    }

    fn const_decl(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line;
        let name = self.expect(TokenKind::Identificador)?.lexeme;
        self.expect(TokenKind::Assign)?;
        let init = self.expression()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::ConstDecl { name, init, line })
    }

    fn assignment(&mut self) -> Result<Stmt, ParseError> {
        let target = self.advance();
        self.expect(TokenKind::Assign)?;
        let expr = self.expression()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Assign {
            name: target.lexeme,
            expr,
            line: target.line,
        })
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line;
        let cond = self.condition()?;
        self.expect(TokenKind::Entonces)?;
        let then_body = self.block();
        let else_body = if self.eat(TokenKind::Sino) {
            Some(self.block())
        } else {
            None
        };
        self.close_block("si", line, TokenKind::FinSi)?;
        self.eat(TokenKind::Semicolon);
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
            line,
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line;
        let cond = self.condition()?;
        self.expect(TokenKind::Hacer)?;
        let body = self.block();
        self.close_block("mientras", line, TokenKind::FinMientras)?;
        self.eat(TokenKind::Semicolon);
        Ok(Stmt::While { cond, body, line })
    }

    fn do_until(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line;
        let body = self.block();
        self.close_block("repetir", line, TokenKind::HastaQue)?;
        let cond = self.condition()?;
        self.eat(TokenKind::Semicolon);
        Ok(Stmt::DoUntil { body, cond, line })
    }

    fn for_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line;
        let var = self.expect(TokenKind::Identificador)?.lexeme;
        self.expect(TokenKind::Desde)?;
        let from = self.expression()?;
        self.expect(TokenKind::Hasta)?;
        let to = self.expression()?;
        let step = if self.eat(TokenKind::ConPaso) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Hacer)?;
        let body = self.block();
        self.close_block("para", line, TokenKind::FinPara)?;
        self.eat(TokenKind::Semicolon);
        Ok(Stmt::For {
            var,
            from,
            to,
            step,
            body,
            line,
        })
    }

    fn print_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line;
        self.expect(TokenKind::LParen)?;
        let mut exprs = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                exprs.push(self.expression()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Print { exprs, line })
    }

    /// Условие конструкции: выражение, начинающееся со скобки.
    fn condition(&mut self) -> Result<Expr, ParseError> {
        if !self.check(TokenKind::LParen) {
            return Err(ParseError::unexpected_token("'(' before condition", self.peek()));
        }
        self.expression()
    }

    // === Выражения ===
    //
    // Приоритет (от низкого к высокому): OR, AND, NOT, + -, * / %,
    // отношения, равенство, унарный минус.

    /// Разобрать выражение.
    pub fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        while self.check(TokenKind::Or) {
            let line = self.advance().line;
            let right = self.and_expr()?;
            left = Expr::binary(BinaryOp::Or, left, right, line);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.not_expr()?;
        while self.check(TokenKind::And) {
            let line = self.advance().line;
            let right = self.not_expr()?;
            left = Expr::binary(BinaryOp::And, left, right, line);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.check(TokenKind::Not) {
            let line = self.advance().line;
            let operand = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.not_expr())?;
            return Ok(Expr::unary(UnaryOp::Not, operand, line));
        }
        self.additive()
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            let line = self.advance().line;
            let right = self.multiplicative()?;
            left = Expr::binary(op, left, right, line);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            let line = self.advance().line;
            let right = self.relational()?;
            left = Expr::binary(op, left, right, line);
        }
    }

    fn relational(&mut self) -> Result<Expr, ParseError> {
        let left = self.equality()?;
        let Some(op) = relational_op(self.peek_kind()) else {
            return Ok(left);
        };
        let line = self.advance().line;
        let right = self.equality()?;
        if relational_op(self.peek_kind()).is_some() {
            let token = self.peek();
            return Err(ParseError::ChainedComparison {
                line: token.line,
                op: token.lexeme.clone(),
            });
        }
        Ok(Expr::binary(op, left, right, line))
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let left = self.unary()?;
        let Some(op) = equality_op(self.peek_kind()) else {
            return Ok(left);
        };
        let line = self.advance().line;
        let right = self.unary()?;
        if equality_op(self.peek_kind()).is_some() {
            let token = self.peek();
            return Err(ParseError::ChainedComparison {
                line: token.line,
                op: token.lexeme.clone(),
            });
        }
        Ok(Expr::binary(op, left, right, line))
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(TokenKind::Minus) {
            let line = self.advance().line;
            let operand = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.unary())?;
            return Ok(Expr::unary(UnaryOp::Neg, operand, line));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        let value = match token.kind {
            TokenKind::LiteralEntero => Literal::Entero(
                token
                    .lexeme
                    .parse()
                    .map_err(|_| invalid_literal(&token))?,
            ),
            TokenKind::LiteralDecimal => Literal::Decimal(
                token
                    .lexeme
                    .parse()
                    .map_err(|_| invalid_literal(&token))?,
            ),
            TokenKind::LiteralCadena => {
                let text = token
                    .lexeme
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .ok_or_else(|| invalid_literal(&token))?;
                Literal::Cadena(text.to_string())
            }
            TokenKind::LiteralBooleano => Literal::Booleano(token.lexeme == "verdadero"),
            TokenKind::Identificador => {
                self.advance();
                return Ok(Expr::Identifier {
                    name: token.lexeme,
                    line: token.line,
                });
            }
            TokenKind::LParen => {
                self.advance();
                let inner = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.expression())?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            _ => return Err(ParseError::unexpected_token("expression", &token)),
        };
        self.advance();
        Ok(Expr::Literal {
            value,
            line: token.line,
        })
    }

    // === Вспомогательные методы ===

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// Потребить текущий токен. `Eof` не потребляется.
    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected_token(kind.to_string(), self.peek()))
        }
    }

    fn report(&mut self, err: &ParseError) {
        self.diagnostics
            .push(Phase::Syntactic, err.line(), err.to_string());
    }
}

fn relational_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::GtEq => Some(BinaryOp::Ge),
        TokenKind::LtEq => Some(BinaryOp::Le),
        _ => None,
    }
}

fn equality_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::EqEq => Some(BinaryOp::Eq),
        TokenKind::NotEq => Some(BinaryOp::Ne),
        _ => None,
    }
}

fn invalid_literal(token: &Token) -> ParseError {
    ParseError::InvalidLiteral {
        line: token.line,
        lexeme: token.lexeme.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::tokenize;

    fn parse_source(source: &str) -> (Program, Diagnostics) {
        let mut diags = Diagnostics::new();
        let tokens = tokenize(source, &mut diags);
        let program = Parser::new(tokens, &mut diags).parse_program();
        (program, diags)
    }

    fn parse_expr(source: &str) -> Expr {
        let mut diags = Diagnostics::new();
        let tokens = tokenize(source, &mut diags);
        Parser::new(tokens, &mut diags).expression().unwrap()
    }

    #[test]
    fn test_parse_declarations() {
        let (program, diags) = parse_source("inicio entero x = 5; constante PI = 3.14; cadena s; fin");
        assert!(diags.is_empty());
        assert_eq!(program.statements.len(), 3);
        match &program.statements[0] {
            Stmt::VarDecl { ty, name, init, .. } => {
                assert_eq!(*ty, DataType::Entero);
                assert_eq!(name, "x");
                assert!(init.is_some());
            }
            other => panic!("Expected VarDecl, got {:?}", other),
        }
        assert!(matches!(&program.statements[1], Stmt::ConstDecl { name, .. } if name == "PI"));
        assert!(matches!(&program.statements[2], Stmt::VarDecl { init: None, .. }));
    }

    #[test]
    fn test_parse_without_delimiters() {
        let (program, diags) = parse_source("mostrar(1);");
        assert!(diags.is_empty());
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn test_parse_if_else() {
        let source = "si (x > 1) entonces mostrar(1); sino mostrar(2); mostrar(3); fin_si";
        let (program, diags) = parse_source(source);
        assert!(diags.is_empty());
        match &program.statements[0] {
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                assert_eq!(then_body.len(), 1);
                assert_eq!(else_body.as_ref().map(Vec::len), Some(2));
            }
            other => panic!("Expected If, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_loops() {
        let source = "\
            mientras (i < 3) hacer i = i + 1; fin_mientras
            repetir i = i - 1; hasta_que (i == 0);
            para j desde 1 hasta 10 con_paso 2 hacer mostrar(j); fin_para";
        let (program, diags) = parse_source(source);
        assert!(diags.is_empty(), "{:?}", diags);
        assert!(matches!(program.statements[0], Stmt::While { .. }));
        assert!(matches!(program.statements[1], Stmt::DoUntil { .. }));
        match &program.statements[2] {
            Stmt::For { var, step, line, .. } => {
                assert_eq!(var, "j");
                assert!(step.is_some());
                assert_eq!(*line, 3);
            }
            other => panic!("Expected For, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_mul_over_add() {
        match &parse_expr("1 + 2 * 3") {
            Expr::Binary { op, right, .. } => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(**right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("Expected Binary, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_relational_binds_tighter_than_arithmetic() {
        match &parse_expr("a + b > c") {
            Expr::Binary { op, right, .. } => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(**right, Expr::Binary { op: BinaryOp::Gt, .. }));
            }
            other => panic!("Expected Binary, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_logic() {
        // NOT a AND b OR c  ==  ((NOT a) AND b) OR c
        match &parse_expr("NOT a AND b OR c") {
            Expr::Binary { op, left, .. } => {
                assert_eq!(*op, BinaryOp::Or);
                match &**left {
                    Expr::Binary { op, left, .. } => {
                        assert_eq!(*op, BinaryOp::And);
                        assert!(matches!(**left, Expr::Unary { op: UnaryOp::Not, .. }));
                    }
                    other => panic!("Expected AND, got {:?}", other),
                }
            }
            other => panic!("Expected OR, got {:?}", other),
        }
    }

    #[test]
    fn test_chained_comparison_is_error() {
        let (program, diags) = parse_source("mostrar(a < b < c);");
        assert_eq!(diags.len(), 1);
        assert!(matches!(program.statements[0], Stmt::Error { .. }));
    }

    #[test]
    fn test_recovery_keeps_parsing() {
        let source = "inicio\nentero = 5;\nmostrar(1);\nentero y 3;\nmostrar(2);\nfin";
        let (program, diags) = parse_source(source);

        assert_eq!(diags.len(), 2);
        let lines: Vec<usize> = diags.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![2, 4]);
        assert!(diags.iter().all(|d| d.phase == Phase::Syntactic));

        assert_eq!(program.statements.len(), 4);
        assert!(matches!(program.statements[0], Stmt::Error { .. }));
        assert!(matches!(program.statements[1], Stmt::Print { .. }));
        assert!(matches!(program.statements[2], Stmt::Error { .. }));
        assert!(matches!(program.statements[3], Stmt::Print { .. }));
    }

    #[test]
    fn test_recovery_inside_block() {
        let source = "mientras (verdadero) hacer\n x = ;\n mostrar(1);\nfin_mientras";
        let (program, diags) = parse_source(source);
        assert_eq!(diags.len(), 1);
        match &program.statements[0] {
            Stmt::While { body, .. } => {
                assert!(matches!(body[0], Stmt::Error { line: 2, .. }));
                assert!(matches!(body[1], Stmt::Print { .. }));
            }
            other => panic!("Expected While, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_closer_reports_opening_line() {
        let source = "si (a) entonces\nmostrar(1);\nfin_mientras";
        let (_, diags) = parse_source(source);
        let first = diags.iter().next().unwrap();
        assert_eq!(first.line, 1);
        assert!(first.message.contains("fin_si"));
    }

    #[test]
    fn test_missing_fin() {
        let (_, diags) = parse_source("inicio mostrar(1);");
        assert_eq!(diags.len(), 1);
        assert!(diags.iter().next().unwrap().message.contains("'fin'"));
    }

    #[test]
    fn test_stray_closer_terminates() {
        let (program, diags) = parse_source("fin_si fin_para mostrar(1);");
        assert_eq!(diags.len(), 2);
        assert_eq!(program.statements.len(), 3);
    }

    #[test]
    fn test_string_literal_strips_quotes() {
        match &parse_expr("\"hola mundo\"") {
            Expr::Literal {
                value: Literal::Cadena(s),
                ..
            } => assert_eq!(s, "hola mundo"),
            other => panic!("Expected string, got {:?}", other),
        }
    }

    #[test]
    fn test_deeply_nested_parentheses() {
        let depth = 2000;
        let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(matches!(
            parse_expr(&source),
            Expr::Literal {
                value: Literal::Entero(1),
                ..
            }
        ));
    }
}
