//! Семантический анализ: проверка типов и таблицы символов.
//!
//! Обход AST в пост-порядке. Анализатор никогда не прерывается: каждая
//! проблема становится диагностикой, а выражение с ошибкой получает
//! неизвестный тип (`None`), который подавляет каскад сообщений выше по
//! дереву.

use crate::ast::{BinaryOp, Expr, OpClass, Program, Stmt, UnaryOp};
use crate::context::CompilationContext;
use crate::diagnostics::Phase;
use crate::types::DataType;

// 64KB red zone, 1MB stack growth
const RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

/// Проверка типов одной программы.
pub struct SemanticAnalyzer<'c> {
    ctx: &'c mut CompilationContext,
}

impl<'c> SemanticAnalyzer<'c> {
    pub fn new(ctx: &'c mut CompilationContext) -> Self {
        Self { ctx }
    }

    /// Проверить программу. Результат - диагностики в контексте.
    pub fn analyze(&mut self, program: &Program) {
        let before = self.ctx.diagnostics.len();
        self.check_block(&program.statements);
        log::debug!(
            "semantic analysis finished with {} new diagnostic(s)",
            self.ctx.diagnostics.len() - before
        );
    }

    fn check_block(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl {
                ty,
                name,
                init,
                line,
            } => {
                let init_ty = init.as_ref().and_then(|e| self.expr_type(e));
                if self.reject_redeclaration(name, *line) {
                    return;
                }
                if let Some(found) = init_ty {
                    if !ty.accepts(found) {
                        self.error(
                            *line,
                            format!("cannot initialize {ty} variable '{name}' with a {found} value"),
                        );
                    }
                }
                self.ctx.symbols.declare_variable(name, *ty, *line);
            }

            Stmt::ConstDecl { name, init, line } => {
                let init_ty = self.expr_type(init);
                if self.reject_redeclaration(name, *line) {
                    return;
                }
                self.ctx.symbols.declare_constant(name, init_ty, *line);
            }

            Stmt::Assign { name, expr, line } => {
                let value_ty = self.expr_type(expr);
                let Some(symbol) = self.ctx.symbols.lookup(name).copied() else {
                    self.error(*line, format!("assignment to undeclared variable '{name}'"));
                    return;
                };
                if self.ctx.symbols.is_constant(name) {
                    self.error(*line, format!("cannot assign to constant '{name}'"));
                    return;
                }
                if let (Some(target), Some(found)) = (symbol.ty, value_ty) {
                    if !target.accepts(found) {
                        self.error(
                            *line,
                            format!("cannot assign a {found} value to {target} variable '{name}'"),
                        );
                    }
                }
            }

            Stmt::If {
                cond,
                then_body,
                else_body,
                line,
            } => {
                self.check_condition(cond, "si", *line);
                self.check_block(then_body);
                if let Some(else_body) = else_body {
                    self.check_block(else_body);
                }
            }

            Stmt::While { cond, body, line } => {
                self.check_condition(cond, "mientras", *line);
                self.check_block(body);
            }

            Stmt::DoUntil { body, cond, line } => {
                self.check_block(body);
                self.check_condition(cond, "hasta_que", *line);
            }

            Stmt::For {
                var,
                from,
                to,
                step,
                body,
                line,
            } => {
                self.check_for_header(var, from, to, step.as_ref(), *line);
                self.check_block(body);
            }

            Stmt::Print { exprs, line } => {
                if exprs.is_empty() {
                    self.error(*line, "'mostrar' requires at least one expression");
                }
                for expr in exprs {
                    self.expr_type(expr);
                }
            }

            // Уже сообщено парсером.
            Stmt::Error { .. } => {}
        }
    }

    /// `true`, если имя уже занято (диагностика записана).
    fn reject_redeclaration(&mut self, name: &str, line: usize) -> bool {
        let Some(previous) = self.ctx.symbols.lookup(name).copied() else {
            return false;
        };
        let kind = if self.ctx.symbols.is_constant(name) {
            "constant"
        } else {
            "variable"
        };
        self.error(
            line,
            format!("{kind} '{name}' is already declared on line {}", previous.line),
        );
        true
    }

    fn check_condition(&mut self, cond: &Expr, construct: &str, line: usize) {
        match self.expr_type(cond) {
            Some(DataType::Booleano) | None => {}
            Some(found) => self.error(
                line,
                format!("condition of '{construct}' must be booleano, found {found}"),
            ),
        }
    }

    fn check_for_header(
        &mut self,
        var: &str,
        from: &Expr,
        to: &Expr,
        step: Option<&Expr>,
        line: usize,
    ) {
        for (bound, label) in [(from, "desde"), (to, "hasta")] {
            match self.expr_type(bound) {
                Some(DataType::Entero) | None => {}
                Some(found) => self.error(
                    bound.line(),
                    format!("'{label}' bound must be entero, found {found}"),
                ),
            }
        }

        match step {
            Some(step) => {
                match self.expr_type(step) {
                    Some(DataType::Entero) | None => {}
                    Some(found) => self.error(
                        step.line(),
                        format!("'con_paso' must be entero, found {found}"),
                    ),
                }
                if step.is_literal_zero() || step.as_int_constant() == Some(0) {
                    self.error(step.line(), "'con_paso' cannot be zero");
                }
            }
            None => {
                if let (Some(start), Some(end)) = (from.as_int_constant(), to.as_int_constant()) {
                    if start > end {
                        self.error(
                            line,
                            format!(
                                "loop range {start}..{end} never runs: 'desde' is greater than 'hasta' and no 'con_paso' is given"
                            ),
                        );
                    }
                }
            }
        }

        match self.ctx.symbols.lookup(var).copied() {
            None => self.ctx.symbols.declare_variable(var, DataType::Entero, line),
            Some(_) if self.ctx.symbols.is_constant(var) => {
                self.error(line, format!("loop variable '{var}' is a constant"));
            }
            Some(symbol) => match symbol.ty {
                Some(DataType::Entero) | None => {}
                Some(found) => self.error(
                    line,
                    format!("loop variable '{var}' must be entero, found {found}"),
                ),
            },
        }
    }

    /// Тип выражения; `None` - тип неизвестен из-за ошибки.
    fn expr_type(&mut self, expr: &Expr) -> Option<DataType> {
        match expr {
            Expr::Literal { value, .. } => Some(value.data_type()),

            Expr::Identifier { name, line } => match self.ctx.symbols.lookup(name) {
                Some(symbol) => symbol.ty,
                None => {
                    self.error(*line, format!("undeclared identifier '{name}'"));
                    None
                }
            },

            Expr::Unary { op, expr, line } => {
                let operand =
                    stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.expr_type(expr))?;
                match op {
                    UnaryOp::Not if operand == DataType::Booleano => Some(operand),
                    UnaryOp::Neg if operand.is_numeric() => Some(operand),
                    UnaryOp::Not => {
                        self.error(*line, format!("'NOT' requires a booleano operand, found {operand}"));
                        None
                    }
                    UnaryOp::Neg => {
                        self.error(*line, format!("unary '-' requires a numeric operand, found {operand}"));
                        None
                    }
                }
            }

            Expr::Binary {
                op,
                left,
                right,
                line,
                ty,
            } => {
                if let Some(memo) = ty.get() {
                    return *memo;
                }
                let (left_ty, right_ty) = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || {
                    (self.expr_type(left), self.expr_type(right))
                });
                let result = match (left_ty, right_ty) {
                    (Some(l), Some(r)) => self.binary_type(*op, l, r, right, *line),
                    _ => None,
                };
                // Первая запись побеждает.
                let _ = ty.set(result);
                result
            }
        }
    }

    fn binary_type(
        &mut self,
        op: BinaryOp,
        left: DataType,
        right: DataType,
        right_expr: &Expr,
        line: usize,
    ) -> Option<DataType> {
        match op.class() {
            OpClass::Arithmetic => {
                if op == BinaryOp::Mod {
                    if left != DataType::Entero || right != DataType::Entero {
                        self.error(
                            line,
                            format!("operator '%' requires entero operands, found {left} and {right}"),
                        );
                        return None;
                    }
                    if right_expr.is_literal_zero() {
                        self.error(line, "modulo by zero");
                    }
                    return Some(DataType::Entero);
                }
                if !left.is_numeric() || !right.is_numeric() {
                    self.error(
                        line,
                        format!("operator '{op}' requires numeric operands, found {left} and {right}"),
                    );
                    return None;
                }
                if op == BinaryOp::Div {
                    if right_expr.is_literal_zero() {
                        self.error(line, "division by zero");
                    }
                    return Some(DataType::Decimal);
                }
                Some(left.widen(right))
            }
            OpClass::Logical => {
                if left != DataType::Booleano || right != DataType::Booleano {
                    self.error(
                        line,
                        format!("operator '{op}' requires booleano operands, found {left} and {right}"),
                    );
                    return None;
                }
                Some(DataType::Booleano)
            }
            OpClass::Relational | OpClass::Equality => {
                if left != right {
                    self.error(
                        line,
                        format!("cannot compare {left} with {right} using '{op}'"),
                    );
                    return None;
                }
                Some(DataType::Booleano)
            }
        }
    }

    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.ctx.diagnostics.push(Phase::Semantic, line, message);
    }
}

/// Проверить программу в контексте компиляции.
pub fn analyze(program: &Program, ctx: &mut CompilationContext) {
    SemanticAnalyzer::new(ctx).analyze(program);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check(source: &str) -> Vec<(usize, String)> {
        let mut ctx = CompilationContext::new();
        let program = parse(source, &mut ctx);
        assert!(
            ctx.diagnostics.is_empty(),
            "unexpected syntax errors: {:?}",
            ctx.diagnostics
        );
        analyze(&program, &mut ctx);
        ctx.diagnostics
            .iter()
            .map(|d| {
                assert_eq!(d.phase, Phase::Semantic);
                (d.line, d.message.clone())
            })
            .collect()
    }

    #[test]
    fn test_valid_program_has_no_diagnostics() {
        let source = "\
inicio
    entero x = 3;
    decimal y = x;
    constante NOMBRE = \"Ana\";
    booleano b = x > 1 AND NOT (y == 2.5);
    si (b) entonces mostrar(NOMBRE, x + y); fin_si
    para i desde 1 hasta x hacer mostrar(i % 2); fin_para
    repetir x = x - 1; hasta_que (x <= 0);
fin";
        assert_eq!(check(source), vec![]);
    }

    #[test]
    fn test_lattice_in_declarations() {
        let errors = check("entero a = 1.5;\ncadena s = 3;\ndecimal d = 2;");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].0, 1);
        assert_eq!(errors[1].0, 2);
    }

    #[test]
    fn test_redeclaration() {
        let errors = check("entero a;\ndecimal a;\nconstante a = 1;");
        assert_eq!(errors.len(), 2);
        assert!(errors[0].1.contains("line 1"));
    }

    #[test]
    fn test_initializer_checked_before_registration() {
        let errors = check("entero a = a + 1;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("undeclared identifier 'a'"));
    }

    #[test]
    fn test_constant_reassignment() {
        let errors = check("constante x = 5;\nx = 6;");
        assert_eq!(errors, vec![(2, "cannot assign to constant 'x'".to_string())]);
    }

    #[test]
    fn test_assignment_rules() {
        let errors = check("entero x;\nx = verdadero;\ny = 1;\ndecimal d;\nd = x;");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].0, 2);
        assert!(errors[1].1.contains("undeclared variable 'y'"));
    }

    #[test]
    fn test_condition_must_be_boolean() {
        let errors = check("mientras (1) hacer mostrar(1); fin_mientras");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("booleano"));
    }

    #[test]
    fn test_division_by_literal_zero() {
        let errors = check("mostrar(5 / 0);");
        assert_eq!(errors, vec![(1, "division by zero".to_string())]);
    }

    #[test]
    fn test_division_by_negated_zero() {
        assert_eq!(check("mostrar(5 / -0);"), vec![(1, "division by zero".to_string())]);
        assert_eq!(check("mostrar(5.0 / -0.0);"), vec![(1, "division by zero".to_string())]);
        assert_eq!(check("mostrar(5 % -0);"), vec![(1, "modulo by zero".to_string())]);
    }

    #[test]
    fn test_long_operator_chain() {
        let source = format!("entero x = 1{};", " + 1".repeat(100_000));
        assert!(check(&source).is_empty());
    }

    #[test]
    fn test_division_is_decimal() {
        let errors = check("entero x = 4 / 2;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("decimal value"));
    }

    #[test]
    fn test_modulo_requires_integers() {
        let errors = check("mostrar(5.0 % 2);\nmostrar(5 % 0);");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].1, "modulo by zero");
    }

    #[test]
    fn test_inverted_range_without_step() {
        let errors = check("para i desde 5 hasta 1 hacer mostrar(i); fin_para");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("5..1"));

        assert!(check("para i desde 5 hasta 1 con_paso -1 hacer mostrar(i); fin_para").is_empty());
    }

    #[test]
    fn test_for_step_and_variable() {
        let errors = check(
            "para i desde 1 hasta 3 con_paso 0 hacer fin_para\n\
             constante K = 1;\n\
             para K desde 1 hasta 3 hacer fin_para\n\
             cadena s;\n\
             para s desde 1 hasta 3 hacer fin_para",
        );
        assert_eq!(errors.len(), 3);
        assert!(errors[0].1.contains("zero"));
        assert!(errors[1].1.contains("constant"));
        assert!(errors[2].1.contains("must be entero"));
    }

    #[test]
    fn test_undeclared_suppresses_cascade() {
        let errors = check("mostrar((z + 1) * 2 > 3 AND verdadero);");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("'z'"));
    }

    #[test]
    fn test_comparison_requires_same_types() {
        let errors = check("mostrar(1 == \"1\");\nmostrar(1 < 2.0);");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_unary_operands() {
        let errors = check("mostrar(NOT 1);\nmostrar(-verdadero);\nmostrar(-2.5, NOT falso);");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_empty_print() {
        let errors = check("mostrar();");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_binary_type_is_memoized() {
        let mut ctx = CompilationContext::new();
        let program = parse("mostrar(1 + 2.0);", &mut ctx);
        analyze(&program, &mut ctx);
        match &program.statements[0] {
            Stmt::Print { exprs, .. } => match &exprs[0] {
                Expr::Binary { ty, .. } => assert_eq!(ty.get(), Some(&Some(DataType::Decimal))),
                other => panic!("Expected Binary, got {:?}", other),
            },
            other => panic!("Expected Print, got {:?}", other),
        }
    }

    #[test]
    fn test_analysis_continues_after_syntax_errors() {
        let mut ctx = CompilationContext::new();
        let program = parse("entero = 1;\nmostrar(q);", &mut ctx);
        analyze(&program, &mut ctx);
        assert!(ctx.diagnostics.has_phase(Phase::Syntactic));
        assert!(ctx.diagnostics.has_phase(Phase::Semantic));
    }
}
