//! Генерация трёхадресного кода из AST.
//!
//! Вызывается только для программ без диагностик. Встреча с узлом
//! `Stmt::Error` означает нарушение этого условия и останавливает конвейер.

use super::ir::{Instr, Op, Operand, Place, Rvalue};
use crate::ast::{BinaryOp, Expr, Literal, Program, Stmt, UnaryOp};
use crate::context::CompilationContext;
use crate::error::{PscError, PscResult};

// 64KB red zone, 1MB stack growth
const RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

/// Генератор IR.
pub struct IrGenerator<'c> {
    ctx: &'c mut CompilationContext,
    code: Vec<Instr>,
    depth: usize,
}

impl<'c> IrGenerator<'c> {
    pub fn new(ctx: &'c mut CompilationContext) -> Self {
        Self {
            ctx,
            code: Vec::new(),
            depth: 0,
        }
    }

    /// Понизить программу в последовательность инструкций.
    pub fn generate(mut self, program: &Program) -> PscResult<Vec<Instr>> {
        for stmt in &program.statements {
            self.lower_stmt(stmt)?;
        }
        log::debug!(
            "generated {} IR instructions, {} temporaries",
            self.code.len(),
            self.ctx.temps_issued()
        );
        Ok(self.code)
    }

    fn emit(&mut self, op: Op, line: usize) {
        self.code.push(Instr::new(self.depth, op, line));
    }

    fn emit_assign(&mut self, dest: Place, value: Rvalue, line: usize) {
        self.emit(Op::Assign { dest, value }, line);
    }

    /// Тело блока на уровень глубже; пустое тело получает `pass`.
    fn lower_body(&mut self, body: &[Stmt], line: usize) -> PscResult<()> {
        self.depth += 1;
        let start = self.code.len();
        for stmt in body {
            self.lower_stmt(stmt)?;
        }
        if self.code.len() == start {
            self.emit(Op::Pass, line);
        }
        self.depth -= 1;
        Ok(())
    }

    /// `if cond: break` на текущей глубине.
    fn emit_break_if(&mut self, cond: Operand, line: usize) {
        self.emit(Op::If(cond), line);
        self.depth += 1;
        self.emit(Op::Break, line);
        self.depth -= 1;
        self.emit(Op::End, line);
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> PscResult<()> {
        match stmt {
            Stmt::VarDecl {
                ty,
                name,
                init,
                line,
            } => {
                let value = match init {
                    Some(expr) => self.lower_expr(expr)?,
                    None => Operand::Const(Literal::zero_of(*ty)),
                };
                self.emit_assign(Place::Var(name.clone()), Rvalue::Copy(value), *line);
            }

            Stmt::ConstDecl { name, init, line } => {
                let value = self.lower_expr(init)?;
                self.emit_assign(Place::Var(name.clone()), Rvalue::Copy(value), *line);
            }

            Stmt::Assign { name, expr, line } => {
                let value = self.lower_expr(expr)?;
                self.emit_assign(Place::Var(name.clone()), Rvalue::Copy(value), *line);
            }

            Stmt::If {
                cond,
                then_body,
                else_body,
                line,
            } => {
                let cond = self.lower_expr(cond)?;
                self.emit(Op::If(cond), *line);
                self.lower_body(then_body, *line)?;
                if let Some(else_body) = else_body {
                    self.emit(Op::Else, *line);
                    self.lower_body(else_body, *line)?;
                }
                self.emit(Op::End, *line);
            }

            Stmt::While { cond, body, line } => {
                self.emit(Op::Loop, *line);
                self.depth += 1;
                let cond = self.lower_expr(cond)?;
                let exit = self.negate(cond, *line);
                self.emit_break_if(exit, *line);
                self.depth -= 1;
                self.lower_body(body, *line)?;
                self.emit(Op::End, *line);
            }

            Stmt::DoUntil { body, cond, line } => {
                self.emit(Op::Loop, *line);
                self.lower_body(body, *line)?;
                self.depth += 1;
                let cond = self.lower_expr(cond)?;
                self.emit_break_if(cond, *line);
                self.depth -= 1;
                self.emit(Op::End, *line);
            }

            Stmt::For {
                var,
                from,
                to,
                step,
                body,
                line,
            } => {
                let start = self.lower_expr(from)?;
                self.emit_assign(Place::Var(var.clone()), Rvalue::Copy(start), *line);
                let end = self.lower_expr(to)?;
                let limit = self.ctx.fresh_temp();
                self.emit_assign(Place::Temp(limit), Rvalue::Copy(end), *line);

                self.emit(Op::Loop, *line);
                self.depth += 1;
                let exit = self.ctx.fresh_temp();
                self.emit_assign(
                    Place::Temp(exit),
                    Rvalue::Binary {
                        op: BinaryOp::Gt,
                        left: Operand::var(var.as_str()),
                        right: Operand::temp(limit),
                    },
                    *line,
                );
                self.emit_break_if(Operand::temp(exit), *line);
                self.depth -= 1;

                self.lower_body(body, *line)?;

                self.depth += 1;
                let increment = match step {
                    Some(step) => self.lower_expr(step)?,
                    None => Operand::Const(Literal::Entero(1)),
                };
                self.emit_assign(
                    Place::Var(var.clone()),
                    Rvalue::Binary {
                        op: BinaryOp::Add,
                        left: Operand::var(var.as_str()),
                        right: increment,
                    },
                    *line,
                );
                self.depth -= 1;
                self.emit(Op::End, *line);
            }

            Stmt::Print { exprs, line } => {
                let args = exprs
                    .iter()
                    .map(|expr| self.lower_expr(expr))
                    .collect::<PscResult<Vec<_>>>()?;
                self.emit(Op::Print(args), *line);
            }

            Stmt::Error { line, .. } => return Err(PscError::ErrorNodeInCodegen(*line)),
        }
        Ok(())
    }

    fn negate(&mut self, operand: Operand, line: usize) -> Operand {
        let temp = self.ctx.fresh_temp();
        self.emit_assign(
            Place::Temp(temp),
            Rvalue::Unary {
                op: UnaryOp::Not,
                operand,
            },
            line,
        );
        Operand::temp(temp)
    }

    /// Понизить выражение: операнды раньше операции.
    fn lower_expr(&mut self, expr: &Expr) -> PscResult<Operand> {
        match expr {
            Expr::Literal { value, .. } => Ok(Operand::Const(value.clone())),
            Expr::Identifier { name, .. } => Ok(Operand::var(name.as_str())),
            Expr::Unary { op, expr, line } => {
                let operand = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.lower_expr(expr))?;
                let temp = self.ctx.fresh_temp();
                self.emit_assign(Place::Temp(temp), Rvalue::Unary { op: *op, operand }, *line);
                Ok(Operand::temp(temp))
            }
            Expr::Binary {
                op,
                left,
                right,
                line,
                ..
            } => {
                let (left, right) = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || {
                    Ok::<_, PscError>((self.lower_expr(left)?, self.lower_expr(right)?))
                })?;
                let temp = self.ctx.fresh_temp();
                self.emit_assign(
                    Place::Temp(temp),
                    Rvalue::Binary {
                        op: *op,
                        left,
                        right,
                    },
                    *line,
                );
                Ok(Operand::temp(temp))
            }
        }
    }
}

/// Сгенерировать IR для программы.
pub fn generate(program: &Program, ctx: &mut CompilationContext) -> PscResult<Vec<Instr>> {
    IrGenerator::new(ctx).generate(program)
}
