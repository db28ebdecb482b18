//! Трансляция IR в текст целевого скрипта.
//!
//! Отступы восстанавливаются только по счётчику глубины, который двигают
//! маркеры блоков: `If`/`Loop` открывают уровень, `Else` закрывает и снова
//! открывает, `End` закрывает. Глубина инструкций IR не используется.

use super::ir::{Instr, Op, Operand, Place, Rvalue};
use crate::ast::{BinaryOp, Literal, UnaryOp};
use crate::error::{PscError, PscResult};
use crate::executor::value::format_float;

const INDENT: &str = "    ";

/// Результат трансляции.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Translation {
    /// Текст целевого скрипта.
    pub source: String,
    /// `line_map[i]` - исходная строка для строки `i + 1` скрипта.
    pub line_map: Vec<usize>,
}

impl Translation {
    /// Исходная строка по номеру строки скрипта (с единицы).
    pub fn source_line(&self, target_line: usize) -> usize {
        target_line
            .checked_sub(1)
            .and_then(|i| self.line_map.get(i))
            .copied()
            .unwrap_or(0)
    }
}

/// Транслятор IR.
#[derive(Debug, Default)]
pub struct Translator {
    out: Translation,
    depth: usize,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(mut self, code: &[Instr]) -> PscResult<Translation> {
        for (index, instr) in code.iter().enumerate() {
            match &instr.op {
                Op::End => {
                    self.close(index)?;
                }
                Op::Else => {
                    self.close(index)?;
                    self.line("else:".to_string(), instr.line);
                    self.depth += 1;
                }
                Op::If(cond) => {
                    self.line(format!("if {}:", operand(cond)), instr.line);
                    self.depth += 1;
                }
                Op::Loop => {
                    self.line("while True:".to_string(), instr.line);
                    self.depth += 1;
                }
                Op::Break => self.line("break".to_string(), instr.line),
                Op::Pass => self.line("pass".to_string(), instr.line),
                Op::Print(args) => {
                    let args: Vec<String> = args.iter().map(operand).collect();
                    self.line(format!("print({})", args.join(", ")), instr.line);
                }
                Op::Assign { dest, value } => {
                    self.line(format!("{} = {}", place(dest), rvalue(value)), instr.line);
                }
            }
        }

        if self.depth != 0 {
            return Err(PscError::UnclosedBlocks(self.depth));
        }
        log::debug!("translated into {} target lines", self.out.line_map.len());
        Ok(self.out)
    }

    fn close(&mut self, index: usize) -> PscResult<()> {
        self.depth = self
            .depth
            .checked_sub(1)
            .ok_or(PscError::UnopenedBlock(index))?;
        Ok(())
    }

    fn line(&mut self, text: String, source_line: usize) {
        for _ in 0..self.depth {
            self.out.source.push_str(INDENT);
        }
        self.out.source.push_str(&text);
        self.out.source.push('\n');
        self.out.line_map.push(source_line);
    }
}

/// Оттранслировать IR в текст скрипта.
pub fn translate(code: &[Instr]) -> PscResult<Translation> {
    Translator::new().translate(code)
}

fn place(place: &Place) -> String {
    match place {
        Place::Var(name) => format!("v_{}", name),
        Place::Temp(id) => format!("t{}", id),
    }
}

fn operand(operand: &Operand) -> String {
    match operand {
        Operand::Place(p) => place(p),
        Operand::Const(literal) => literal_source(literal),
    }
}

fn rvalue(value: &Rvalue) -> String {
    match value {
        Rvalue::Copy(op) => operand(op),
        Rvalue::Binary { op, left, right } => {
            format!("{} {} {}", operand(left), binary_op(*op), operand(right))
        }
        Rvalue::Unary {
            op: UnaryOp::Not,
            operand: op,
        } => format!("not {}", operand(op)),
        Rvalue::Unary {
            op: UnaryOp::Neg,
            operand: op,
        } => format!("-{}", operand(op)),
    }
}

fn binary_op(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        other => other.symbol(),
    }
}

/// Литерал в синтаксисе скрипта.
pub fn literal_source(literal: &Literal) -> String {
    match literal {
        Literal::Entero(n) => n.to_string(),
        Literal::Decimal(x) => format_float(*x),
        Literal::Booleano(true) => "True".to_string(),
        Literal::Booleano(false) => "False".to_string(),
        Literal::Cadena(s) => escape_string(s),
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generator::generate;
    use crate::context::CompilationContext;
    use crate::parser::parse;

    fn translated(source: &str) -> Translation {
        let mut ctx = CompilationContext::new();
        let program = parse(source, &mut ctx);
        let code = generate(&program, &mut ctx).unwrap();
        translate(&code).unwrap()
    }

    #[test]
    fn test_translate_if_else() {
        let t = translated("si (verdadero) entonces mostrar(1); sino mostrar(\"no\"); fin_si");
        assert_eq!(
            t.source,
            "if True:\n    print(1)\nelse:\n    print(\"no\")\n"
        );
    }

    #[test]
    fn test_translate_loop_and_names() {
        let t = translated("entero n = 0;\nmientras (n < 2) hacer\n n = n + 1;\nfin_mientras");
        assert_eq!(
            t.source,
            "v_n = 0\nwhile True:\n    t0 = v_n < 2\n    t1 = not t0\n    if t1:\n        break\n    t2 = v_n + 1\n    v_n = t2\n"
        );
        assert_eq!(t.line_map, vec![1, 2, 2, 2, 2, 2, 3, 3]);
        assert_eq!(t.source_line(7), 3);
        assert_eq!(t.source_line(0), 0);
        assert_eq!(t.source_line(99), 0);
    }

    #[test]
    fn test_translate_literals() {
        assert_eq!(literal_source(&Literal::Decimal(2.0)), "2.0");
        assert_eq!(literal_source(&Literal::Booleano(false)), "False");
        assert_eq!(
            literal_source(&Literal::Cadena("a \"b\"\n\\".into())),
            "\"a \\\"b\\\"\\n\\\\\""
        );
    }

    #[test]
    fn test_translate_logic_operators() {
        let t = translated("booleano b = verdadero AND NOT falso;");
        assert_eq!(t.source, "t0 = not False\nt1 = True and t0\nv_b = t1\n");
    }

    #[test]
    fn test_unopened_block_is_error() {
        let code = vec![Instr::new(0, Op::End, 1)];
        assert!(matches!(translate(&code), Err(PscError::UnopenedBlock(0))));
    }

    #[test]
    fn test_unclosed_block_is_error() {
        let code = vec![
            Instr::new(0, Op::Loop, 1),
            Instr::new(1, Op::Break, 1),
        ];
        assert!(matches!(translate(&code), Err(PscError::UnclosedBlocks(1))));
    }
}
