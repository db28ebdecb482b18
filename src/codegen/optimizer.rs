//! Удаление мёртвого кода по зависимостям.
//!
//! Анализ нечувствителен к потоку управления: место существенно, если его
//! значение может попасть в `print` или в условие ветвления - напрямую или
//! через цепочку присваиваний. Присваивания несущественным местам удаляются,
//! кроме тех, что могут упасть при выполнении (деление и остаток на
//! неконстантный делитель): их ошибка остаётся наблюдаемой.

use std::collections::HashSet;

use super::ir::{Instr, Op, Place};

/// Множество существенных мест (неподвижная точка).
pub fn essential_places(code: &[Instr]) -> HashSet<Place> {
    let mut essential: HashSet<Place> = code
        .iter()
        .filter(|instr| matches!(instr.op, Op::Print(_) | Op::If(_)))
        .flat_map(|instr| instr.op.reads())
        .filter_map(|operand| operand.as_place().cloned())
        .collect();

    for instr in code {
        if let Op::Assign { value, .. } = &instr.op {
            if value.may_fault() {
                essential.extend(
                    value
                        .operands()
                        .into_iter()
                        .filter_map(|operand| operand.as_place().cloned()),
                );
            }
        }
    }

    loop {
        let before = essential.len();
        for instr in code {
            if let Op::Assign { dest, value } = &instr.op {
                if essential.contains(dest) {
                    for operand in value.operands() {
                        if let Some(place) = operand.as_place() {
                            essential.insert(place.clone());
                        }
                    }
                }
            }
        }
        if essential.len() == before {
            return essential;
        }
    }
}

/// Удалить присваивания несущественным местам.
///
/// Управляющие инструкции, `print`, `break` и `pass` сохраняются всегда.
/// Блок, оставшийся без тела, получает `pass`.
pub fn optimize(code: Vec<Instr>) -> Vec<Instr> {
    let essential = essential_places(&code);
    let before = code.len();

    let kept: Vec<Instr> = code
        .into_iter()
        .filter(|instr| match &instr.op {
            Op::Assign { dest, value } => essential.contains(dest) || value.may_fault(),
            _ => true,
        })
        .collect();

    let mut out = Vec::with_capacity(kept.len());
    for (i, instr) in kept.iter().enumerate() {
        out.push(instr.clone());
        if instr.op.opens_block() {
            let has_body = kept.get(i + 1).is_some_and(|next| next.depth > instr.depth);
            if !has_body {
                out.push(Instr::new(instr.depth + 1, Op::Pass, instr.line));
            }
        }
    }

    log::debug!(
        "optimizer kept {} of {} instructions ({} essential places)",
        out.len(),
        before,
        essential.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generator::generate;
    use crate::codegen::ir::listing;
    use crate::context::CompilationContext;
    use crate::parser::parse;

    fn optimized(source: &str) -> String {
        let mut ctx = CompilationContext::new();
        let program = parse(source, &mut ctx);
        let code = generate(&program, &mut ctx).unwrap();
        listing(&optimize(code))
    }

    #[test]
    fn test_removes_unused_assignments() {
        assert_eq!(
            optimized("entero a = 1; entero b = a * 2; entero c = 5; mostrar(c);"),
            "c = 5\nprint c\n"
        );
    }

    #[test]
    fn test_keeps_transitive_dependencies() {
        assert_eq!(
            optimized("entero a = 1; entero b = a + 1; mostrar(b);"),
            "a = 1\nt0 = a + 1\nb = t0\nprint b\n"
        );
    }

    #[test]
    fn test_keeps_condition_dependencies() {
        let out = optimized("entero x = 0; mientras (x < 2) hacer x = x + 1; fin_mientras");
        assert!(out.contains("x = 0"));
        assert!(out.contains("x = t2"));
    }

    #[test]
    fn test_inserts_pass_into_emptied_block() {
        assert_eq!(
            optimized("entero x = 0; si (verdadero) entonces x = 1; fin_si"),
            "if verdadero goto block\n    pass\nend\n"
        );
    }

    #[test]
    fn test_emptied_loop_body_keeps_exit() {
        let out = optimized("para i desde 1 hasta 3 hacer entero basura = i; fin_para");
        assert!(out.contains("break"));
        assert!(out.contains("i = i + 1"));
        assert!(!out.contains("basura"));
    }

    #[test]
    fn test_keeps_dead_division_by_variable() {
        assert_eq!(
            optimized("entero a = 0; entero b = 7 % a; mostrar(1);"),
            "a = 0\nt0 = 7 % a\nprint 1\n"
        );
    }

    #[test]
    fn test_drops_dead_division_by_nonzero_constant() {
        assert_eq!(
            optimized("entero a = 4; entero b = a / 2; decimal c = a / 0.5; mostrar(1);"),
            "print 1\n"
        );
    }

    #[test]
    fn test_essential_fixpoint() {
        let mut ctx = CompilationContext::new();
        let program = parse(
            "entero a = 1; entero b = a; entero c = b; entero d = 9; mostrar(c);",
            &mut ctx,
        );
        let code = generate(&program, &mut ctx).unwrap();
        let essential = essential_places(&code);
        for name in ["a", "b", "c"] {
            assert!(essential.contains(&Place::Var(name.into())));
        }
        assert!(!essential.contains(&Place::Var("d".into())));
    }
}
