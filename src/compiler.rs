//! Драйвер компилятора.
//!
//! Конвейер: лексер → парсер → семантический анализ → [шлюз: нет
//! диагностик] → генерация IR → оптимизация → трансляция → песочница.
//! Каждый запуск получает свежий [`CompilationContext`]. Паника внутри
//! стадии перехватывается и превращается в одну диагностику этой стадии.

use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ast::Program;
use crate::codegen::{self, Instr, Translation};
use crate::context::CompilationContext;
use crate::diagnostics::{self, Diagnostic, Diagnostics, Phase};
use crate::error::{PscError, PscResult};
use crate::executor::{self, Executor};
use crate::parser::{tokenize, Parser, Token};
use crate::semantic;

/// Настройки запуска.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Включить удаление мёртвого кода.
    pub optimize: bool,
    /// Таймаут выполнения.
    pub timeout: Duration,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            timeout: executor::DEFAULT_TIMEOUT,
        }
    }
}

/// Итог `compile_and_run`: диагностики и захваченный вывод.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompileOutcome {
    pub diagnostics: Vec<Diagnostic>,
    pub captured_output: String,
}

impl CompileOutcome {
    /// Нет ни одной диагностики.
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Диагностики, сгруппированные по стадиям.
    pub fn by_phase(&self) -> BTreeMap<Phase, Vec<&Diagnostic>> {
        diagnostics::group_by_phase(&self.diagnostics)
    }
}

/// Промежуточные артефакты одной компиляции.
#[derive(Debug)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    pub program: Program,
    /// IR до оптимизации (пусто, если шлюз не пройден).
    pub ir: Vec<Instr>,
    /// IR после оптимизации (совпадает с `ir`, если оптимизатор выключен).
    pub optimized: Vec<Instr>,
    pub translation: Option<Translation>,
    pub diagnostics: Diagnostics,
}

/// Компилятор с настройками.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Прогнать конвейер до трансляции включительно.
    pub fn compile(&self, source: &str) -> Compilation {
        let mut ctx = CompilationContext::new();
        let mut compilation = Compilation {
            tokens: Vec::new(),
            program: Program {
                statements: Vec::new(),
                line: 1,
            },
            ir: Vec::new(),
            optimized: Vec::new(),
            translation: None,
            diagnostics: Diagnostics::new(),
        };

        let Some(tokens) = contain(Phase::Lexical, &mut ctx, |ctx| {
            tokenize(source, &mut ctx.diagnostics)
        }) else {
            return finish(compilation, ctx);
        };
        compilation.tokens = tokens;

        let tokens = compilation.tokens.clone();
        let Some(program) = contain(Phase::Syntactic, &mut ctx, |ctx| {
            Parser::new(tokens, &mut ctx.diagnostics).parse_program()
        }) else {
            return finish(compilation, ctx);
        };
        compilation.program = program;

        let program = &compilation.program;
        if contain(Phase::Semantic, &mut ctx, |ctx| semantic::analyze(program, ctx)).is_none() {
            return finish(compilation, ctx);
        }

        if !ctx.diagnostics.is_empty() {
            log::info!(
                "code generation skipped: {} diagnostic(s) from the front end",
                ctx.diagnostics.len()
            );
            return finish(compilation, ctx);
        }

        let ir = match contain(Phase::Codegen, &mut ctx, |ctx| codegen::generate(program, ctx)) {
            Some(Ok(ir)) => ir,
            Some(Err(err)) => {
                let line = match err {
                    PscError::ErrorNodeInCodegen(line) => line,
                    _ => 0,
                };
                ctx.diagnostics.push(Phase::Codegen, line, err.to_string());
                return finish(compilation, ctx);
            }
            None => return finish(compilation, ctx),
        };

        let optimized = if self.options.optimize {
            let input = ir.clone();
            match contain(Phase::Codegen, &mut ctx, |_| codegen::optimize(input)) {
                Some(optimized) => optimized,
                None => return finish(compilation, ctx),
            }
        } else {
            ir.clone()
        };
        compilation.ir = ir;
        compilation.optimized = optimized;

        let code = &compilation.optimized;
        match contain(Phase::Translation, &mut ctx, |_| codegen::translate(code)) {
            Some(Ok(translation)) => compilation.translation = Some(translation),
            Some(Err(err)) => ctx.diagnostics.push(Phase::Translation, 0, err.to_string()),
            None => {}
        }

        finish(compilation, ctx)
    }

    /// Скомпилировать и выполнить программу.
    pub fn compile_and_run(&self, source: &str) -> CompileOutcome {
        let compilation = self.compile(source);
        let mut diagnostics = compilation.diagnostics;

        let Some(translation) = compilation.translation else {
            log::info!("run finished with {} diagnostic(s)", diagnostics.len());
            return CompileOutcome {
                diagnostics: diagnostics.into_vec(),
                captured_output: String::new(),
            };
        };

        let executor = Executor::new(self.options.timeout);
        let script = translation.source.as_str();
        let execution = panic::catch_unwind(AssertUnwindSafe(|| executor.run(script)));

        let captured_output = match execution {
            Ok(execution) => {
                if let Err(err) = execution.result {
                    let line = translation.source_line(err.script_line());
                    diagnostics.push(Phase::Execution, line, err.to_string());
                }
                execution.output
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::warn!("execution panicked: {}", message);
                diagnostics.push(Phase::Execution, 0, internal_error(&message));
                String::new()
            }
        };

        log::info!(
            "run finished with {} diagnostic(s), {} byte(s) of output",
            diagnostics.len(),
            captured_output.len()
        );
        CompileOutcome {
            diagnostics: diagnostics.into_vec(),
            captured_output,
        }
    }

    /// Прочитать исходный файл, скомпилировать и выполнить.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> PscResult<CompileOutcome> {
        let source = fs::read_to_string(path.as_ref())?;
        log::debug!("read {} bytes from {}", source.len(), path.as_ref().display());
        Ok(self.compile_and_run(&source))
    }
}

/// Скомпилировать и выполнить с настройками по умолчанию.
pub fn compile_and_run(source: &str) -> CompileOutcome {
    Compiler::default().compile_and_run(source)
}

/// Скомпилировать и выполнить файл с настройками по умолчанию.
pub fn compile_file(path: impl AsRef<Path>) -> PscResult<CompileOutcome> {
    Compiler::default().compile_file(path)
}

fn finish(mut compilation: Compilation, ctx: CompilationContext) -> Compilation {
    compilation.diagnostics = ctx.diagnostics;
    compilation
}

/// Выполнить стадию, превратив панику в диагностику этой стадии.
fn contain<T>(
    phase: Phase,
    ctx: &mut CompilationContext,
    stage: impl FnOnce(&mut CompilationContext) -> T,
) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(|| stage(&mut *ctx))) {
        Ok(value) => Some(value),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::warn!("{} stage panicked: {}", phase, message);
            ctx.diagnostics.push(phase, 0, internal_error(&message));
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn internal_error(message: &str) -> String {
    format!("internal compiler error: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_exposes_artifacts() {
        let compilation = Compiler::default().compile("entero x = 2; entero y = 3; mostrar(x);");
        assert!(compilation.diagnostics.is_empty());
        assert_eq!(compilation.program.statements.len(), 3);
        assert!(compilation.optimized.len() < compilation.ir.len());
        let translation = compilation.translation.unwrap();
        assert_eq!(translation.source, "v_x = 2\nprint(v_x)\n");
    }

    #[test]
    fn test_gate_blocks_codegen() {
        let compilation = Compiler::default().compile("mostrar(z);");
        assert_eq!(compilation.diagnostics.len(), 1);
        assert!(compilation.ir.is_empty());
        assert!(compilation.translation.is_none());
    }

    #[test]
    fn test_no_opt_keeps_dead_code() {
        let options = CompileOptions {
            optimize: false,
            ..CompileOptions::default()
        };
        let compilation = Compiler::new(options).compile("entero y = 3; mostrar(1);");
        assert_eq!(compilation.ir, compilation.optimized);
        assert!(compilation.translation.unwrap().source.contains("v_y = 3"));
    }

    #[test]
    fn test_runtime_error_maps_to_source_line() {
        let source = "inicio\nentero a = 0;\nmostrar(\"antes\");\nmostrar(10 / a);\nfin";
        let outcome = compile_and_run(source);
        assert_eq!(outcome.captured_output, "antes\n");
        assert_eq!(outcome.diagnostics.len(), 1);
        let diagnostic = &outcome.diagnostics[0];
        assert_eq!(diagnostic.phase, Phase::Execution);
        assert_eq!(diagnostic.line, 4);
        assert!(diagnostic.message.contains("ZeroDivisionError"));
    }

    #[test]
    fn test_contain_turns_panic_into_diagnostic() {
        let mut ctx = CompilationContext::new();
        let result: Option<()> = contain(Phase::Codegen, &mut ctx, |_| panic!("boom"));
        assert!(result.is_none());
        let diagnostic = ctx.diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.phase, Phase::Codegen);
        assert_eq!(diagnostic.message, "internal compiler error: boom");
    }

    #[test]
    fn test_outcome_groups_by_phase() {
        let outcome = compile_and_run("entero = 1;\nmostrar(q);\n@");
        let groups = outcome.by_phase();
        assert!(groups.contains_key(&Phase::Lexical));
        assert!(groups.contains_key(&Phase::Syntactic));
        assert!(groups.contains_key(&Phase::Semantic));
        assert!(!outcome.is_success());
    }
}
