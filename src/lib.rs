//! # PSC
//!
//! Компилятор учебного псевдокода с испанскими ключевыми словами
//! (`inicio`, `si`, `mientras`, `para`, `mostrar`, ...). Программа проходит
//! лексер, восстанавливающийся после ошибок парсер, семантический анализ,
//! генерацию трёхадресного кода, удаление мёртвого кода и трансляцию в
//! подмножество Python, которое выполняется во встроенной песочнице с
//! таймаутом.
//!
//! ## Основные модули
//!
//! - [`parser`] - лексер и парсер с восстановлением после ошибок
//! - [`ast`] - синтаксическое дерево
//! - [`semantic`] - проверка объявлений и типов
//! - [`codegen`] - TAC, оптимизатор и транслятор
//! - [`executor`] - песочница для сгенерированного скрипта
//! - [`compiler`] - драйвер конвейера
//!
//! ## Пример
//!
//! ```rust
//! use psc_lang::compile_and_run;
//!
//! let outcome = compile_and_run("inicio entero x = 5; mostrar(x * 2); fin");
//! assert!(outcome.diagnostics.is_empty());
//! assert_eq!(outcome.captured_output, "10\n");
//! ```

// === Фронтенд ===
pub mod ast;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod parser;
pub mod semantic;
pub mod types;

// === Бэкенд ===
pub mod codegen;
pub mod compiler;
pub mod executor;

// === Re-exports для удобства ===
pub use compiler::{
    compile_and_run, compile_file, CompileOptions, CompileOutcome, Compilation, Compiler,
};
pub use context::CompilationContext;
pub use diagnostics::{Diagnostic, Diagnostics, Phase};
pub use error::{PscError, PscResult};
pub use types::DataType;
