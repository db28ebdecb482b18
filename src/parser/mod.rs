//! Фронтенд: лексер и парсер исходного языка.
//!
//! # Синтаксис
//!
//! ```text
//! inicio
//!     entero x = 10;
//!     constante LIMITE = 3;
//!     si (x > LIMITE) entonces
//!         mostrar("grande", x);
//!     sino
//!         mostrar("pequeño");
//!     fin_si
//!     para i desde 1 hasta LIMITE hacer
//!         mostrar(i);
//!     fin_para
//! fin
//! ```
//!
//! # Пример
//!
//! ```rust
//! use psc_lang::context::CompilationContext;
//! use psc_lang::parser::parse;
//!
//! let mut ctx = CompilationContext::new();
//! let program = parse("mostrar(1 + 2);", &mut ctx);
//! assert_eq!(program.statements.len(), 1);
//! assert!(ctx.diagnostics.is_empty());
//! ```

pub mod error;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod token;

pub use error::ParseError;
pub use lexer::{tokenize, LexError, Lexer};
pub use parser::Parser;
pub use token::{Token, TokenKind};

use crate::ast::Program;
use crate::context::CompilationContext;

/// Разобрать исходный текст в AST.
///
/// Лексические и синтаксические ошибки записываются в диагностики
/// контекста; дерево возвращается всегда, с узлами `Stmt::Error` на месте
/// испорченных инструкций.
pub fn parse(source: &str, ctx: &mut CompilationContext) -> Program {
    let tokens = tokenize(source, &mut ctx.diagnostics);
    Parser::new(tokens, &mut ctx.diagnostics).parse_program()
}
