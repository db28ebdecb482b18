//! Ошибки парсера.
//!
//! Ошибка никогда не выходит за пределы парсера: на уровне инструкции она
//! превращается в диагностику и узел [`Stmt::Error`](crate::ast::Stmt::Error).

use thiserror::Error;

use super::token::{Token, TokenKind};

/// Ошибка разбора.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Неожиданный токен.
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        line: usize,
        expected: String,
        found: String,
    },

    /// Блок закрыт чужим ключевым словом или не закрыт вовсе.
    /// `line` - строка открывающего ключевого слова.
    #[error("'{construct}' is not closed: expected {closer}, found {found} on line {found_line}")]
    UnclosedBlock {
        line: usize,
        construct: &'static str,
        closer: TokenKind,
        found: String,
        found_line: usize,
    },

    /// Цепочка неассоциативных операторов (`a < b < c`).
    #[error("comparison operators cannot be chained: unexpected '{op}'")]
    ChainedComparison { line: usize, op: String },

    /// Токен не может начинать инструкцию.
    #[error("unexpected {found} at start of statement")]
    UnexpectedStatement { line: usize, found: String },

    /// Лишние токены после `fin`.
    #[error("unexpected {found} after end of program")]
    TrailingTokens { line: usize, found: String },

    /// Отсутствует `fin` у программы, начатой с `inicio`.
    #[error("program opened with 'inicio' on line {opened} is missing 'fin'")]
    MissingFin { line: usize, opened: usize },

    /// Литерал, который не удалось преобразовать.
    #[error("invalid literal {lexeme}")]
    InvalidLiteral { line: usize, lexeme: String },
}

impl ParseError {
    /// Создать ошибку «неожиданный токен».
    pub fn unexpected_token(expected: impl Into<String>, found: &Token) -> Self {
        Self::UnexpectedToken {
            line: found.line,
            expected: expected.into(),
            found: found.describe(),
        }
    }

    /// Получить строку ошибки.
    pub fn line(&self) -> usize {
        match self {
            Self::UnexpectedToken { line, .. } => *line,
            Self::UnclosedBlock { line, .. } => *line,
            Self::ChainedComparison { line, .. } => *line,
            Self::UnexpectedStatement { line, .. } => *line,
            Self::TrailingTokens { line, .. } => *line,
            Self::MissingFin { line, .. } => *line,
            Self::InvalidLiteral { line, .. } => *line,
        }
    }
}
