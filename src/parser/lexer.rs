//! Лексер исходного языка.
//!
//! Упорядоченная таблица (вид, шаблон): на каждой позиции шаблоны
//! проверяются по порядку, побеждает первый совпавший. Порядок -
//! часть поведения: десятичные литералы раньше целых, двухсимвольные
//! операторы раньше односимвольных, комментарий раньше `/`.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::token::{Token, TokenKind};
use crate::diagnostics::{Diagnostics, Phase};

/// Что делать с совпадением шаблона.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Пропустить (пробелы, комментарии).
    Skip,
    /// Идентификатор, затем поиск в таблице зарезервированных слов.
    Word,
    /// Фиксированный вид токена.
    Emit(TokenKind),
}

const PATTERNS: &[(Rule, &str)] = &[
    (Rule::Skip, r"^[ \t\r\n]+"),
    (Rule::Skip, r"^//[^\n]*"),
    (Rule::Emit(TokenKind::LiteralDecimal), r"^[0-9]+\.[0-9]+"),
    (Rule::Emit(TokenKind::LiteralEntero), r"^[0-9]+"),
    (Rule::Emit(TokenKind::LiteralCadena), r#"^"[^"]*""#),
    (Rule::Word, r"^[A-Za-z_][A-Za-z0-9_]*"),
    (Rule::Emit(TokenKind::EqEq), r"^=="),
    (Rule::Emit(TokenKind::NotEq), r"^!="),
    (Rule::Emit(TokenKind::GtEq), r"^>="),
    (Rule::Emit(TokenKind::LtEq), r"^<="),
    (Rule::Emit(TokenKind::Gt), r"^>"),
    (Rule::Emit(TokenKind::Lt), r"^<"),
    (Rule::Emit(TokenKind::Assign), r"^="),
    (Rule::Emit(TokenKind::Plus), r"^\+"),
    (Rule::Emit(TokenKind::Minus), r"^-"),
    (Rule::Emit(TokenKind::Star), r"^\*"),
    (Rule::Emit(TokenKind::Slash), r"^/"),
    (Rule::Emit(TokenKind::Percent), r"^%"),
    (Rule::Emit(TokenKind::LParen), r"^\("),
    (Rule::Emit(TokenKind::RParen), r"^\)"),
    (Rule::Emit(TokenKind::Comma), r"^,"),
    (Rule::Emit(TokenKind::Semicolon), r"^;"),
];

static TABLE: LazyLock<Vec<(Rule, Regex)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .map(|(rule, pattern)| {
            let regex = Regex::new(pattern)
                .unwrap_or_else(|e| panic!("invalid token pattern {pattern}: {e}"));
            (*rule, regex)
        })
        .collect()
});

/// Лексическая ошибка.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, line: usize },

    #[error("integer literal {lexeme} is out of range")]
    IntegerOutOfRange { lexeme: String, line: usize },

    #[error("decimal literal {lexeme} is out of range")]
    DecimalOutOfRange { lexeme: String, line: usize },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::UnexpectedChar { line, .. }
            | LexError::IntegerOutOfRange { line, .. }
            | LexError::DecimalOutOfRange { line, .. } => *line,
        }
    }
}

/// Лексер исходного языка.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    /// Создать новый лексер.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
        }
    }

    /// Текущий номер строки.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Получить следующий токен. После ошибки лексер уже сдвинут вперёд,
    /// так что вызов можно просто повторить.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            let rest = &self.source[self.pos..];
            if rest.is_empty() {
                return Ok(Token::new(TokenKind::Eof, "", self.line));
            }

            let matched = TABLE
                .iter()
                .find_map(|(rule, regex)| regex.find(rest).map(|m| (*rule, m.as_str())));

            let Some((rule, lexeme)) = matched else {
                let ch = rest.chars().next().unwrap_or('\0');
                self.pos += ch.len_utf8().max(1);
                return Err(LexError::UnexpectedChar {
                    ch,
                    line: self.line,
                });
            };

            let line = self.line;
            self.pos += lexeme.len();
            self.line += lexeme.matches('\n').count();

            match rule {
                Rule::Skip => continue,
                Rule::Word => {
                    let kind = TokenKind::keyword(lexeme).unwrap_or(TokenKind::Identificador);
                    return Ok(Token::new(kind, lexeme, line));
                }
                Rule::Emit(TokenKind::LiteralEntero) => {
                    if lexeme.parse::<i64>().is_err() {
                        return Err(LexError::IntegerOutOfRange {
                            lexeme: lexeme.to_string(),
                            line,
                        });
                    }
                    return Ok(Token::new(TokenKind::LiteralEntero, lexeme, line));
                }
                Rule::Emit(TokenKind::LiteralDecimal) => {
                    if !lexeme.parse::<f64>().is_ok_and(f64::is_finite) {
                        return Err(LexError::DecimalOutOfRange {
                            lexeme: lexeme.to_string(),
                            line,
                        });
                    }
                    return Ok(Token::new(TokenKind::LiteralDecimal, lexeme, line));
                }
                Rule::Emit(kind) => return Ok(Token::new(kind, lexeme, line)),
            }
        }
    }
}

/// Разбить исходный текст на токены. Ошибки попадают в `diagnostics`,
/// разбор никогда не прерывается. Последний токен всегда `Eof`.
pub fn tokenize(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();

    loop {
        match lexer.next_token() {
            Ok(token) => {
                let at_end = token.kind == TokenKind::Eof;
                tokens.push(token);
                if at_end {
                    break;
                }
            }
            Err(err) => diagnostics.push(Phase::Lexical, err.line(), err.to_string()),
        }
    }

    log::debug!("lexer produced {} tokens", tokens.len());
    tokens
}
