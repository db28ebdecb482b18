//! Лексер целевого скрипта.
//!
//! Строки разбираются по одной: отступ превращается в `Indent`/`Dedent`,
//! остаток строки режется на токены через logos.

use logos::Logos;

use super::ScriptError;

/// Внутренние токены для logos.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t]+")]
#[logos(skip r"#[^\n]*")]
enum LogosToken {
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("break")]
    Break,
    #[token("pass")]
    Pass,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    NoneLit,

    // Float и Int различает самое длинное совпадение
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        Some(unescape_string(&s[1..s.len() - 1]))
    })]
    Str(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Name(String),

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("//")]
    DoubleSlash,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
}

/// Обработка escape-последовательностей в строке.
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('0') => result.push('\0'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Токен скрипта.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    If,
    Else,
    While,
    Break,
    Pass,
    And,
    Or,
    Not,
    True,
    False,
    NoneLit,
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    EqEq,
    NotEq,
    LtEq,
    GtEq,
    Lt,
    Gt,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
    Comma,
    Colon,
    /// Конец логической строки.
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl From<LogosToken> for Tok {
    fn from(token: LogosToken) -> Self {
        match token {
            LogosToken::If => Tok::If,
            LogosToken::Else => Tok::Else,
            LogosToken::While => Tok::While,
            LogosToken::Break => Tok::Break,
            LogosToken::Pass => Tok::Pass,
            LogosToken::And => Tok::And,
            LogosToken::Or => Tok::Or,
            LogosToken::Not => Tok::Not,
            LogosToken::True => Tok::True,
            LogosToken::False => Tok::False,
            LogosToken::NoneLit => Tok::NoneLit,
            LogosToken::Float(x) => Tok::Float(x),
            LogosToken::Int(n) => Tok::Int(n),
            LogosToken::Str(s) => Tok::Str(s),
            LogosToken::Name(s) => Tok::Name(s),
            LogosToken::EqEq => Tok::EqEq,
            LogosToken::NotEq => Tok::NotEq,
            LogosToken::LtEq => Tok::LtEq,
            LogosToken::GtEq => Tok::GtEq,
            LogosToken::Lt => Tok::Lt,
            LogosToken::Gt => Tok::Gt,
            LogosToken::Assign => Tok::Assign,
            LogosToken::Plus => Tok::Plus,
            LogosToken::Minus => Tok::Minus,
            LogosToken::Star => Tok::Star,
            LogosToken::DoubleSlash => Tok::DoubleSlash,
            LogosToken::Slash => Tok::Slash,
            LogosToken::Percent => Tok::Percent,
            LogosToken::LParen => Tok::LParen,
            LogosToken::RParen => Tok::RParen,
            LogosToken::Comma => Tok::Comma,
            LogosToken::Colon => Tok::Colon,
        }
    }
}

/// Токен с номером строки скрипта.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub tok: Tok,
    pub line: usize,
}

/// Разбить скрипт на токены с учётом отступов.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptError> {
    let mut tokens = Vec::new();
    let mut indents = vec![0usize];
    let mut last_line = 0;

    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        let content = text.trim_start_matches(' ');
        if content.trim().is_empty() || content.starts_with('#') {
            continue;
        }
        if content.starts_with('\t') {
            return Err(ScriptError::syntax(line, "tabs are not allowed in indentation"));
        }
        last_line = line;

        let width = text.len() - content.len();
        let current = indents.last().copied().unwrap_or(0);
        if width > current {
            indents.push(width);
            tokens.push(Spanned {
                tok: Tok::Indent,
                line,
            });
        } else {
            while width < indents.last().copied().unwrap_or(0) {
                indents.pop();
                tokens.push(Spanned {
                    tok: Tok::Dedent,
                    line,
                });
            }
            if width != indents.last().copied().unwrap_or(0) {
                return Err(ScriptError::syntax(
                    line,
                    "unindent does not match any outer indentation level",
                ));
            }
        }

        let mut lexer = LogosToken::lexer(content);
        while let Some(result) = lexer.next() {
            match result {
                Ok(token) => tokens.push(Spanned {
                    tok: token.into(),
                    line,
                }),
                Err(()) => {
                    return Err(ScriptError::syntax(
                        line,
                        format!("invalid token '{}'", lexer.slice()),
                    ))
                }
            }
        }
        tokens.push(Spanned {
            tok: Tok::Newline,
            line,
        });
    }

    for _ in 1..indents.len() {
        tokens.push(Spanned {
            tok: Tok::Dedent,
            line: last_line,
        });
    }
    tokens.push(Spanned {
        tok: Tok::Eof,
        line: last_line,
    });
    Ok(tokens)
}
