//! Токены исходного языка.

use std::fmt;

use crate::types::DataType;

/// Вид токена.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Границы программы
    Inicio,
    Fin,

    // Объявления
    Type(DataType),
    Constante,

    // Условие
    Si,
    Entonces,
    Sino,
    FinSi,

    // Циклы
    Mientras,
    Hacer,
    FinMientras,
    Para,
    Desde,
    Hasta,
    ConPaso,
    FinPara,
    Repetir,
    HastaQue,

    Mostrar,

    // Логические операторы
    And,
    Or,
    Not,

    // Литералы и имена
    LiteralEntero,
    LiteralDecimal,
    LiteralCadena,
    LiteralBooleano,
    Identificador,

    // Операторы
    EqEq,
    NotEq,
    GtEq,
    LtEq,
    Gt,
    Lt,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Разделители
    LParen,
    RParen,
    Comma,
    Semicolon,

    /// Конец файла
    Eof,
}

/// Таблица зарезервированных слов (точное написание, с учётом регистра).
pub const RESERVED_WORDS: &[(&str, TokenKind)] = &[
    ("inicio", TokenKind::Inicio),
    ("fin", TokenKind::Fin),
    ("entero", TokenKind::Type(DataType::Entero)),
    ("decimal", TokenKind::Type(DataType::Decimal)),
    ("cadena", TokenKind::Type(DataType::Cadena)),
    ("booleano", TokenKind::Type(DataType::Booleano)),
    ("constante", TokenKind::Constante),
    ("si", TokenKind::Si),
    ("entonces", TokenKind::Entonces),
    ("sino", TokenKind::Sino),
    ("fin_si", TokenKind::FinSi),
    ("mientras", TokenKind::Mientras),
    ("hacer", TokenKind::Hacer),
    ("fin_mientras", TokenKind::FinMientras),
    ("para", TokenKind::Para),
    ("desde", TokenKind::Desde),
    ("hasta", TokenKind::Hasta),
    ("con_paso", TokenKind::ConPaso),
    ("fin_para", TokenKind::FinPara),
    ("repetir", TokenKind::Repetir),
    ("hasta_que", TokenKind::HastaQue),
    ("mostrar", TokenKind::Mostrar),
    ("AND", TokenKind::And),
    ("OR", TokenKind::Or),
    ("NOT", TokenKind::Not),
    ("verdadero", TokenKind::LiteralBooleano),
    ("falso", TokenKind::LiteralBooleano),
];

impl TokenKind {
    /// Переклассифицировать идентификатор по таблице зарезервированных слов.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        RESERVED_WORDS
            .iter()
            .find(|(word, _)| *word == ident)
            .map(|(_, kind)| *kind)
    }

    /// Закрывает ли токен блок (конец тела конструкции).
    pub fn closes_block(self) -> bool {
        matches!(
            self,
            TokenKind::Fin
                | TokenKind::FinSi
                | TokenKind::Sino
                | TokenKind::FinMientras
                | TokenKind::FinPara
                | TokenKind::HastaQue
                | TokenKind::Eof
        )
    }

    /// Может ли токен начинать инструкцию.
    pub fn starts_statement(self) -> bool {
        matches!(
            self,
            TokenKind::Type(_)
                | TokenKind::Constante
                | TokenKind::Si
                | TokenKind::Mientras
                | TokenKind::Para
                | TokenKind::Repetir
                | TokenKind::Mostrar
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Type(ty) => return write!(f, "'{}'", ty),
            TokenKind::LiteralEntero => "integer literal",
            TokenKind::LiteralDecimal => "decimal literal",
            TokenKind::LiteralCadena => "string literal",
            TokenKind::LiteralBooleano => "boolean literal",
            TokenKind::Identificador => "identifier",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::GtEq => "'>='",
            TokenKind::LtEq => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::Lt => "'<'",
            TokenKind::Assign => "'='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Eof => "end of input",
            keyword => {
                let word = RESERVED_WORDS
                    .iter()
                    .find(|(_, kind)| kind == keyword)
                    .map(|(word, _)| *word)
                    .unwrap_or("?");
                return write!(f, "'{}'", word);
            }
        };
        f.write_str(text)
    }
}

/// Токен: вид, исходный текст и номер строки.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }

    /// Описание токена для сообщений об ошибках.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({}) @{}", self.kind, self.lexeme, self.line)
    }
}
