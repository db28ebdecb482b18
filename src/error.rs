//! Определения ошибок для PSC.
//!
//! Пользовательские ошибки программы (лексические, синтаксические,
//! семантические) не являются `PscError` - они копятся как
//! [`Diagnostic`](crate::diagnostics::Diagnostic). `PscError` описывает сбои,
//! после которых конвейер останавливается.

use thiserror::Error;

/// Основной тип `Result` для библиотеки.
pub type PscResult<T> = Result<T, PscError>;

/// Перечисление всех ошибок, останавливающих конвейер.
#[derive(Error, Debug)]
pub enum PscError {
    #[error("IR generation reached an error node at line {0}")]
    ErrorNodeInCodegen(usize),

    #[error("Block terminator at IR instruction {0} has no open block")]
    UnopenedBlock(usize),

    #[error("Translation ended with {0} unclosed block(s)")]
    UnclosedBlocks(usize),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for PscError {
    fn from(err: std::io::Error) -> Self {
        PscError::IoError(err.to_string())
    }
}
