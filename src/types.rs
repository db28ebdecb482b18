//! Система типов языка.
//!
//! Четыре базовых типа и решётка совместимости для присваиваний:
//! `entero ⊆ decimal`, остальные типы совместимы только сами с собой.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Базовый тип значения.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Entero,
    Decimal,
    Cadena,
    Booleano,
}

impl DataType {
    /// Тип по ключевому слову (`entero`, `decimal`, ...).
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "entero" => Some(DataType::Entero),
            "decimal" => Some(DataType::Decimal),
            "cadena" => Some(DataType::Cadena),
            "booleano" => Some(DataType::Booleano),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            DataType::Entero => "entero",
            DataType::Decimal => "decimal",
            DataType::Cadena => "cadena",
            DataType::Booleano => "booleano",
        }
    }

    /// Можно ли сохранить значение типа `value` в место типа `self`.
    pub fn accepts(self, value: DataType) -> bool {
        match self {
            DataType::Decimal => matches!(value, DataType::Entero | DataType::Decimal),
            other => other == value,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Entero | DataType::Decimal)
    }

    /// Результат арифметики над двумя числовыми типами.
    pub fn widen(self, other: DataType) -> DataType {
        if self == DataType::Decimal || other == DataType::Decimal {
            DataType::Decimal
        } else {
            DataType::Entero
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
