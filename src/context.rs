//! Состояние одного запуска компилятора.
//!
//! Диагностики, таблицы символов и счётчик временных переменных живут
//! только внутри `CompilationContext`. Новый запуск - новый контекст.

use std::collections::HashMap;

use crate::diagnostics::Diagnostics;
use crate::types::DataType;

/// Запись таблицы символов.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// `None`, если тип не удалось вывести (ошибка уже сообщена).
    pub ty: Option<DataType>,
    pub line: usize,
}

/// Плоская глобальная область видимости: переменные и константы.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    variables: HashMap<String, Symbol>,
    constants: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Найти имя среди переменных и констант.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.variables.get(name).or_else(|| self.constants.get(name))
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.constants.contains_key(name)
    }

    pub fn declare_variable(&mut self, name: &str, ty: DataType, line: usize) {
        self.variables.insert(
            name.to_string(),
            Symbol {
                ty: Some(ty),
                line,
            },
        );
    }

    /// Зарегистрировать константу. Повторная запись не перезаписывает первую.
    pub fn declare_constant(&mut self, name: &str, ty: Option<DataType>, line: usize) -> bool {
        if self.constants.contains_key(name) {
            return false;
        }
        self.constants.insert(name.to_string(), Symbol { ty, line });
        true
    }
}

/// Контекст компиляции, передаваемый по ссылке через все стадии.
#[derive(Debug, Default)]
pub struct CompilationContext {
    pub diagnostics: Diagnostics,
    pub symbols: SymbolTable,
    next_temp: usize,
}

impl CompilationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Выдать номер новой временной переменной. Номера не повторяются.
    pub fn fresh_temp(&mut self) -> usize {
        let id = self.next_temp;
        self.next_temp += 1;
        id
    }

    /// Сколько временных переменных выдано.
    pub fn temps_issued(&self) -> usize {
        self.next_temp
    }
}
