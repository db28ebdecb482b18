//! Диагностики компилятора.
//!
//! Все стадии конвейера пишут в один упорядоченный список. Порядок записей
//! важен: по нему строится сгруппированный вывод для пользователя.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Стадия, на которой обнаружена проблема.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lexical,
    Syntactic,
    Semantic,
    Codegen,
    Translation,
    Execution,
}

impl Phase {
    /// Человекочитаемое имя стадии.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Lexical => "lexical",
            Phase::Syntactic => "syntactic",
            Phase::Semantic => "semantic",
            Phase::Codegen => "codegen",
            Phase::Translation => "translation",
            Phase::Execution => "execution",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Одна запись диагностики. `line == 0` означает «строка неизвестна».
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub phase: Phase,
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(phase: Phase, line: usize, message: impl Into<String>) -> Self {
        Self {
            phase,
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "[{}] {}", self.phase, self.message)
        } else {
            write!(f, "[{}] line {}: {}", self.phase, self.line, self.message)
        }
    }
}

/// Упорядоченный список диагностик одного запуска (только добавление).
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Создать пустой список.
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить запись.
    pub fn push(&mut self, phase: Phase, line: usize, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(phase, line, message);
        log::debug!("diagnostic: {}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Есть ли хотя бы одна запись указанной стадии.
    pub fn has_phase(&self, phase: Phase) -> bool {
        self.items.iter().any(|d| d.phase == phase)
    }

    /// Сгруппировать записи по стадиям, сохраняя порядок внутри группы.
    pub fn by_phase(&self) -> BTreeMap<Phase, Vec<&Diagnostic>> {
        group_by_phase(&self.items)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

/// Разложить диагностики по стадиям; порядок внутри стадии сохраняется.
pub fn group_by_phase<'a>(
    diagnostics: impl IntoIterator<Item = &'a Diagnostic>,
) -> BTreeMap<Phase, Vec<&'a Diagnostic>> {
    let mut groups: BTreeMap<Phase, Vec<&'a Diagnostic>> = BTreeMap::new();
    for diagnostic in diagnostics {
        groups.entry(diagnostic.phase).or_default().push(diagnostic);
    }
    groups
}
