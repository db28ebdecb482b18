//! Песочница для выполнения оттранслированного скрипта.
//!
//! Скрипт сначала разбирается целиком и проверяется по белому списку
//! встроенных функций, затем выполняется встроенным интерпретатором на
//! отдельном потоке. Вызывающий ждёт результат не дольше таймаута; по
//! истечении он выставляет флаг отмены и возвращает управление, не дожидаясь
//! потока. Вывод пишется в буфер запуска, а не в stdout процесса.
//!
//! # Пример
//!
//! ```rust
//! use psc_lang::executor::Executor;
//!
//! let run = Executor::default().run("print(1 + 1)\n");
//! assert!(run.result.is_ok());
//! assert_eq!(run.output, "2\n");
//! ```

pub mod builtins;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use builtins::WHITELIST;
pub use interpreter::Interpreter;
pub use parser::{parse_script, Script};
pub use value::{Fault, FaultKind, Value};

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Таймаут выполнения по умолчанию.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Предел размера захваченного вывода.
pub const MAX_CAPTURE_BYTES: usize = 8 * 1024 * 1024;

/// Ошибка разбора или выполнения скрипта. `line` - строка скрипта.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("invalid syntax at script line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("call to '{name}' is not allowed")]
    Forbidden { name: String, line: usize },

    #[error("{kind}: {message}")]
    Runtime {
        line: usize,
        kind: FaultKind,
        message: String,
    },

    #[error("execution cancelled")]
    Cancelled,
}

impl ScriptError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        ScriptError::Syntax {
            line,
            message: message.into(),
        }
    }

    pub fn runtime(line: usize, fault: Fault) -> Self {
        ScriptError::Runtime {
            line,
            kind: fault.kind,
            message: fault.message,
        }
    }

    /// Строка скрипта, если известна (0 - неизвестна).
    pub fn line(&self) -> usize {
        match self {
            ScriptError::Syntax { line, .. }
            | ScriptError::Forbidden { line, .. }
            | ScriptError::Runtime { line, .. } => *line,
            ScriptError::Cancelled => 0,
        }
    }
}

/// Ошибка запуска в песочнице.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    #[error("execution timed out after {:.1}s: possible infinite loop", .0.as_secs_f64())]
    Timeout(Duration),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("execution worker could not be started: {0}")]
    Spawn(String),

    #[error("execution worker terminated unexpectedly")]
    WorkerLost,
}

impl ExecError {
    /// Строка скрипта, к которой относится ошибка (0 - неизвестна).
    pub fn script_line(&self) -> usize {
        match self {
            ExecError::Script(err) => err.line(),
            _ => 0,
        }
    }
}

/// Буфер вывода одного запуска, разделяемый с рабочим потоком.
///
/// Сверх [`MAX_CAPTURE_BYTES`] вывод отбрасывается, а запись продолжает
/// считаться успешной: зациклившаяся программа с `print` должна дойти до
/// таймаута, а не упасть на переполнении буфера.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Captured>>,
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Текущее содержимое (невалидный UTF-8 заменяется).
    pub fn contents(&self) -> String {
        let captured = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&captured.bytes).into_owned()
    }

    /// Была ли часть вывода отброшена.
    pub fn is_truncated(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .truncated
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut captured = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let room = MAX_CAPTURE_BYTES.saturating_sub(captured.bytes.len());
        if buf.len() > room {
            captured.bytes.extend_from_slice(&buf[..room]);
            captured.truncated = true;
        } else {
            captured.bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Результат запуска: вывод (возможно, частичный) и исход.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub output: String,
    /// Вывод обрезан по [`MAX_CAPTURE_BYTES`].
    pub truncated: bool,
    pub result: Result<(), ExecError>,
}

/// Песочница с фиксированным таймаутом.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    timeout: Duration,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Executor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Разобрать, проверить и выполнить скрипт.
    pub fn run(&self, source: &str) -> Execution {
        let script = match parse_script(source) {
            Ok(script) => script,
            Err(err) => {
                return Execution {
                    output: String::new(),
                    truncated: false,
                    result: Err(err.into()),
                }
            }
        };

        let buffer = CaptureBuffer::new();
        let result = self.supervise(script, buffer.clone());
        let truncated = buffer.is_truncated();
        if truncated {
            log::warn!("captured output truncated at {} bytes", MAX_CAPTURE_BYTES);
        }
        Execution {
            output: buffer.contents(),
            truncated,
            result,
        }
    }

    fn supervise(&self, script: Script, buffer: CaptureBuffer) -> Result<(), ExecError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let worker_cancel = Arc::clone(&cancel);
        thread::Builder::new()
            .name("psc-exec".to_string())
            .spawn(move || {
                let mut interpreter = Interpreter::new(buffer, worker_cancel);
                let result = interpreter.run(&script);
                // Получатель мог уже уйти по таймауту.
                let _ = tx.send(result);
            })
            .map_err(|e| ExecError::Spawn(e.to_string()))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result.map_err(ExecError::from),
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::Relaxed);
                log::warn!(
                    "execution exceeded {:?}, worker asked to stop",
                    self.timeout
                );
                Err(ExecError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ExecError::WorkerLost),
        }
    }
}
