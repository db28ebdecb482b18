//! Бэкенд: IR, оптимизатор и трансляция в целевой скрипт.

pub mod generator;
pub mod ir;
pub mod optimizer;
pub mod translator;

pub use generator::{generate, IrGenerator};
pub use ir::{listing, Instr, Op, Operand, Place, Rvalue};
pub use optimizer::optimize;
pub use translator::{translate, Translation, Translator};
